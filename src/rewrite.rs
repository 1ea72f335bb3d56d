//! Rule bookkeeping shared by the repair and normalization passes.
//!
//! A pass is an ordered list of named rules. Each rule looks at the
//! current text and either rewrites it or says why it did not. The runner
//! threads the text through every rule and records what happened, so a
//! caller can see which heuristics fired without the pass ever failing.

use std::fmt;

use tracing::{debug, trace};

/// Why a rule left the text alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The pattern the rule repairs is not present.
    NotApplicable,
    /// The rule needs a clause the text does not have.
    MissingClause(&'static str),
    /// The clause names a table the schema does not know.
    UnknownTable(String),
    /// The schema has no tables to fall back on.
    EmptySchema,
    /// The select list holds a keyword, so spaces there are not separators.
    KeywordInSelectList(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotApplicable => write!(f, "not applicable"),
            SkipReason::MissingClause(clause) => write!(f, "no {} clause", clause),
            SkipReason::UnknownTable(name) => write!(f, "unknown table '{}'", name),
            SkipReason::EmptySchema => write!(f, "schema has no tables"),
            SkipReason::KeywordInSelectList(kw) => {
                write!(f, "select list contains keyword '{}'", kw)
            }
        }
    }
}

/// What a single rule did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Applied(String),
    Skipped(SkipReason),
}

/// Outcome recorded for a rule once the pass is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Applied,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub rule: &'static str,
    pub outcome: RuleOutcome,
}

/// A rule: current text plus pass context in, [`Step`] out.
pub type Rule<C> = fn(&str, &C) -> Step;

/// Result of running a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub sql: String,
    pub rules: Vec<RuleReport>,
}

impl Rewrite {
    /// Names of the rules that changed the text, in order.
    pub fn applied(&self) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|r| r.outcome == RuleOutcome::Applied)
            .map(|r| r.rule)
            .collect()
    }

    pub fn outcome(&self, rule: &str) -> Option<&RuleOutcome> {
        self.rules.iter().find(|r| r.rule == rule).map(|r| &r.outcome)
    }
}

/// Thread `sql` through `rules` in order.
pub fn run<C>(pass: &str, sql: &str, ctx: &C, rules: &[(&'static str, Rule<C>)]) -> Rewrite {
    let mut current = sql.to_string();
    let mut reports = Vec::with_capacity(rules.len());

    for (name, rule) in rules {
        let outcome = match rule(&current, ctx) {
            Step::Applied(next) => {
                debug!(pass, rule = *name, before = %current, after = %next, "rule applied");
                current = next;
                RuleOutcome::Applied
            }
            Step::Skipped(reason) => {
                trace!(pass, rule = *name, %reason, "rule skipped");
                RuleOutcome::Skipped(reason)
            }
        };
        reports.push(RuleReport {
            rule: *name,
            outcome,
        });
    }

    Rewrite {
        sql: current,
        rules: reports,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shout(sql: &str, _: &()) -> Step {
        if sql.chars().any(|c| c.is_ascii_lowercase()) {
            Step::Applied(sql.to_ascii_uppercase())
        } else {
            Step::Skipped(SkipReason::NotApplicable)
        }
    }

    fn bang(sql: &str, _: &()) -> Step {
        Step::Applied(format!("{}!", sql))
    }

    #[test]
    fn test_rules_run_in_order() {
        let rules: &[(&'static str, Rule<()>)] = &[("shout", shout), ("bang", bang), ("again", shout)];
        let out = run("test", "hi", &(), rules);
        assert_eq!(out.sql, "HI!");
        assert_eq!(out.applied(), vec!["shout", "bang"]);
        assert_eq!(
            out.outcome("again"),
            Some(&RuleOutcome::Skipped(SkipReason::NotApplicable))
        );
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::MissingClause("FROM").to_string(), "no FROM clause");
        assert_eq!(
            SkipReason::UnknownTable("staff".into()).to_string(),
            "unknown table 'staff'"
        );
    }
}
