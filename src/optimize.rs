//! The normalization pass (`optimize`).
//!
//! Canonicalizes SQL that is already roughly valid: tidy whitespace, an
//! explicit column list instead of `*`, SQLite-friendly boolean literals,
//! a row cap and upper-case clause keywords. Like the repair pass it
//! never fails; a step that cannot find what it needs is skipped.

use crate::rewrite::{self, Rewrite, Rule, SkipReason, Step};
use crate::scan::{bare_identifier, collapse_whitespace, replace_keyword, SqlText};
use crate::schema::SchemaModel;

/// Rows a normalized query may return when it sets no `LIMIT` of its own.
pub const DEFAULT_ROW_CAP: usize = 100;

/// Keywords upper-cased by the last step, lowercase form first.
const KEYWORDS: &[(&str, &str)] = &[
    ("select", "SELECT"),
    ("from", "FROM"),
    ("where", "WHERE"),
    ("group by", "GROUP BY"),
    ("order by", "ORDER BY"),
    ("limit", "LIMIT"),
    ("join", "JOIN"),
];

/// What the normalization rules see besides the text.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub schema: &'a SchemaModel,
    pub row_cap: usize,
}

/// Normalize `sql`, capping unbounded queries at [`DEFAULT_ROW_CAP`] rows.
///
/// # Example
///
/// ```
/// use queryspeak::prelude::*;
///
/// let schema = SchemaModel::new().with_table("employees", [("id", "INTEGER"), ("name", "TEXT")]);
/// assert_eq!(
///     optimize("select * from employees", &schema),
///     "SELECT id, name FROM employees LIMIT 100"
/// );
/// ```
pub fn optimize(sql: &str, schema: &SchemaModel) -> String {
    normalize(sql, schema, DEFAULT_ROW_CAP).sql
}

/// Run the normalization pass with an explicit row cap and keep the report.
pub fn normalize(sql: &str, schema: &SchemaModel, row_cap: usize) -> Rewrite {
    let ctx = NormalizeContext { schema, row_cap };
    let rules: [(&'static str, Rule<NormalizeContext<'_>>); 7] = [
        ("dedupe_distinct", dedupe_distinct),
        ("collapse_spaces", collapse_spaces),
        ("expand_star", expand_star),
        ("tighten_parens", tighten_parens),
        ("boolean_literals", boolean_literals),
        ("cap_rows", cap_rows),
        ("uppercase_keywords", uppercase_keywords),
    ];
    rewrite::run("optimize", sql.trim(), &ctx, &rules)
}

/// `DISTINCT DISTINCT` → `DISTINCT`
pub fn dedupe_distinct(sql: &str, _: &NormalizeContext<'_>) -> Step {
    let mut out = sql.to_string();
    let mut changed = false;
    loop {
        let (next, n) = replace_keyword(&out, "distinct distinct", "DISTINCT");
        if n == 0 {
            break;
        }
        out = next;
        changed = true;
    }
    if changed {
        Step::Applied(out)
    } else {
        Step::Skipped(SkipReason::NotApplicable)
    }
}

pub fn collapse_spaces(sql: &str, _: &NormalizeContext<'_>) -> Step {
    let out = collapse_whitespace(sql);
    if out == sql {
        Step::Skipped(SkipReason::NotApplicable)
    } else {
        Step::Applied(out)
    }
}

/// `SELECT * FROM t` → `SELECT a, b, c FROM t` for a table the schema knows.
pub fn expand_star(sql: &str, ctx: &NormalizeContext<'_>) -> Step {
    let text = SqlText::new(sql);
    let Some(select) = text.find("select") else {
        return Step::Skipped(SkipReason::MissingClause("SELECT"));
    };
    let Some(from) = text.find_from("from", select.end) else {
        return Step::Skipped(SkipReason::MissingClause("FROM"));
    };
    if text.between(select.end, from.start).trim() != "*" {
        return Step::Skipped(SkipReason::NotApplicable);
    }

    let Some(tok) = text.token_after(from.end) else {
        return Step::Skipped(SkipReason::MissingClause("FROM"));
    };
    let name = bare_identifier(text.slice(tok));
    let Some(table) = ctx.schema.table(name) else {
        return Step::Skipped(SkipReason::UnknownTable(name.to_string()));
    };
    if table.columns.is_empty() {
        return Step::Skipped(SkipReason::NotApplicable);
    }

    Step::Applied(format!(
        "{} {} {}",
        text.between(0, select.end),
        table.column_list(),
        text.between(from.start, sql.len())
    ))
}

/// `( x` → `(x`, `x )` → `x)`
pub fn tighten_parens(sql: &str, _: &NormalizeContext<'_>) -> Step {
    if !sql.contains("( ") && !sql.contains(" )") {
        return Step::Skipped(SkipReason::NotApplicable);
    }
    let mut out = sql.to_string();
    while out.contains("( ") || out.contains(" )") {
        out = out.replace("( ", "(").replace(" )", ")");
    }
    Step::Applied(out)
}

/// `= TRUE` → `= 1`, `= FALSE` → `= 0`. SQLite has no boolean literal type.
pub fn boolean_literals(sql: &str, _: &NormalizeContext<'_>) -> Step {
    let mut out = sql.to_string();
    let mut changed = false;

    for (literal, digit) in [("true", "1"), ("false", "0")] {
        let text = SqlText::new(&out);
        let mut next = String::with_capacity(out.len());
        let mut cursor = 0;
        for span in text.find_all(literal) {
            if text.between(0, span.start).trim_end().ends_with('=') {
                next.push_str(text.between(cursor, span.start));
                next.push_str(digit);
                cursor = span.end;
                changed = true;
            }
        }
        next.push_str(text.between(cursor, out.len()));
        out = next;
    }

    if changed {
        Step::Applied(out)
    } else {
        Step::Skipped(SkipReason::NotApplicable)
    }
}

/// Append `LIMIT <row_cap>` when the query sets no limit of its own.
pub fn cap_rows(sql: &str, ctx: &NormalizeContext<'_>) -> Step {
    if sql.trim().is_empty() || SqlText::new(sql).contains("limit") {
        return Step::Skipped(SkipReason::NotApplicable);
    }
    Step::Applied(format!("{} LIMIT {}", sql.trim_end(), ctx.row_cap))
}

/// Upper-case clause keywords; identifiers that merely contain one are left alone.
pub fn uppercase_keywords(sql: &str, _: &NormalizeContext<'_>) -> Step {
    let out = KEYWORDS.iter().fold(sql.to_string(), |acc, (lower, upper)| {
        replace_keyword(&acc, lower, upper).0
    });
    if out == sql {
        Step::Skipped(SkipReason::NotApplicable)
    } else {
        Step::Applied(out)
    }
}
