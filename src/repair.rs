//! The repair pass (`fix`).
//!
//! Generated SQL is often almost right: a doubled comma, a missing
//! `FROM`, a select list written with spaces. Each rule below patches one
//! of those shapes. Rules run in a fixed order and each sees the output of
//! the one before it. A rule that cannot make sense of the text skips and
//! leaves it untouched; the pass as a whole never fails.

use crate::rewrite::{self, Rewrite, Rule, SkipReason, Step};
use crate::scan::{bare_identifier, is_identifier, SqlText};
use crate::schema::SchemaModel;

/// Repair rules in application order.
pub const RULES: &[(&str, Rule<SchemaModel>)] = &[
    ("collapse_commas", collapse_commas),
    ("drop_comma_before_from", drop_comma_before_from),
    ("comma_separate_columns", comma_separate_columns),
    ("default_from", default_from),
    ("default_join_condition", default_join_condition),
    ("expand_empty_select", expand_empty_select),
    ("drop_unknown_order_by", drop_unknown_order_by),
];

/// Clauses that may follow `FROM`/`JOIN`; inserted text goes in front of them.
const TRAILING_CLAUSES: &[&str] = &["where", "group by", "having", "order by", "limit"];

/// Words that legitimately sit space-separated in a select list.
const SELECT_LIST_KEYWORDS: &[&str] = &[
    "distinct", "all", "as", "case", "when", "then", "else", "end", "top",
];

/// Best-effort repair of candidate SQL against `schema`.
///
/// # Example
///
/// ```
/// use queryspeak::prelude::*;
///
/// let schema = SchemaModel::new().with_table("employees", [("id", "INTEGER"), ("name", "TEXT")]);
/// assert_eq!(fix("SELECT id name FROM employees", &schema), "SELECT id, name FROM employees");
/// ```
pub fn fix(sql: &str, schema: &SchemaModel) -> String {
    repair(sql, schema).sql
}

/// Run the repair pass and keep the per-rule report.
pub fn repair(sql: &str, schema: &SchemaModel) -> Rewrite {
    let mut rewrite = rewrite::run("fix", sql.trim(), schema, RULES);
    rewrite.sql.truncate(rewrite.sql.trim_end().len());
    rewrite
}

/// `,,` → `,` until none remain.
pub fn collapse_commas(sql: &str, _: &SchemaModel) -> Step {
    if !sql.contains(",,") {
        return Step::Skipped(SkipReason::NotApplicable);
    }
    let mut out = sql.to_string();
    while out.contains(",,") {
        out = out.replace(",,", ",");
    }
    Step::Applied(out)
}

/// `a, b, FROM t` → `a, b FROM t`
pub fn drop_comma_before_from(sql: &str, _: &SchemaModel) -> Step {
    let text = SqlText::new(sql);
    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    let mut changed = false;

    for span in text.find_all("from") {
        let before = text.between(cursor, span.start).trim_end();
        if let Some(stripped) = before.strip_suffix(',') {
            out.push_str(stripped.trim_end());
            out.push(' ');
            cursor = span.start;
            changed = true;
        }
    }

    if !changed {
        return Step::Skipped(SkipReason::NotApplicable);
    }
    out.push_str(text.between(cursor, sql.len()));
    Step::Applied(out)
}

/// `SELECT id name FROM t` → `SELECT id, name FROM t`
///
/// Only bare identifiers are rewritten. Select lists holding keywords,
/// literals, calls or operators are left as they are.
pub fn comma_separate_columns(sql: &str, _: &SchemaModel) -> Step {
    let text = SqlText::new(sql);
    let Some(select) = text.find("select") else {
        return Step::Skipped(SkipReason::MissingClause("SELECT"));
    };
    let Some(from) = text.find_from("from", select.end) else {
        return Step::Skipped(SkipReason::MissingClause("FROM"));
    };

    let section = text.between(select.end, from.start);
    if section.contains([',', '(', '\'']) {
        return Step::Skipped(SkipReason::NotApplicable);
    }
    let tokens: Vec<&str> = section.split_whitespace().collect();
    if tokens.len() < 2 {
        return Step::Skipped(SkipReason::NotApplicable);
    }
    if let Some(kw) = tokens
        .iter()
        .find(|t| SELECT_LIST_KEYWORDS.contains(&t.to_ascii_lowercase().as_str()))
    {
        return Step::Skipped(SkipReason::KeywordInSelectList(kw.to_ascii_uppercase()));
    }
    if !tokens.iter().all(|t| is_identifier(t)) {
        return Step::Skipped(SkipReason::NotApplicable);
    }

    Step::Applied(format!(
        "{} {} {}",
        text.between(0, select.end),
        tokens.join(", "),
        text.between(from.start, sql.len())
    ))
}

/// No `FROM` anywhere: target the first table of the schema.
pub fn default_from(sql: &str, schema: &SchemaModel) -> Step {
    let text = SqlText::new(sql);
    if text.contains("from") {
        return Step::Skipped(SkipReason::NotApplicable);
    }
    let Some(table) = schema.first_table() else {
        return Step::Skipped(SkipReason::EmptySchema);
    };
    Step::Applied(insert_before_trailing_clause(&text, 0, &format!("FROM {}", table.name)))
}

/// `JOIN` without `ON`: join on `1=1`.
///
/// This turns the join into a cross join. It keeps the query runnable; it
/// does not make it correct.
pub fn default_join_condition(sql: &str, _: &SchemaModel) -> Step {
    let text = SqlText::new(sql);
    let Some(join) = text.find("join") else {
        return Step::Skipped(SkipReason::NotApplicable);
    };
    if text.contains("on") || text.contains("using") {
        return Step::Skipped(SkipReason::NotApplicable);
    }
    Step::Applied(insert_before_trailing_clause(&text, join.end, "ON 1=1"))
}

/// `SELECT FROM t` → `SELECT <every column of t> FROM t`
pub fn expand_empty_select(sql: &str, schema: &SchemaModel) -> Step {
    let text = SqlText::new(sql);
    if !text.starts_with("select") {
        return Step::Skipped(SkipReason::NotApplicable);
    }
    let Some(select) = text.find("select") else {
        return Step::Skipped(SkipReason::MissingClause("SELECT"));
    };
    let Some(from) = text.find_from("from", select.end) else {
        return Step::Skipped(SkipReason::MissingClause("FROM"));
    };
    if !text.between(select.end, from.start).trim().is_empty() {
        return Step::Skipped(SkipReason::NotApplicable);
    }

    let Some(table_tok) = text.token_after(from.end) else {
        return Step::Skipped(SkipReason::MissingClause("FROM"));
    };
    let name = bare_identifier(text.slice(table_tok));
    let Some(table) = schema.table(name) else {
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

/// Drop an `ORDER BY` whose column the target table does not have.
///
/// Positional ordering (`ORDER BY 2`), select-list aliases and
/// expressions are kept.
pub fn drop_unknown_order_by(sql: &str, schema: &SchemaModel) -> Step {
    let text = SqlText::new(sql);
    let Some(order) = text.find("order by") else {
        return Step::Skipped(SkipReason::NotApplicable);
    };
    let Some(from) = text.find("from") else {
        return Step::Skipped(SkipReason::MissingClause("FROM"));
    };
    let Some(col_tok) = text.token_after(order.end) else {
        return Step::Skipped(SkipReason::NotApplicable);
    };

    let column = bare_identifier(text.slice(col_tok));
    // Expressions such as `COUNT(*)` or `LOWER(name)` are never dropped.
    if !is_identifier(column) {
        return Step::Skipped(SkipReason::NotApplicable);
    }
    let column = column.rsplit('.').next().unwrap_or(column);
    if column.is_empty() || column.chars().all(|c| c.is_ascii_digit()) {
        return Step::Skipped(SkipReason::NotApplicable);
    }

    let known = text
        .token_after(from.end)
        .and_then(|tok| schema.table(bare_identifier(text.slice(tok))))
        .is_some_and(|table| table.has_column(column));
    if known || is_alias(&text, column) {
        return Step::Skipped(SkipReason::NotApplicable);
    }

    let end = text
        .find_from("limit", order.end)
        .map_or(sql.len(), |span| span.start);
    let kept = format!(
        "{} {}",
        text.between(0, order.start).trim_end(),
        text.between(end, sql.len())
    );
    Step::Applied(kept.trim_end().to_string())
}

/// True when the select list names `column` with `AS column`.
fn is_alias(text: &SqlText<'_>, column: &str) -> bool {
    text.find_all("as").iter().any(|span| {
        text.token_after(span.end)
            .is_some_and(|tok| bare_identifier(text.slice(tok)).eq_ignore_ascii_case(column))
    })
}

/// Insert `clause` before the first trailing clause found at or after
/// `from`, or at the end of the text when there is none.
fn insert_before_trailing_clause(text: &SqlText<'_>, from: usize, clause: &str) -> String {
    let raw = text.raw();
    let (head, tail) = match text.find_first_of(TRAILING_CLAUSES, from) {
        Some(span) => (text.between(0, span.start), text.between(span.start, raw.len())),
        None => (raw, ""),
    };
    [head.trim_end(), clause, tail]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::RuleOutcome;
    use pretty_assertions::assert_eq;

    fn schema() -> SchemaModel {
        SchemaModel::new()
            .with_table(
                "employees",
                [
                    ("id", "INTEGER"),
                    ("name", "TEXT"),
                    ("department", "TEXT"),
                    ("salary", "INTEGER"),
                    ("hire_date", "TEXT"),
                ],
            )
            .with_table(
                "departments",
                [("id", "INTEGER"), ("department_name", "TEXT"), ("manager", "TEXT")],
            )
    }

    #[test]
    fn test_empty_select_expands_to_all_columns() {
        assert_eq!(
            fix("SELECT FROM employees", &schema()),
            "SELECT id, name, department, salary, hire_date FROM employees"
        );
    }

    #[test]
    fn test_space_separated_columns() {
        assert_eq!(
            fix("SELECT id name FROM employees", &schema()),
            "SELECT id, name FROM employees"
        );
    }

    #[test]
    fn test_join_without_on() {
        assert_eq!(
            fix("SELECT * FROM employees JOIN departments", &schema()),
            "SELECT * FROM employees JOIN departments ON 1=1"
        );
    }

    #[test]
    fn test_join_condition_goes_before_where() {
        assert_eq!(
            fix("SELECT * FROM employees e JOIN departments d WHERE e.id = 1", &schema()),
            "SELECT * FROM employees e JOIN departments d ON 1=1 WHERE e.id = 1"
        );
    }

    #[test]
    fn test_join_with_on_is_untouched() {
        let sql = "SELECT * FROM employees e JOIN departments d ON d.department_name = e.department";
        assert_eq!(fix(sql, &schema()), sql);
    }

    #[test]
    fn test_unknown_order_by_is_removed() {
        let out = fix("SELECT id FROM employees ORDER BY nonexistent_col", &schema());
        assert_eq!(out, "SELECT id FROM employees");
        assert!(!out.to_lowercase().contains("order by"));
    }

    #[test]
    fn test_unknown_order_by_keeps_limit() {
        assert_eq!(
            fix("SELECT id FROM employees ORDER BY bogus DESC LIMIT 5", &schema()),
            "SELECT id FROM employees LIMIT 5"
        );
    }

    #[test]
    fn test_known_order_by_is_kept() {
        let sql = "SELECT id FROM employees ORDER BY salary DESC";
        assert_eq!(fix(sql, &schema()), sql);
        let sql = "select id from employees order by e.Salary";
        assert_eq!(fix(sql, &schema()), sql);
    }

    #[test]
    fn test_order_by_alias_and_position_are_kept() {
        let sql = "SELECT department, COUNT(*) AS headcount FROM employees GROUP BY department ORDER BY headcount DESC";
        assert_eq!(fix(sql, &schema()), sql);
        let sql = "SELECT name, salary FROM employees ORDER BY 2";
        assert_eq!(fix(sql, &schema()), sql);
    }

    #[test]
    fn test_order_by_expression_is_kept() {
        let sql = "SELECT department, COUNT(*) FROM employees GROUP BY department ORDER BY COUNT(*) DESC LIMIT 3";
        assert_eq!(fix(sql, &schema()), sql);
        let sql = "SELECT name FROM employees ORDER BY LOWER(name)";
        assert_eq!(fix(sql, &schema()), sql);
    }

    #[test]
    fn test_arithmetic_select_list_is_not_split() {
        let sql = "SELECT salary * 2 FROM employees";
        assert_eq!(fix(sql, &schema()), sql);
        let report = repair("SELECT salary / 12 FROM employees", &schema());
        assert_eq!(report.sql, "SELECT salary / 12 FROM employees");
        assert_eq!(
            report.outcome("comma_separate_columns"),
            Some(&RuleOutcome::Skipped(SkipReason::NotApplicable))
        );
    }

    #[test]
    fn test_repeated_commas() {
        assert_eq!(
            fix("SELECT id,,,, name FROM employees", &schema()),
            "SELECT id, name FROM employees"
        );
    }

    #[test]
    fn test_dangling_comma_before_from() {
        assert_eq!(
            fix("SELECT id, name, FROM employees", &schema()),
            "SELECT id, name FROM employees"
        );
        assert_eq!(
            fix("select id, name,\nfrom employees", &schema()),
            "select id, name from employees"
        );
    }

    #[test]
    fn test_missing_from_uses_first_table() {
        assert_eq!(fix("SELECT name", &schema()), "SELECT name FROM employees");
        assert_eq!(
            fix("SELECT name WHERE salary > 10", &schema()),
            "SELECT name FROM employees WHERE salary > 10"
        );
    }

    #[test]
    fn test_missing_from_with_empty_schema() {
        let report = repair("SELECT name", &SchemaModel::new());
        assert_eq!(report.sql, "SELECT name");
        assert_eq!(
            report.outcome("default_from"),
            Some(&RuleOutcome::Skipped(SkipReason::EmptySchema))
        );
    }

    #[test]
    fn test_select_list_keywords_are_not_split() {
        let report = repair("SELECT DISTINCT department FROM employees", &schema());
        assert_eq!(report.sql, "SELECT DISTINCT department FROM employees");
        assert_eq!(
            report.outcome("comma_separate_columns"),
            Some(&RuleOutcome::Skipped(SkipReason::KeywordInSelectList(
                "DISTINCT".into()
            )))
        );
    }

    #[test]
    fn test_empty_select_on_unknown_table_is_reported() {
        let report = repair("SELECT FROM staff", &schema());
        assert_eq!(report.sql, "SELECT FROM staff");
        assert_eq!(
            report.outcome("expand_empty_select"),
            Some(&RuleOutcome::Skipped(SkipReason::UnknownTable("staff".into())))
        );
    }

    #[test]
    fn test_output_is_trimmed() {
        assert_eq!(
            fix("   SELECT id FROM employees  \n", &schema()),
            "SELECT id FROM employees"
        );
    }

    #[test]
    fn test_clean_sql_passes_through() {
        let sql = "SELECT name, salary FROM employees WHERE department = 'Sales' ORDER BY salary";
        let report = repair(sql, &schema());
        assert_eq!(report.sql, sql);
        assert!(report.applied().is_empty());
        assert_eq!(report.rules.len(), RULES.len());
    }

    #[test]
    fn test_garbage_never_panics() {
        let inputs = [
            "",
            ",,,,",
            "SELECT",
            "FROM",
            "ORDER BY",
            "SELECT FROM",
            "SELECT * FROM employees ORDER BY",
            "select 'unterminated from employees",
            "JOIN JOIN ON",
            "SELECT é,, FROM ünïcode ORDER BY ß",
        ];
        for input in inputs {
            let _ = fix(input, &schema());
            let _ = fix(input, &SchemaModel::new());
        }
    }
}
