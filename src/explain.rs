//! The explanation pass (`explain`).
//!
//! Describes a query in plain language, one bullet per detected clause.
//! Bullets always come out in the same order (retrieval, table, filter,
//! ordering, grouping, join, limit) whatever order the clauses appear in.
//! Nested queries and comments can produce truncated text; this reads
//! clauses, it does not parse them.

use std::fmt;

use crate::scan::{bare_identifier, SqlText};

/// Clauses that end a `WHERE` condition.
const CONDITION_TERMINATORS: &[&str] = &["group by", "having", "order by", "limit"];

pub const NO_EXPLANATION: &str = "No explanation available.";

/// One detected feature of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bullet {
    Retrieval,
    Table(String),
    Filter(String),
    Order(String),
    Group(String),
    Join,
    Limit(String),
}

impl fmt::Display for Bullet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bullet::Retrieval => write!(f, "The query retrieves data from the database."),
            Bullet::Table(t) => write!(f, "It reads data from the {} table.", t),
            Bullet::Filter(c) if c.is_empty() => write!(f, "It filters rows."),
            Bullet::Filter(c) => write!(f, "It filters rows using: {}.", c),
            Bullet::Order(c) => write!(f, "Ordered using: {}.", c),
            Bullet::Group(c) => write!(f, "Groups rows using: {}.", c),
            Bullet::Join => write!(f, "Query involves a JOIN between tables."),
            Bullet::Limit(n) => write!(f, "Output limited to {} rows.", n),
        }
    }
}

/// Ordered bullets describing a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Explanation {
    pub bullets: Vec<Bullet>,
}

impl Explanation {
    pub fn is_empty(&self) -> bool {
        self.bullets.is_empty()
    }

    /// Bullet texts, or the single fallback message when nothing was detected.
    pub fn lines(&self) -> Vec<String> {
        if self.bullets.is_empty() {
            return vec![NO_EXPLANATION.to_string()];
        }
        self.bullets.iter().map(|b| b.to_string()).collect()
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bullets.is_empty() {
            return write!(f, "{}", NO_EXPLANATION);
        }
        let lines: Vec<String> = self.bullets.iter().map(|b| format!("• {}", b)).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// Describe `sql` without consulting a schema or a database.
///
/// # Example
///
/// ```
/// use queryspeak::explain::{explain, Bullet};
///
/// let e = explain("SELECT name FROM employees LIMIT 5");
/// assert_eq!(e.bullets[1], Bullet::Table("employees".into()));
/// assert_eq!(e.bullets.len(), 3);
/// ```
pub fn explain(sql: &str) -> Explanation {
    let text = SqlText::new(sql);
    let mut bullets = Vec::new();

    if text.contains("select") {
        bullets.push(Bullet::Retrieval);
    }
    if let Some(table) = word_after(&text, "from") {
        bullets.push(Bullet::Table(table));
    }
    if let Some(span) = text.find("where") {
        let end = text
            .find_first_of(CONDITION_TERMINATORS, span.end)
            .map_or(sql.len(), |s| s.start);
        let condition = text.between(span.end, end).trim();
        bullets.push(Bullet::Filter(condition.to_string()));
    }
    if let Some(col) = word_after(&text, "order by") {
        bullets.push(Bullet::Order(col));
    }
    if let Some(col) = word_after(&text, "group by") {
        bullets.push(Bullet::Group(col));
    }
    if text.contains("join") {
        bullets.push(Bullet::Join);
    }
    if let Some(n) = word_after(&text, "limit") {
        bullets.push(Bullet::Limit(n));
    }

    Explanation { bullets }
}

fn word_after(text: &SqlText<'_>, keyword: &str) -> Option<String> {
    let span = text.find(keyword)?;
    let tok = text.token_after(span.end)?;
    let word = bare_identifier(text.slice(tok));
    (!word.is_empty()).then(|| word.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_four_bullets_in_fixed_order() {
        let e = explain("SELECT name FROM employees WHERE salary > 50000 ORDER BY name");
        assert_eq!(
            e.bullets,
            vec![
                Bullet::Retrieval,
                Bullet::Table("employees".into()),
                Bullet::Filter("salary > 50000".into()),
                Bullet::Order("name".into()),
            ]
        );
    }

    #[test]
    fn test_order_ignores_clause_position() {
        let e = explain("SELECT department, COUNT(*) FROM employees e JOIN departments d ON 1=1 GROUP BY department LIMIT 3");
        assert_eq!(
            e.bullets,
            vec![
                Bullet::Retrieval,
                Bullet::Table("employees".into()),
                Bullet::Group("department".into()),
                Bullet::Join,
                Bullet::Limit("3".into()),
            ]
        );
    }

    #[test]
    fn test_condition_stops_at_limit() {
        let e = explain("select * from employees where department = 'Sales' limit 2");
        assert_eq!(e.bullets[2], Bullet::Filter("department = 'Sales'".into()));
    }

    #[test]
    fn test_empty_condition_still_filters() {
        let e = explain("SELECT id FROM employees WHERE ORDER BY id");
        assert_eq!(e.bullets[2], Bullet::Filter(String::new()));
        assert_eq!(e.bullets[2].to_string(), "It filters rows.");
        assert_eq!(e.bullets.len(), 4);
    }

    #[test]
    fn test_nothing_detected() {
        let e = explain("PRAGMA table_info(employees)");
        assert!(e.is_empty());
        assert_eq!(e.lines(), vec![NO_EXPLANATION.to_string()]);
        assert_eq!(e.to_string(), NO_EXPLANATION);
    }

    #[test]
    fn test_rendering() {
        let e = explain("SELECT id FROM employees LIMIT 10");
        assert_eq!(
            e.to_string(),
            "• The query retrieves data from the database.\n\
             • It reads data from the employees table.\n\
             • Output limited to 10 rows."
        );
    }
}
