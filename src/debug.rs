//! The diagnostic pass (`debug`).
//!
//! Runs a statement and, when it fails, sorts the database's error message
//! into a small set of categories with a hint for each. Runs once; there
//! is no retry and no regeneration.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::engine::{Executor, Row};
use crate::error::QuerySpeakError;

/// Rows kept from a successful diagnostic run.
pub const PREVIEW_ROWS: usize = 10;

/// Where a failed statement went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    TableNotFound,
    ColumnNotFound,
    SyntaxError,
    Unknown,
}

impl FailureCategory {
    /// Classify a raw database error message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("no such table") {
            Self::TableNotFound
        } else if lower.contains("no such column") {
            Self::ColumnNotFound
        } else if lower.contains("syntax error") {
            Self::SyntaxError
        } else {
            Self::Unknown
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::TableNotFound => "Table does not exist.",
            Self::ColumnNotFound => "Column not found.",
            Self::SyntaxError => "SQL Syntax Error.",
            Self::Unknown => "Unknown SQL Error.",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::TableNotFound => Some("Check table name."),
            Self::ColumnNotFound => Some("Verify column names."),
            Self::SyntaxError => Some("Check commas, parentheses, missing keywords."),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TableNotFound => "table-not-found",
            Self::ColumnNotFound => "column-not-found",
            Self::SyntaxError => "syntax-error",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Terminal state of a diagnostic run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Diagnostic {
    /// The statement ran; at most [`PREVIEW_ROWS`] rows are kept.
    Succeeded { rows: Vec<Row> },
    /// The database rejected the statement.
    Failed {
        category: FailureCategory,
        message: String,
    },
    /// The database could not be reached at all.
    Severe { message: String },
}

impl Diagnostic {
    pub fn is_ok(&self) -> bool {
        matches!(self, Diagnostic::Succeeded { .. })
    }

    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            Diagnostic::Failed { category, .. } => Some(*category),
            _ => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Succeeded { .. } => write!(f, "SQL executed successfully!"),
            Diagnostic::Failed { category, message } => {
                write!(f, "{}\n\nDetails: {}", category.title(), message)?;
                if let Some(hint) = category.hint() {
                    write!(f, "\n\nHint: {}", hint)?;
                }
                Ok(())
            }
            Diagnostic::Severe { message } => write!(f, "Severe Error: {}", message),
        }
    }
}

/// Execute `sql` once and classify the outcome.
pub async fn debug<E: Executor>(executor: &E, sql: &str) -> Diagnostic {
    match executor.execute(sql).await {
        Ok(mut rows) => {
            rows.truncate(PREVIEW_ROWS);
            Diagnostic::Succeeded { rows }
        }
        Err(QuerySpeakError::Execution(message)) => {
            let category = FailureCategory::classify(&message);
            warn!(%category, %message, "statement failed");
            Diagnostic::Failed { category, message }
        }
        Err(other) => {
            warn!(error = %other, "diagnostic could not run");
            Diagnostic::Severe {
                message: other.to_string(),
            }
        }
    }
}
