//! # QuerySpeak
//!
//! Ask a SQLite database questions in plain language.
//!
//! QuerySpeak sends a question and the database schema to a language model,
//! then cleans up the SQL that comes back before running it. The clean-up
//! is local and deterministic. It is a handful of text rules aimed at the
//! mistakes generated SQL tends to make, not a SQL parser.
//!
//! ## Quick Example
//!
//! ```rust
//! use queryspeak::prelude::*;
//!
//! let schema = SchemaModel::new()
//!     .with_table("employees", [("id", "INTEGER"), ("name", "TEXT"), ("salary", "INTEGER")]);
//!
//! // Repair what the model produced
//! let sql = fix("SELECT id name FROM employees", &schema);
//! assert_eq!(sql, "SELECT id, name FROM employees");
//!
//! // Canonicalize it
//! let sql = optimize("select * from employees", &schema);
//! assert_eq!(sql, "SELECT id, name, salary FROM employees LIMIT 100");
//!
//! // Describe it
//! let explanation = explain(&sql);
//! assert_eq!(explanation.bullets.len(), 3);
//! ```
//!
//! ## Passes
//!
//! | Pass       | Input             | Output                    |
//! |------------|-------------------|---------------------------|
//! | `fix`      | SQL + schema      | repaired SQL              |
//! | `optimize` | SQL + schema      | canonical, row-capped SQL |
//! | `explain`  | SQL               | ordered bullets           |
//! | `debug`    | SQL + database    | rows or a classified error |

pub mod config;
pub mod debug;
pub mod engine;
pub mod error;
pub mod explain;
pub mod generator;
pub mod optimize;
pub mod pipeline;
pub mod repair;
pub mod rewrite;
pub mod scan;
pub mod schema;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::debug::{debug, Diagnostic, FailureCategory};
    pub use crate::engine::{Executor, Row, SqliteExecutor};
    pub use crate::error::*;
    pub use crate::explain::{explain, Bullet, Explanation};
    pub use crate::generator::{extract_sql, ChatGenerator, QueryGenerator};
    pub use crate::optimize::{normalize, optimize};
    pub use crate::pipeline::{Answer, Outcome, Pipeline, PipelineOptions, Session};
    pub use crate::repair::{fix, repair};
    pub use crate::rewrite::{Rewrite, RuleOutcome, SkipReason};
    pub use crate::schema::{SchemaModel, SchemaProvider, SqliteSchemaProvider};
}

pub use explain::explain;
pub use optimize::optimize;
pub use repair::fix;
