//! The pipeline driver and per-user session state.
//!
//! ```text
//! question ─► schema ─► generate ─► extract ─► fix ─► [optimize] ─► execute ─► Answer
//! ```
//!
//! Explanation and diagnostics are not part of the run; callers invoke them
//! on an answer's SQL when they want them.

use std::fmt;

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::debug::Diagnostic;
use crate::engine::{cell_to_string, Executor, Row};
use crate::error::{QsResult, QuerySpeakError};
use crate::explain::Explanation;
use crate::generator::{extract_sql, QueryGenerator};
use crate::optimize::{normalize, DEFAULT_ROW_CAP};
use crate::repair::repair;
use crate::rewrite::Rewrite;
use crate::schema::{SchemaModel, SchemaProvider};

/// Knobs for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub normalize: bool,
    pub row_cap: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            normalize: false,
            row_cap: DEFAULT_ROW_CAP,
        }
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            normalize: config.normalize,
            row_cap: config.row_cap,
        }
    }
}

/// What executing the final SQL produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "kebab-case")]
pub enum Outcome {
    Rows(Vec<Row>),
    Failed(String),
}

/// Everything one question produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub question: String,
    /// The generator's reply, untouched.
    pub generated: String,
    /// The SQL that was executed.
    pub sql: String,
    pub repair: Rewrite,
    pub normalization: Option<Rewrite>,
    pub outcome: Outcome,
}

impl Answer {
    pub fn rows(&self) -> Option<&[Row]> {
        match &self.outcome {
            Outcome::Rows(rows) => Some(rows),
            Outcome::Failed(_) => None,
        }
    }

    /// "Question / Result" text block.
    pub fn summary(&self) -> String {
        format!("Question: {}\n\nResult:\n{}", self.question, self.outcome)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Rows(rows) => {
                let tuples: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        let cells: Vec<String> = row.iter().map(cell_to_string).collect();
                        format!("({})", cells.join(", "))
                    })
                    .collect();
                write!(f, "[{}]", tuples.join(", "))
            }
            Outcome::Failed(message) => write!(f, "SQL Execution Error: {}", message),
        }
    }
}

/// Generate → repair → (normalize) → execute.
pub struct Pipeline<P, G, E> {
    schema: P,
    generator: G,
    executor: E,
    options: PipelineOptions,
}

impl<P, G, E> Pipeline<P, G, E>
where
    P: SchemaProvider,
    G: QueryGenerator,
    E: Executor,
{
    pub fn new(schema: P, generator: G, executor: E) -> Self {
        Self {
            schema,
            generator,
            executor,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Fresh schema snapshot from the provider.
    pub async fn schema(&self) -> QsResult<SchemaModel> {
        self.schema.schema().await
    }

    /// Answer one question.
    ///
    /// A statement the database rejects still yields an [`Answer`] (with
    /// [`Outcome::Failed`]); generation and connection failures are errors.
    pub async fn ask(&self, question: &str) -> QsResult<Answer> {
        let schema = self.schema.schema().await?;
        info!(tables = schema.tables().len(), %question, "answering question");

        let generated = self.generator.generate(&schema, question).await?;
        let candidate = extract_sql(&generated);
        if candidate.is_empty() {
            return Err(QuerySpeakError::Generation("model returned no SQL".to_string()));
        }

        let repaired = repair(&candidate, &schema);
        let (sql, normalization) = if self.options.normalize {
            let normalized = normalize(&repaired.sql, &schema, self.options.row_cap);
            (normalized.sql.clone(), Some(normalized))
        } else {
            (repaired.sql.clone(), None)
        };
        info!(%sql, "executing");

        let outcome = match self.executor.execute(&sql).await {
            Ok(rows) => Outcome::Rows(rows),
            Err(QuerySpeakError::Execution(message)) => {
                warn!(%message, "execution failed");
                Outcome::Failed(message)
            }
            Err(other) => return Err(other),
        };

        Ok(Answer {
            question: question.to_string(),
            generated,
            sql,
            repair: repaired,
            normalization,
            outcome,
        })
    }

    /// Repair `sql` against a fresh schema snapshot.
    pub async fn fix(&self, sql: &str) -> QsResult<Rewrite> {
        let schema = self.schema.schema().await?;
        Ok(repair(sql, &schema))
    }

    /// Normalize `sql` against a fresh schema snapshot.
    pub async fn optimize(&self, sql: &str) -> QsResult<Rewrite> {
        let schema = self.schema.schema().await?;
        Ok(normalize(sql, &schema, self.options.row_cap))
    }

    pub fn explain(&self, sql: &str) -> Explanation {
        crate::explain::explain(sql)
    }

    pub async fn debug(&self, sql: &str) -> Diagnostic {
        crate::debug::debug(&self.executor, sql).await
    }
}

/// One remembered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub question: String,
    pub sql: String,
    /// Local wall-clock time, `HH:MM:SS`.
    pub time: String,
}

/// State that survives between questions for one user.
#[derive(Debug, Clone)]
pub struct Session {
    history: Vec<HistoryEntry>,
    latest: Option<Answer>,
    limit: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PipelineConfig::default().history_limit)
    }
}

impl Session {
    pub fn new(limit: usize) -> Self {
        Self {
            history: Vec::new(),
            latest: None,
            limit: limit.max(1),
        }
    }

    /// Remember `answer` as the latest and add it to the history.
    ///
    /// Re-asking a question (ignoring case) moves it to the end instead of
    /// duplicating it; only the newest `limit` questions are kept.
    pub fn record(&mut self, answer: Answer) {
        self.history
            .retain(|e| !e.question.eq_ignore_ascii_case(&answer.question));
        self.history.push(HistoryEntry {
            question: answer.question.clone(),
            sql: answer.sql.clone(),
            time: Local::now().format("%H:%M:%S").to_string(),
        });
        if self.history.len() > self.limit {
            let excess = self.history.len() - self.limit;
            self.history.drain(..excess);
        }
        self.latest = Some(answer);
    }

    pub fn latest(&self) -> Option<&Answer> {
        self.latest.as_ref()
    }

    /// Oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
}
