//! Query generation: schema + question in, candidate SQL out.
//!
//! The model is a black box. Whatever it returns goes through
//! [`extract_sql`] and then the repair pass; nothing here tries to judge
//! whether the SQL answers the question.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::error::{QsResult, QuerySpeakError};
use crate::scan::SqlText;
use crate::schema::SchemaModel;

/// Keywords a bare statement may open with.
const STATEMENT_STARTS: &[&str] = &["select", "with"];

/// Produces one candidate SQL string for a question.
pub trait QueryGenerator {
    fn generate(
        &self,
        schema: &SchemaModel,
        question: &str,
    ) -> impl Future<Output = QsResult<String>> + Send;
}

/// Build the prompt sent to the model.
pub fn build_prompt(schema: &SchemaModel, question: &str) -> String {
    format!(
        "You are an expert SQL agent working with SQLite.\n\
         \n\
         Below is the database schema.\n\
         Write ONE SQL query that accurately answers the user's question.\n\
         \n\
         - Use table names exactly as shown.\n\
         - Do NOT include explanations.\n\
         - Output ONLY the SQL query.\n\
         \n\
         DATABASE SCHEMA:\n\
         {}\n\
         USER QUESTION:\n\
         {}\n\
         \n\
         Write ONLY the SQL query:\n",
        schema.describe(),
        question.trim()
    )
}

/// Pull a single statement out of a model reply.
///
/// Strips Markdown fences, any prose before the statement, and everything
/// from the first `;` outside a string literal on. A reply that already opens with `SELECT` or
/// `WITH` keeps its start.
///
/// ```
/// use queryspeak::generator::extract_sql;
///
/// let reply = "Sure! Here it is:\n```sql\nSELECT name FROM employees;\n```";
/// assert_eq!(extract_sql(reply), "SELECT name FROM employees");
/// ```
pub fn extract_sql(reply: &str) -> String {
    let mut body = reply.trim();

    if let Some(open) = body.find("```") {
        let after = &body[open + 3..];
        // Drop the info string (```sql) up to the end of the fence line.
        let after = match after.find('\n') {
            Some(nl) => &after[nl + 1..],
            None => after,
        };
        body = match after.find("```") {
            Some(close) => &after[..close],
            None => after,
        };
    }

    let text = SqlText::new(body);
    if !STATEMENT_STARTS.iter().any(|kw| text.starts_with(kw)) {
        if let Some(start) = text.find("select") {
            body = text.between(start.start, body.len());
        }
    }

    let text = SqlText::new(body);
    let body = match text.find_char(';') {
        Some(end) => text.between(0, end),
        None => body,
    };
    body.trim().to_string()
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatGenerator {
    http: Client,
    config: GeneratorConfig,
}

impl ChatGenerator {
    pub fn new(config: GeneratorConfig) -> QsResult<Self> {
        if config.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(QuerySpeakError::Config(
                "generator.api_key is missing (set GROQ_API_KEY)".to_string(),
            ));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QuerySpeakError::Generation(e.to_string()))?;

        info!(model = %config.model, endpoint = %config.base_url, "query generator ready");
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

impl QueryGenerator for ChatGenerator {
    async fn generate(&self, schema: &SchemaModel, question: &str) -> QsResult<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![Message {
                role: "user",
                content: build_prompt(schema, question),
            }],
            temperature: self.config.temperature,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| QuerySpeakError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuerySpeakError::Generation(format!("HTTP {}: {}", status, body)));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| QuerySpeakError::Generation(e.to_string()))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| QuerySpeakError::Generation("empty reply from model".to_string()))?;

        debug!(reply = %content, "model reply");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_plain() {
        assert_eq!(extract_sql("SELECT * FROM employees"), "SELECT * FROM employees");
    }

    #[test]
    fn test_extract_fenced() {
        assert_eq!(
            extract_sql("```sql\nSELECT name\nFROM employees\n```"),
            "SELECT name\nFROM employees"
        );
        assert_eq!(extract_sql("```sql SELECT 1```"), "SELECT 1");
    }

    #[test]
    fn test_extract_strips_prose_and_extra_statements() {
        assert_eq!(
            extract_sql("The answer is: select id from employees; DROP TABLE employees;"),
            "select id from employees"
        );
    }

    #[test]
    fn test_extract_keeps_semicolon_inside_literal() {
        assert_eq!(
            extract_sql("SELECT id FROM employees WHERE name = 'a;b'"),
            "SELECT id FROM employees WHERE name = 'a;b'"
        );
        assert_eq!(
            extract_sql("SELECT id FROM employees WHERE name = 'a;b'; DELETE FROM employees"),
            "SELECT id FROM employees WHERE name = 'a;b'"
        );
    }

    #[test]
    fn test_extract_with_cte() {
        assert_eq!(
            extract_sql("WITH top AS (SELECT * FROM employees) SELECT * FROM top"),
            "WITH top AS (SELECT * FROM employees) SELECT * FROM top"
        );
    }

    #[test]
    fn test_extract_keeps_unrecognized_text() {
        assert_eq!(extract_sql("  I cannot answer that.  "), "I cannot answer that.");
    }

    #[test]
    fn test_prompt_contains_schema_and_question() {
        let schema = SchemaModel::new().with_table("employees", [("id", "INTEGER")]);
        let prompt = build_prompt(&schema, " Who earns most? ");
        assert!(prompt.contains("employees(id INTEGER)"));
        assert!(prompt.contains("USER QUESTION:\nWho earns most?\n"));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = ChatGenerator::new(GeneratorConfig::default()).unwrap_err();
        assert!(matches!(err, QuerySpeakError::Config(_)));
    }
}
