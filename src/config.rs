//! Configuration.
//!
//! Read from TOML. Lookup order: an explicit path, then
//! `<config dir>/queryspeak/config.toml`, then built-in defaults.
//!
//! ```toml
//! database_url = "sqlite://database.db"
//!
//! [generator]
//! model = "llama-3.1-8b-instant"
//!
//! [pipeline]
//! normalize = true
//! row_cap = 50
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{QsResult, QuerySpeakError};
use crate::optimize::DEFAULT_ROW_CAP;

/// Main configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    pub generator: GeneratorConfig,

    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://database.db".to_string(),
            generator: GeneratorConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Settings for the OpenAI-compatible query generator.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// API key; `GROQ_API_KEY` overrides it.
    pub api_key: Option<String>,

    /// Base URL up to (not including) `/chat/completions`.
    pub base_url: String,

    pub model: String,

    pub temperature: f32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the normalization pass after repair.
    pub normalize: bool,

    /// `LIMIT` appended by normalization when the query has none.
    pub row_cap: usize,

    /// Questions kept in a session's history.
    pub history_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalize: false,
            row_cap: DEFAULT_ROW_CAP,
            history_limit: 15,
        }
    }
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> QsResult<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| QuerySpeakError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing default file is not an error; a missing explicit one is a
    /// [`QuerySpeakError::Config`]. Read failures surface as
    /// [`QuerySpeakError::Io`].
    pub fn load(path: Option<&Path>) -> QsResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Err(QuerySpeakError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "loading config");
        let text = std::fs::read_to_string(&path)?;
        Self::from_toml(&text)
    }

    /// `<config dir>/queryspeak/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("queryspeak").join("config.toml"))
    }

    /// Apply values that came from the command line or the environment.
    pub fn with_overrides(mut self, database_url: Option<String>, api_key: Option<String>) -> Self {
        if let Some(url) = database_url {
            self.database_url = url;
        }
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.generator.api_key = Some(key);
        }
        self
    }

    fn validate(&self) -> QsResult<()> {
        if self.pipeline.row_cap == 0 {
            return Err(QuerySpeakError::Config("pipeline.row_cap must be at least 1".into()));
        }
        if self.pipeline.history_limit == 0 {
            return Err(QuerySpeakError::Config(
                "pipeline.history_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_gives_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            database_url = "sqlite://company.db"

            [pipeline]
            normalize = true
            row_cap = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.database_url, "sqlite://company.db");
        assert!(config.pipeline.normalize);
        assert_eq!(config.pipeline.row_cap, 50);
        assert_eq!(config.pipeline.history_limit, 15);
        assert_eq!(config.generator.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_toml("[pipeline]\nrow_cap = 0").unwrap_err();
        assert!(matches!(err, QuerySpeakError::Config(_)));
        let err = Config::from_toml("database_url = 5").unwrap_err();
        assert!(matches!(err, QuerySpeakError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let config = Config::default().with_overrides(
            Some("sqlite::memory:".into()),
            Some(String::new()),
        );
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.generator.api_key, None);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, QuerySpeakError::Config(_)));
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        // A directory exists but cannot be read as text.
        let err = Config::load(Some(&std::env::temp_dir())).unwrap_err();
        assert!(matches!(err, QuerySpeakError::Io(_)));
    }
}
