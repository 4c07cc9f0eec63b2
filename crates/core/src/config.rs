//! Configuration management for the lance-mcp server.
//!
//! Configuration is merged from several sources, lowest precedence first:
//! - Built-in defaults
//! - An optional YAML config file
//! - Environment variables
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default embedding service base URL (local Ollama).
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Default embedding request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// LanceDB storage location (directory path or URI)
    pub db_path: Option<PathBuf>,

    /// Base URL of the embedding service
    pub ollama_url: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Timeout for embedding requests
    pub request_timeout_secs: u64,

    /// Log filter override
    pub log_level: Option<String>,

    /// Disable colored log output
    pub no_color: bool,
}

/// YAML config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    database: Option<DatabaseSection>,
    embedding: Option<EmbeddingSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddingSection {
    url: Option<String>,
    model: Option<String>,
    #[serde(rename = "timeoutSecs")]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_level: None,
            no_color: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from defaults, an optional YAML file and the environment.
    ///
    /// Environment variables:
    /// - `LANCE_MCP_DB_PATH`: LanceDB storage location
    /// - `LANCE_MCP_OLLAMA_URL`: Embedding service base URL
    /// - `LANCE_MCP_EMBEDDING_MODEL`: Embedding model
    /// - `LANCE_MCP_REQUEST_TIMEOUT_SECS`: Embedding request timeout
    /// - `RUST_LOG`: Log filter
    /// - `NO_COLOR`: Disable colored output
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(AppError::Config(format!(
                    "Config file does not exist: {:?}",
                    path
                )));
            }
            config = config.merge_yaml(path)?;
        }

        if let Ok(db_path) = std::env::var("LANCE_MCP_DB_PATH") {
            config.db_path = Some(PathBuf::from(db_path));
        }

        if let Ok(url) = std::env::var("LANCE_MCP_OLLAMA_URL") {
            config.ollama_url = url;
        }

        if let Ok(model) = std::env::var("LANCE_MCP_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }

        if let Ok(timeout) = std::env::var("LANCE_MCP_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout.parse().map_err(|e| {
                AppError::Config(format!(
                    "Invalid LANCE_MCP_REQUEST_TIMEOUT_SECS '{}': {}",
                    timeout, e
                ))
            })?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(db) = config_file.database {
            if let Some(path) = db.path {
                result.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(embedding) = config_file.embedding {
            if let Some(url) = embedding.url {
                result.ollama_url = url;
            }
            if let Some(model) = embedding.model {
                result.embedding_model = model;
            }
            if let Some(timeout) = embedding.timeout_secs {
                result.request_timeout_secs = timeout;
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Flags take precedence over the file and the environment.
    pub fn with_overrides(
        mut self,
        db_path: Option<PathBuf>,
        ollama_url: Option<String>,
        embedding_model: Option<String>,
        log_level: Option<String>,
        no_color: bool,
    ) -> Self {
        if let Some(db_path) = db_path {
            self.db_path = Some(db_path);
        }

        if let Some(url) = ollama_url {
            self.ollama_url = url;
        }

        if let Some(model) = embedding_model {
            self.embedding_model = model;
        }

        if let Some(level) = log_level {
            self.log_level = Some(level);
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Storage location as a URI string for the store connection.
    pub fn db_uri(&self) -> AppResult<String> {
        self.db_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::Config("Database path is required (--db-path)".to_string()))
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> AppResult<()> {
        self.db_uri()?;

        if !(self.ollama_url.starts_with("http://") || self.ollama_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "Embedding URL must start with http:// or https://: {}",
                self.ollama_url
            )));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(AppError::Config("Embedding model must not be empty".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(AppError::Config(
                "Embedding request timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
