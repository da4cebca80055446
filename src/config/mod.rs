//! Process configuration.
//!
//! One explicitly-owned `Config` value, built in `main` and passed down.
//! Defaults match the reference deployment (local Ollama, Northwind SQLite,
//! markdown policy docs); every field can be overridden from the environment.

/// Configuration for the copilot process
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Ollama server
    pub ollama_base_url: String,
    /// Model name passed to the completion API
    pub model: String,
    /// SQLite database URL (sqlx format)
    pub database_url: String,
    /// Maximum connections in the SQLite pool
    pub sqlite_max_connections: u32,
    /// Directory of markdown documents to index
    pub docs_dir: String,
    /// Chunks returned per retrieval call
    pub top_k: usize,
    /// Maximum SQL repair attempts per run
    pub max_repairs: u32,
    /// Completion request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://localhost:11434".to_string(),
            model: "qwen3:4b-instruct".to_string(),
            database_url: "sqlite:data/northwind.sqlite".to_string(),
            sqlite_max_connections: 5,
            docs_dir: "docs".to_string(),
            top_k: 3,
            max_repairs: 2,
            request_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COPILOT_OLLAMA_URL") {
            config.ollama_base_url = val;
        }
        if let Ok(val) = std::env::var("COPILOT_MODEL") {
            config.model = val;
        }
        if let Ok(val) = std::env::var("COPILOT_DATABASE_URL") {
            config.database_url = val;
        }
        if let Ok(val) = std::env::var("COPILOT_SQLITE_MAX_CONNECTIONS") {
            if let Ok(n) = val.parse() {
                config.sqlite_max_connections = n;
            }
        }
        if let Ok(val) = std::env::var("COPILOT_DOCS_DIR") {
            config.docs_dir = val;
        }
        if let Ok(val) = std::env::var("COPILOT_TOP_K") {
            if let Ok(n) = val.parse() {
                config.top_k = n;
            }
        }
        if let Ok(val) = std::env::var("COPILOT_MAX_REPAIRS") {
            if let Ok(n) = val.parse() {
                config.max_repairs = n;
            }
        }
        if let Ok(val) = std::env::var("COPILOT_REQUEST_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                config.request_timeout_secs = n;
            }
        }

        config
    }
}
