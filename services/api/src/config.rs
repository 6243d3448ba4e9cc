//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// HMAC secret for signing bearer tokens.
    pub jwt_secret: String,
    /// API key for the OpenAI-compatible model endpoint.
    pub llm_api_key: String,
    /// Base URL of the OpenAI-compatible endpoint (defaults to Gemini's
    /// compatibility surface, matching the production deployment).
    pub llm_api_base: String,
    pub chat_model: String,
    pub embed_model: String,
    pub pinecone_api_key: String,
    /// Data-plane host of the index; the host already names the index,
    /// so no separate index name is needed.
    pub pinecone_host: String,
    /// Cross-origin request sources allowed to call the API.
    pub allowed_origins: Vec<String>,
    /// Root directory for temporary uploads, scoped by content type below it.
    pub upload_dir: PathBuf,
    /// Per-client-address cap on chat submissions.
    pub chat_rate_limit_per_minute: u32,
    /// How many nearest chunks each chat turn retrieves.
    pub retrieval_top_k: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Secrets and Model Endpoints ---
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;

        let llm_api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| ConfigError::MissingVar("LLM_API_KEY".to_string()))?;
        let llm_api_base = std::env::var("LLM_API_BASE").unwrap_or_else(|_| {
            "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
        });
        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
        let embed_model =
            std::env::var("EMBED_MODEL").unwrap_or_else(|_| "gemini-embedding-001".to_string());

        // --- Vector Index Settings ---
        let pinecone_api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| ConfigError::MissingVar("PINECONE_API_KEY".to_string()))?;
        let pinecone_host = std::env::var("PINECONE_HOST")
            .map_err(|_| ConfigError::MissingVar("PINECONE_HOST".to_string()))?;

        // --- Web Settings ---
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec!["http://localhost:3000".to_string()]);

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let chat_rate_limit_per_minute = parse_or_default("CHAT_RATE_LIMIT_PER_MINUTE", 20)?;
        let retrieval_top_k = parse_or_default("RETRIEVAL_TOP_K", 5)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            jwt_secret,
            llm_api_key,
            llm_api_base,
            chat_model,
            embed_model,
            pinecone_api_key,
            pinecone_host,
            allowed_origins,
            upload_dir,
            chat_rate_limit_per_minute,
            retrieval_top_k,
        })
    }
}

fn parse_or_default<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(var.to_string(), raw)),
        Err(_) => Ok(default),
    }
}
