use anyhow::{Context, Result};

use crate::llm_client::LlmOptions;

const DEFAULT_MAX_BATCH_SIZE: usize = 10;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmOptions,
    pub max_batch_size: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let llm = LlmOptions::from_env().context("Failed to read LLM configuration")?;

        let max_batch_size = std::env::var("MAX_BATCH_SIZE")
            .unwrap_or_else(|_| DEFAULT_MAX_BATCH_SIZE.to_string())
            .parse::<usize>()
            .context("MAX_BATCH_SIZE must be a positive integer")?;
        anyhow::ensure!(max_batch_size > 0, "MAX_BATCH_SIZE must be greater than 0");

        Ok(Config {
            llm,
            max_batch_size,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
