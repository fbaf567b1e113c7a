use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::llm_client::{ALLOWED_MODELS, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Unset means sessions live in process memory.
    pub redis_url: Option<String>,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub openai_api_key: String,
    pub default_model: String,
    pub session_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        load_env_file();

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        if !ALLOWED_MODELS.contains(&default_model.as_str()) {
            bail!(
                "DEFAULT_MODEL '{default_model}' is not one of: {}",
                ALLOWED_MODELS.join(", ")
            );
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            default_model,
            session_ttl_secs: std::env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse::<u64>()
                .context("SESSION_TTL_SECS must be a whole number of seconds")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// `key.env` wins over `.env`; neither is required.
fn load_env_file() {
    if Path::new("key.env").exists() {
        dotenvy::from_filename("key.env").ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

#[cfg(test)]
impl Config {
    /// Config with placeholder values for handler tests that never touch external services.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/interviewer_test".to_string(),
            redis_url: None,
            s3_bucket: "transcripts-test".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            openai_api_key: "sk-test".to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            session_ttl_secs: 60,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
