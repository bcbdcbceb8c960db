use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_CACHE: &str = ".intake/session.json";

/// Client settings: `INTAKE_API_URL`, `INTAKE_TIMEOUT_SECS`, `INTAKE_SESSION_CACHE`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    /// Bound on every network call (mint, validate, transfer, delete).
    pub timeout: Duration,
    pub session_cache_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_cache_path: PathBuf::from(DEFAULT_SESSION_CACHE),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let api_url =
            std::env::var("INTAKE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let timeout_secs = match std::env::var("INTAKE_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("INTAKE_TIMEOUT_SECS must be a number, got {:?}", raw))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            anyhow::bail!("INTAKE_TIMEOUT_SECS must be greater than 0");
        }

        let session_cache_path = std::env::var("INTAKE_SESSION_CACHE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SESSION_CACHE));

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
            session_cache_path,
        })
    }
}
