//! Configuration module
//!
//! Server configuration is read from the environment (a `.env` file is honoured via
//! `dotenvy`). Unparseable numeric values fall back to their defaults; structural
//! problems (missing database URL, missing bucket) are reported by `validate`.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const ADMISSION_LIMIT: u32 = 30;
const ADMISSION_WINDOW_SECS: u64 = 60;
const RATE_LIMITER_SHARD_COUNT: usize = 16;
const TRUSTED_PROXY_COUNT: usize = 0;
const STORAGE_TIMEOUT_SECS: u64 = 30;
const STORE_TIMEOUT_SECS: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const LOCAL_STORAGE_PATH: &str = "./data";

/// Upper bound on mint attempts; a configured value above it is clamped.
pub const MINT_MAX_ATTEMPTS: u32 = 3;

/// Where session identities are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStoreBackend {
    Postgres,
    /// Process-local store for development and tests; nothing survives a restart.
    Memory,
}

impl FromStr for IdentityStoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(IdentityStoreBackend::Postgres),
            "memory" => Ok(IdentityStoreBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid identity store: {}", s)),
        }
    }
}

impl Display for IdentityStoreBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            IdentityStoreBackend::Postgres => write!(f, "postgres"),
            IdentityStoreBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    // Identity store
    pub identity_store: IdentityStoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub store_timeout_secs: u64,
    pub mint_max_attempts: u32,
    // Admission control
    pub admission_limit: u32,
    pub admission_window_secs: u64,
    pub rate_limiter_shard_count: usize,
    pub trusted_proxy_count: usize,
    // Object storage
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub storage_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    /// Development defaults: in-memory identity store, local object storage.
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            identity_store: IdentityStoreBackend::Memory,
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            store_timeout_secs: STORE_TIMEOUT_SECS,
            mint_max_attempts: MINT_MAX_ATTEMPTS,
            admission_limit: ADMISSION_LIMIT,
            admission_window_secs: ADMISSION_WINDOW_SECS,
            rate_limiter_shard_count: RATE_LIMITER_SHARD_COUNT,
            trusted_proxy_count: TRUSTED_PROXY_COUNT,
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: Some(LOCAL_STORAGE_PATH.to_string()),
            local_storage_base_url: Some(format!("http://localhost:{}/files", SERVER_PORT)),
            storage_timeout_secs: STORAGE_TIMEOUT_SECS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server_port: u16 = env::var("PORT")
            .unwrap_or_else(|_| SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        // Without an explicit choice, a configured database wins.
        let identity_store = match env::var("IDENTITY_STORE") {
            Ok(value) => value.parse()?,
            Err(_) if database_url.is_some() => IdentityStoreBackend::Postgres,
            Err(_) => IdentityStoreBackend::Memory,
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::Local,
        };

        let local_storage_path = env::var("LOCAL_STORAGE_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| {
                (storage_backend == StorageBackend::Local).then(|| LOCAL_STORAGE_PATH.to_string())
            });
        let local_storage_base_url = env::var("LOCAL_STORAGE_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| {
                (storage_backend == StorageBackend::Local)
                    .then(|| format!("http://localhost:{}/files", server_port))
            });

        let mint_max_attempts = env::var("MINT_MAX_ATTEMPTS")
            .unwrap_or_else(|_| MINT_MAX_ATTEMPTS.to_string())
            .parse::<u32>()
            .unwrap_or(MINT_MAX_ATTEMPTS)
            .clamp(1, MINT_MAX_ATTEMPTS);

        let config = ServerConfig {
            server_port,
            environment,
            cors_origins,
            identity_store,
            database_url,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            store_timeout_secs: env::var("STORE_TIMEOUT_SECS")
                .unwrap_or_else(|_| STORE_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(STORE_TIMEOUT_SECS),
            mint_max_attempts,
            admission_limit: env::var("ADMISSION_LIMIT")
                .unwrap_or_else(|_| ADMISSION_LIMIT.to_string())
                .parse()
                .unwrap_or(ADMISSION_LIMIT),
            admission_window_secs: env::var("ADMISSION_WINDOW_SECS")
                .unwrap_or_else(|_| ADMISSION_WINDOW_SECS.to_string())
                .parse()
                .unwrap_or(ADMISSION_WINDOW_SECS),
            rate_limiter_shard_count: env::var("RATE_LIMITER_SHARD_COUNT")
                .unwrap_or_else(|_| RATE_LIMITER_SHARD_COUNT.to_string())
                .parse()
                .unwrap_or(RATE_LIMITER_SHARD_COUNT),
            trusted_proxy_count: env::var("TRUSTED_PROXY_COUNT")
                .unwrap_or_else(|_| TRUSTED_PROXY_COUNT.to_string())
                .parse()
                .unwrap_or(TRUSTED_PROXY_COUNT),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok().filter(|s| !s.is_empty()),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok()
                .filter(|s| !s.is_empty()),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            local_storage_path,
            local_storage_base_url,
            storage_timeout_secs: env::var("STORAGE_TIMEOUT_SECS")
                .unwrap_or_else(|_| STORAGE_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(STORAGE_TIMEOUT_SECS),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REQUEST_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.is_production() && self.identity_store == IdentityStoreBackend::Memory {
            return Err(anyhow::anyhow!(
                "IDENTITY_STORE=memory is not allowed in production"
            ));
        }

        if self.identity_store == IdentityStoreBackend::Postgres {
            match self.database_url.as_deref() {
                None => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when IDENTITY_STORE=postgres"
                    ))
                }
                Some(url)
                    if !url.starts_with("postgres://") && !url.starts_with("postgresql://") =>
                {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
                Some(_) => {}
            }
        }

        if self.admission_limit == 0 {
            return Err(anyhow::anyhow!("ADMISSION_LIMIT must be greater than 0"));
        }
        if self.admission_window_secs == 0 {
            return Err(anyhow::anyhow!(
                "ADMISSION_WINDOW_SECS must be greater than 0"
            ));
        }
        if self.rate_limiter_shard_count == 0 {
            return Err(anyhow::anyhow!(
                "RATE_LIMITER_SHARD_COUNT must be greater than 0"
            ));
        }
        if self.mint_max_attempts == 0 || self.mint_max_attempts > MINT_MAX_ATTEMPTS {
            return Err(anyhow::anyhow!(
                "MINT_MAX_ATTEMPTS must be between 1 and {}",
                MINT_MAX_ATTEMPTS
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.s3_endpoint.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or S3_ENDPOINT must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServerConfig>);

impl Config {
    pub fn new(server: ServerConfig) -> Self {
        Config(Box::new(server))
    }

    fn as_server(&self) -> &ServerConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        Ok(Config::new(ServerConfig::from_env()?))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_server().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        self.as_server().is_production()
    }

    pub fn server_port(&self) -> u16 {
        self.as_server().server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_server().environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_server().cors_origins
    }

    pub fn identity_store(&self) -> IdentityStoreBackend {
        self.as_server().identity_store
    }

    pub fn database_url(&self) -> Option<&str> {
        self.as_server().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_server().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_server().db_timeout_seconds
    }

    pub fn store_timeout_secs(&self) -> u64 {
        self.as_server().store_timeout_secs
    }

    pub fn mint_max_attempts(&self) -> u32 {
        self.as_server().mint_max_attempts
    }

    pub fn admission_limit(&self) -> u32 {
        self.as_server().admission_limit
    }

    pub fn admission_window_secs(&self) -> u64 {
        self.as_server().admission_window_secs
    }

    pub fn rate_limiter_shard_count(&self) -> usize {
        self.as_server().rate_limiter_shard_count
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.as_server().trusted_proxy_count
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_server().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.as_server().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.as_server().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_server().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_server().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_server().local_storage_base_url.as_deref()
    }

    pub fn storage_timeout_secs(&self) -> u64 {
        self.as_server().storage_timeout_secs
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.as_server().request_timeout_secs
    }
}
