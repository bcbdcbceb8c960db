//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;

use crate::state::AppState;
use anyhow::{Context, Result};
use intake_core::Config;
use intake_infra::{init_telemetry, LogFormat};
use std::sync::Arc;
use std::time::Duration;

const ADMISSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    init_telemetry(LogFormat::from_env()).context("Failed to initialize telemetry")?;

    validation::validate_config(&config).context("Configuration validation failed")?;
    crate::error::set_hide_error_details(config.is_production());
    tracing::info!("Configuration loaded and validated successfully");

    let store = database::setup_identity_store(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let state = Arc::new(AppState::new(config.clone(), store, storage));
    spawn_admission_cleanup(&state);

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

/// Periodically drop admission keys that have been idle for a full window.
fn spawn_admission_cleanup(state: &Arc<AppState>) {
    let admission = state.admission.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ADMISSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            admission.cleanup_expired().await;
        }
    });
}
