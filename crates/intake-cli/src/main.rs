//! Intake CLI: drive the session and upload flow against an Intake server.
//!
//! Set INTAKE_API_URL (default http://localhost:3000). The session id is cached in
//! INTAKE_SESSION_CACHE between runs.

use anyhow::Context;
use clap::{Parser, Subcommand};
use intake_cli::{describe_event, init_tracing, print_json, require_ok};
use intake_client::{
    ApiClient, ClientConfig, FileSessionCache, HttpTransport, SelectedFile, SessionClient,
    UploadOrchestrator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "intake", about = "Intake onboarding CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session id, validating or minting it as needed
    Session {
        /// Drop the cached id and start a new session
        #[arg(long)]
        reset: bool,
    },
    /// Upload up to 3 PDF files for the current session
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove a previously uploaded file by its key
    Remove {
        /// Object key as printed by `upload`
        key: String,
    },
    /// Mark the current session complete
    Complete,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ClientConfig::from_env().context("Invalid client configuration")?;
    let api = ApiClient::from_config(&config)?;
    let cache = Arc::new(FileSessionCache::new(config.session_cache_path.clone()));
    let mut sessions = SessionClient::new(Arc::new(api.clone()), cache);

    let cli = Cli::parse();

    match cli.command {
        Commands::Session { reset } => {
            let outcome = if reset {
                sessions.reinitialize().await
            } else {
                sessions.ensure_session().await
            };
            let session = require_ok(outcome, "session")?;
            print_json(&serde_json::json!({
                "uuid": session.to_string(),
                "bound": sessions.state().is_bound(),
                "notice": sessions.state().notice(),
            }))?;
        }
        Commands::Upload { files } => {
            let session = require_ok(sessions.ensure_session().await, "session")?;

            let mut selected = Vec::with_capacity(files.len());
            for path in &files {
                selected.push(SelectedFile::from_path(path).await?);
            }

            let uploads = UploadOrchestrator::with_settings(
                Arc::new(HttpTransport::new(api.clone())),
                Default::default(),
                config.timeout,
            );
            let mut events = uploads.subscribe();
            let ids = uploads
                .enqueue(session, selected)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;

            let watcher = {
                let uploads = uploads.clone();
                tokio::spawn(async move {
                    loop {
                        match events.recv().await {
                            Ok(event) => {
                                if let Some(line) = describe_event(&event, &uploads.tasks()) {
                                    tracing::info!("{}", line);
                                }
                            }
                            Err(RecvError::Lagged(_)) => continue,
                            Err(RecvError::Closed) => break,
                        }
                    }
                })
            };

            uploads.settle().await;
            watcher.abort();

            let tasks: Vec<_> = ids.iter().filter_map(|id| uploads.task(*id)).collect();
            print_json(&serde_json::json!({
                "session": session.to_string(),
                "ready_to_advance": uploads.is_ready_to_advance(),
                "files": tasks,
            }))?;
        }
        Commands::Remove { key } => {
            let session = require_ok(sessions.ensure_session().await, "session")?;
            require_ok(api.delete_file(session, &key).await, "remove")?;
            print_json(&serde_json::json!({ "status": "success", "key": key }))?;
        }
        Commands::Complete => {
            let session = require_ok(sessions.ensure_session().await, "session")?;
            let response = require_ok(api.complete_session(session).await, "complete")?;
            print_json(&response)?;
        }
    }

    Ok(())
}
