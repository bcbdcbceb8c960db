use anyhow::Context;
use intake_client::{BatchEvent, FileUploadTask, TaskId};
use intake_core::ApiOutcome;
use serde::Serialize;

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays JSON.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Turn a failed outcome into an error carrying the user-facing message.
pub fn require_ok<T>(outcome: ApiOutcome<T>, operation: &str) -> anyhow::Result<T> {
    match outcome {
        ApiOutcome::Ok(value) => Ok(value),
        failure => Err(anyhow::anyhow!(
            "{} failed ({}): {}",
            operation,
            failure.kind(),
            failure.user_message()
        )),
    }
}

/// One line per event worth showing while uploads run.
pub fn describe_event(event: &BatchEvent, tasks: &[FileUploadTask]) -> Option<String> {
    let name = |task: TaskId| {
        tasks
            .iter()
            .find(|t| t.id == task)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| task.to_string())
    };

    match event {
        BatchEvent::Rejected { file, reason, .. } => Some(format!("{}: {}", file.name, reason)),
        BatchEvent::Started { task, attempt } if *attempt > 1 => {
            Some(format!("{}: retrying (attempt {})", name(*task), attempt))
        }
        BatchEvent::Progress { task, percent, .. } if percent % 25 == 0 => {
            Some(format!("{}: {}%", name(*task), percent))
        }
        BatchEvent::Transferred { task, file, .. } => {
            Some(format!("{}: uploaded as {}", name(*task), file.key))
        }
        BatchEvent::Failed { task, error, .. } => Some(format!("{}: {}", name(*task), error)),
        _ => None,
    }
}
