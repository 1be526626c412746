use std::path::PathBuf;
use std::process::ExitCode;

use resume_tracker::{
    app_state::AppState, config::AppConfig, JobOrchestrator, JobStatus, SourceFile,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: resume-tracker <resume.pdf|resume.docx|resume.txt>");
        return ExitCode::from(2);
    };

    // Load configuration from environment
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration from environment");
            return ExitCode::FAILURE;
        }
    };

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize HTTP clients");
            return ExitCode::FAILURE;
        }
    };

    let file = match SourceFile::read(&path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read source file");
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = JobOrchestrator::from_config(state, &config);
    let mut updates = orchestrator.subscribe();

    tracing::info!(api = %config.api_base_url, "Starting resume optimization");

    if let Err(e) = orchestrator.start(file).await {
        tracing::error!(error = %e, "File rejected before upload");
        return ExitCode::FAILURE;
    }

    loop {
        let snapshot = updates.borrow_and_update().clone();
        tracing::info!(
            status = %snapshot.status,
            stage = ?snapshot.stage,
            progress = snapshot.progress,
            message = %snapshot.message,
            "Progress"
        );

        match snapshot.status {
            JobStatus::Succeeded => {
                if let Some(artifact) = snapshot.artifact_ref {
                    println!("download: {}", artifact.download_url());
                    println!("preview:  {}", artifact.preview_url());
                }
                return ExitCode::SUCCESS;
            }
            JobStatus::Failed => {
                eprintln!(
                    "failed: {}",
                    snapshot.failure_reason.unwrap_or_default()
                );
                return ExitCode::FAILURE;
            }
            JobStatus::Idle | JobStatus::Active => {}
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return ExitCode::FAILURE;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, cancelling job");
                orchestrator.cancel();
                return ExitCode::from(130);
            }
        }
    }
}
