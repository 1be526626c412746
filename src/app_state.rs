use reqwest::Client;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    artifact::{ArtifactService, HttpArtifactClient},
    intake::{HttpIntakeClient, IntakeService},
    status::{HttpStatusClient, StatusService},
};

/// The external collaborators the orchestrator talks to.
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<dyn IntakeService>,
    pub status: Arc<dyn StatusService>,
    pub artifacts: Arc<dyn ArtifactService>,
}

impl AppState {
    pub fn new(
        intake: impl IntakeService + 'static,
        status: impl StatusService + 'static,
        artifacts: impl ArtifactService + 'static,
    ) -> Self {
        Self {
            intake: Arc::new(intake),
            status: Arc::new(status),
            artifacts: Arc::new(artifacts),
        }
    }

    /// HTTP clients for all three services, sharing one connection pool.
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("resume-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::new(
            HttpIntakeClient::new(http.clone(), &config.api_base_url),
            HttpStatusClient::new(http.clone(), &config.api_base_url),
            HttpArtifactClient::new(http),
        ))
    }
}
