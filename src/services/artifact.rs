use async_trait::async_trait;
use reqwest::Client;

use crate::models::job::ArtifactRef;

/// How the finished file is requested from the artifact service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactMode {
    /// Embeddable inline rendering (`?preview=true`).
    Preview,
    /// The file as an attachment.
    Download,
}

impl ArtifactMode {
    pub fn url_for(self, artifact: &ArtifactRef) -> String {
        match self {
            ArtifactMode::Preview => artifact.preview_url(),
            ArtifactMode::Download => artifact.download_url().to_string(),
        }
    }
}

/// Serves finished files referenced by a published `ArtifactRef`.
#[async_trait]
pub trait ArtifactService: Send + Sync {
    async fn fetch(&self, artifact: &ArtifactRef, mode: ArtifactMode) -> Result<Vec<u8>, ArtifactError>;
}

pub struct HttpArtifactClient {
    http: Client,
}

impl HttpArtifactClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ArtifactService for HttpArtifactClient {
    async fn fetch(&self, artifact: &ArtifactRef, mode: ArtifactMode) -> Result<Vec<u8>, ArtifactError> {
        let response = self
            .http
            .get(mode.url_for(artifact))
            .send()
            .await
            .map_err(ArtifactError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArtifactError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(ArtifactError::Http)?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Artifact service returned HTTP {0}")]
    Status(u16),
}
