use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::models::status::RawStatus;

/// Reports the current state of a job advanced by the processing service.
#[async_trait]
pub trait StatusService: Send + Sync {
    async fn fetch_status(&self, job_id: &str) -> Result<RawStatus, TransportError>;
}

/// Client for the processing service's status endpoint.
pub struct HttpStatusClient {
    http: Client,
    base_url: String,
}

impl HttpStatusClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The job id is pushed as one percent-encoded path segment.
    fn status_url(&self, job_id: &str) -> Result<Url, TransportError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["api", "status", job_id]);
        Ok(url)
    }
}

#[async_trait]
impl StatusService for HttpStatusClient {
    /// GET /api/status/{job_id}
    async fn fetch_status(&self, job_id: &str) -> Result<RawStatus, TransportError> {
        let response = self
            .http
            .get(self.status_url(job_id)?)
            .send()
            .await
            .map_err(TransportError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        response.json::<RawStatus>().await.map_err(TransportError::Http)
    }
}

/// A status poll that produced no usable record.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Status request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Status endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Invalid status service URL: {0}")]
    InvalidUrl(String),
}
