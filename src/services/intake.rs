use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;

use crate::models::upload::SourceFile;

/// Accepts a source document and hands back the job id that tracks it.
#[async_trait]
pub trait IntakeService: Send + Sync {
    async fn submit(&self, file: &SourceFile) -> Result<String, IntakeError>;
}

/// Client for the multipart upload endpoint.
pub struct HttpIntakeClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    file_id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    detail: Option<String>,
}

impl HttpIntakeClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl IntakeService for HttpIntakeClient {
    /// POST /api/upload with the document in the `file` field.
    async fn submit(&self, file: &SourceFile) -> Result<String, IntakeError> {
        let mime = file
            .detect_format()
            .map(|f| f.mime_type())
            .unwrap_or("application/octet-stream");

        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(mime)
            .map_err(IntakeError::Http)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/api/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(IntakeError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.detail)
                .unwrap_or_else(|| "Upload failed".to_string());
            return Err(IntakeError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let body: UploadResponse = response.json().await.map_err(IntakeError::Http)?;
        Ok(body.file_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{detail}")]
    Rejected { status: u16, detail: String },
}

impl IntakeError {
    /// Text published as the job's failure reason.
    pub fn detail(&self) -> String {
        match self {
            IntakeError::Rejected { detail, .. } => detail.clone(),
            IntakeError::Http(_) => self.to_string(),
        }
    }
}
