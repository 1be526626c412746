use garde::Validate;
use serde::Serialize;
use std::path::Path;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::config::UploadPolicy;

/// Document formats the intake service accepts.
#[derive(Debug, Clone, Copy, Serialize, Display, EnumIter, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
}

impl DocumentFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Txt => "text/plain",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => ".pdf",
            DocumentFormat::Docx => ".docx",
            DocumentFormat::Txt => ".txt",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        Self::iter().find(|f| f.mime_type().eq_ignore_ascii_case(essence))
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::iter().find(|f| lower.ends_with(f.extension()))
    }
}

/// A document selected for submission.
#[derive(Debug, Clone, Validate)]
pub struct SourceFile {
    #[garde(length(min = 1, max = 255))]
    pub file_name: String,

    #[garde(skip)]
    pub content_type: Option<String>,

    #[garde(skip)]
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// Read a file from disk; the content type is left for extension sniffing.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, None, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Either the declared MIME type or the file extension must be on the allow-list.
    pub fn detect_format(&self) -> Option<DocumentFormat> {
        self.content_type
            .as_deref()
            .and_then(DocumentFormat::from_mime)
            .or_else(|| DocumentFormat::from_file_name(&self.file_name))
    }

    /// Check the file against the intake rules without touching the network.
    pub fn check(&self, policy: &UploadPolicy) -> Result<DocumentFormat, ValidationError> {
        self.validate()
            .map_err(|report| ValidationError::Descriptor(report.to_string()))?;

        if self.bytes.is_empty() {
            return Err(ValidationError::Empty {
                file_name: self.file_name.clone(),
            });
        }

        let format = self
            .detect_format()
            .ok_or_else(|| ValidationError::UnsupportedFormat {
                file_name: self.file_name.clone(),
            })?;

        if self.size() > policy.max_bytes {
            return Err(ValidationError::TooLarge {
                size: self.size(),
                max: policy.max_bytes,
            });
        }

        Ok(format)
    }
}

/// Rejected before submission; returned synchronously from `start`.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid file descriptor: {0}")]
    Descriptor(String),

    #[error("File {file_name} is empty")]
    Empty { file_name: String },

    #[error("Invalid file type for {file_name}. Please upload PDF, DOCX, or TXT.")]
    UnsupportedFormat { file_name: String },

    #[error("File too large ({size} bytes). Maximum size is {max} bytes.")]
    TooLarge { size: u64, max: u64 },
}
