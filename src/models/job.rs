use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Processing stages reported by the optimization pipeline, in pipeline order.
///
/// `Failed` sorts last but is not "after" `Done`; it is reachable from any
/// non-terminal stage.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Uploading,
    Parsing,
    Enhancing,
    Generating,
    Compiling,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Step description shown while a stage is in progress and the
    /// service did not send its own message.
    pub fn default_message(self) -> &'static str {
        match self {
            Stage::Uploading => "Uploading your resume...",
            Stage::Parsing => "Extracting resume content...",
            Stage::Enhancing => "AI is enhancing your content...",
            Stage::Generating => "Generating optimized document...",
            Stage::Compiling => "Compiling final PDF...",
            Stage::Done => "Your resume is ready",
            Stage::Failed => "Processing failed",
        }
    }
}

/// Consumer-facing status derived from the current stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Idle,
    Active,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Reference to the finished file held by the artifact service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Direct-download URL.
    pub fn download_url(&self) -> &str {
        &self.0
    }

    /// Inline-rendering URL: the download URL with `preview=true` added to
    /// its query string (before any fragment).
    pub fn preview_url(&self) -> String {
        let (base, fragment) = match self.0.split_once('#') {
            Some((base, fragment)) => (base, Some(fragment)),
            None => (self.0.as_str(), None),
        };
        let separator = if base.contains('?') { '&' } else { '?' };
        let mut url = format!("{}{}preview=true", base, separator);
        if let Some(fragment) = fragment {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Observed state of the single job being tracked.
///
/// Only the stage state machine produces new handles; the orchestrator swaps
/// them in wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub(crate) id: String,
    pub(crate) stage: Stage,
    pub(crate) progress: u8,
    pub(crate) message: String,
    pub(crate) artifact_ref: Option<ArtifactRef>,
    pub(crate) failure_reason: Option<String>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl JobHandle {
    /// A freshly submitted job: `uploading`, 0%.
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            stage: Stage::Uploading,
            progress: 0,
            message: Stage::Uploading.default_message().to_string(),
            artifact_ref: None,
            failure_reason: None,
            updated_at: created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn artifact_ref(&self) -> Option<&ArtifactRef> {
        self.artifact_ref.as_ref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn status(&self) -> JobStatus {
        match self.stage {
            Stage::Done => JobStatus::Succeeded,
            Stage::Failed => JobStatus::Failed,
            _ => JobStatus::Active,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: Some(self.id.clone()),
            stage: Some(self.stage),
            progress: self.progress,
            message: self.message.clone(),
            artifact_ref: self.artifact_ref.clone(),
            failure_reason: self.failure_reason.clone(),
            status: self.status(),
            updated_at: Some(self.updated_at),
        }
    }
}

/// Immutable state published to consumers.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct JobSnapshot {
    pub job_id: Option<String>,
    pub stage: Option<Stage>,
    pub progress: u8,
    pub message: String,
    pub artifact_ref: Option<ArtifactRef>,
    pub failure_reason: Option<String>,
    pub status: JobStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Failure reported before any job id was issued (e.g., intake rejected the file).
    pub fn failed_without_job(reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        let reason = reason.into();
        Self {
            message: reason.clone(),
            failure_reason: Some(reason),
            status: JobStatus::Failed,
            updated_at: Some(at),
            ..Self::default()
        }
    }
}
