use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Status record as returned by the processing service, before validation.
///
/// The stage is kept as a string and progress as a signed integer so that
/// malformed values reach the state machine instead of failing the decode.
/// A missing or `null` progress reads as 0 and fractional values are rounded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawStatus {
    pub stage: String,

    #[serde(default, deserialize_with = "lenient_progress")]
    pub progress: i64,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default, alias = "download_url")]
    pub artifact_ref: Option<String>,

    #[serde(default, alias = "error")]
    pub failure_reason: Option<String>,
}

impl RawStatus {
    pub fn new(stage: impl Into<String>, progress: i64) -> Self {
        Self {
            stage: stage.into(),
            progress,
            message: None,
            artifact_ref: None,
            failure_reason: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_artifact(mut self, artifact_ref: impl Into<String>) -> Self {
        self.artifact_ref = Some(artifact_ref.into());
        self
    }

    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

fn lenient_progress<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number
        .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)))
        .unwrap_or(0))
}

/// A raw status stamped with the time the poller received it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub raw: RawStatus,
    pub received_at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn now(raw: RawStatus) -> Self {
        Self {
            raw,
            received_at: Utc::now(),
        }
    }
}
