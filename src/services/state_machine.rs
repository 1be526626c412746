//! Stage transition rules.
//!
//! `apply` is a pure function from the current handle and a raw poll result
//! to the next handle. It never performs I/O and never surfaces an error to
//! consumers: rejected updates are returned as a [`Rejection`] for the caller
//! to log and drop, and malformed terminal updates are folded into `failed`.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::models::job::{ArtifactRef, JobHandle, Stage};
use crate::models::status::StatusUpdate;

/// Failure reason used when the service reports `failed` without a diagnostic.
pub const GENERIC_FAILURE_REASON: &str = "Processing failed for an unknown reason";

/// Failure reason used when the service reports `done` without an artifact.
pub const MISSING_ARTIFACT_REASON: &str =
    "Processing finished but the service did not return a download reference";

/// Failure reason published when the status service stays unreachable.
pub const TRANSPORT_FAILURE_REASON: &str =
    "Lost contact with the processing service. Please try again.";

/// Why an update was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("stale update: reported {reported} while at {current}")]
    Stale { current: Stage, reported: Stage },

    #[error("job already reached terminal stage {0}")]
    AlreadyTerminal(Stage),

    #[error("unknown stage {0:?}")]
    UnknownStage(String),
}

/// A terminal update that lacked the data it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("done reported without an artifact reference")]
    MissingArtifact,

    #[error("failed reported without a failure reason")]
    MissingFailureReason,
}

/// An accepted update.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub handle: JobHandle,
    /// Set when the update was accepted only after substituting missing data.
    pub protocol_error: Option<ProtocolError>,
}

impl Transition {
    pub fn advanced_from(&self, previous: &JobHandle) -> bool {
        self.handle.stage != previous.stage
    }
}

pub fn apply(current: &JobHandle, update: &StatusUpdate) -> Result<Transition, Rejection> {
    if current.stage.is_terminal() {
        return Err(Rejection::AlreadyTerminal(current.stage));
    }

    let raw = &update.raw;
    let reported = Stage::from_str(raw.stage.trim())
        .map_err(|_| Rejection::UnknownStage(raw.stage.clone()))?;

    if reported != Stage::Failed && reported < current.stage {
        return Err(Rejection::Stale {
            current: current.stage,
            reported,
        });
    }

    let progress = clamp_progress(raw.progress);
    let message = non_empty(raw.message.as_deref());

    let mut next = current.clone();
    next.updated_at = update.received_at;
    let mut protocol_error = None;

    match reported {
        Stage::Done => match non_empty(raw.artifact_ref.as_deref()) {
            Some(artifact) => {
                next.stage = Stage::Done;
                next.progress = 100;
                next.artifact_ref = Some(ArtifactRef::new(artifact));
                next.message = message.unwrap_or(Stage::Done.default_message()).to_string();
            }
            None => {
                protocol_error = Some(ProtocolError::MissingArtifact);
                fail(&mut next, MISSING_ARTIFACT_REASON);
            }
        },
        Stage::Failed => {
            let reason = match non_empty(raw.failure_reason.as_deref()) {
                Some(reason) => reason,
                None => {
                    protocol_error = Some(ProtocolError::MissingFailureReason);
                    GENERIC_FAILURE_REASON
                }
            };
            fail(&mut next, reason);
            if let Some(message) = message {
                next.message = message.to_string();
            }
        }
        stage if stage == current.stage => {
            next.progress = current.progress.max(progress);
            if let Some(message) = message {
                next.message = message.to_string();
            }
        }
        stage => {
            next.stage = stage;
            next.progress = progress;
            next.message = message.unwrap_or(stage.default_message()).to_string();
        }
    }

    Ok(Transition {
        handle: next,
        protocol_error,
    })
}

/// Terminal transition taken when the poller's failure budget runs out.
pub fn transport_failure(current: &JobHandle, at: DateTime<Utc>) -> Result<JobHandle, Rejection> {
    if current.stage.is_terminal() {
        return Err(Rejection::AlreadyTerminal(current.stage));
    }
    let mut next = current.clone();
    next.updated_at = at;
    fail(&mut next, TRANSPORT_FAILURE_REASON);
    Ok(next)
}

fn fail(handle: &mut JobHandle, reason: &str) {
    handle.stage = Stage::Failed;
    handle.artifact_ref = None;
    handle.failure_reason = Some(reason.to_string());
    handle.message = Stage::Failed.default_message().to_string();
}

fn clamp_progress(progress: i64) -> u8 {
    progress.clamp(0, 100) as u8
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
