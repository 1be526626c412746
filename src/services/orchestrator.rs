//! Public controller for the single tracked job.
//!
//! The orchestrator owns the current [`JobHandle`], the poll task driving it
//! and the local resources derived from its result. Consumers interact through
//! `start`, `cancel`/`reset` and read-only snapshots published on a
//! `tokio::sync::watch` channel.
//!
//! Every job gets a generation number. `cancel`, `start` and drop bump it under
//! the state lock, and every poll result or upload response re-checks it under
//! the same lock before touching state, so late responses for a discarded job
//! are dropped even when they race the cancellation.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::config::{AppConfig, PollSettings, UploadPolicy};
use crate::models::job::{JobHandle, JobSnapshot, JobStatus};
use crate::models::upload::{SourceFile, ValidationError};
use crate::services::artifact::{ArtifactError, ArtifactMode};
use crate::services::poller::{PollControl, PollEvent, PollTask, StatusPoller};
use crate::services::resources::{LocalResource, PreviewFile, ResourceLifecycleManager};
use crate::services::state_machine::{self, Rejection};

pub struct JobOrchestrator {
    state: AppState,
    poller: StatusPoller,
    upload_policy: UploadPolicy,
    preview_dir: PathBuf,
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    publisher: watch::Sender<JobSnapshot>,
}

#[derive(Default)]
struct Inner {
    generation: u64,
    job: Option<ActiveJob>,
    resources: ResourceLifecycleManager,
}

struct ActiveJob {
    handle: JobHandle,
    poll: Option<PollTask>,
    started: Instant,
}

impl JobOrchestrator {
    pub fn new(state: AppState, poll_settings: PollSettings) -> Self {
        let poller = StatusPoller::new(state.status.clone(), poll_settings);
        let (publisher, _) = watch::channel(JobSnapshot::idle());
        Self {
            state,
            poller,
            upload_policy: UploadPolicy::default(),
            preview_dir: std::env::temp_dir().join("resume-previews"),
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                publisher,
            }),
        }
    }

    pub fn from_config(state: AppState, config: &AppConfig) -> Self {
        Self::new(state, config.poll_settings())
            .with_upload_policy(config.upload_policy())
            .with_preview_dir(config.preview_dir.clone())
    }

    pub fn with_upload_policy(mut self, policy: UploadPolicy) -> Self {
        self.upload_policy = policy;
        self
    }

    pub fn with_preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preview_dir = dir.into();
        self
    }

    /// Submit `file` and begin tracking the resulting job.
    ///
    /// Only validation failures are returned; an invalid file leaves the
    /// current job untouched. Intake and processing failures are published
    /// as a `failed` snapshot instead.
    pub async fn start(&self, file: SourceFile) -> Result<(), ValidationError> {
        let format = file.check(&self.upload_policy)?;

        let (generation, retired) = {
            let mut inner = self.shared.lock();
            let retired = self.shared.discard(&mut inner, "superseded");
            self.shared.publish(JobSnapshot::idle());
            (inner.generation, retired)
        };
        drop(retired);

        metrics::counter!("tracker_jobs_started_total").increment(1);
        info!(
            file_name = %file.file_name,
            format = %format,
            size_bytes = file.size(),
            generation,
            "Submitting file for optimization"
        );

        let submitted = self.state.intake.submit(&file).await;

        let mut inner = self.shared.lock();
        if inner.generation != generation {
            debug!(generation, "Upload finished after the job was cancelled; ignoring");
            return Ok(());
        }

        match submitted {
            Ok(job_id) => {
                let handle = JobHandle::new(job_id.clone(), Utc::now());
                self.shared.publish(handle.snapshot());

                let weak = Arc::downgrade(&self.shared);
                let poll = self.poller.spawn(job_id.clone(), move |event| {
                    Shared::deliver(&weak, generation, event)
                });

                inner.job = Some(ActiveJob {
                    handle,
                    poll: Some(poll),
                    started: Instant::now(),
                });
                info!(job_id = %job_id, generation, "Job accepted, polling for status");
            }
            Err(e) => {
                metrics::counter!("tracker_jobs_failed_total").increment(1);
                warn!(error = %e, "Intake rejected the file");
                self.shared
                    .publish(JobSnapshot::failed_without_job(e.detail(), Utc::now()));
            }
        }

        Ok(())
    }

    /// Stop tracking, release local resources and publish `idle`. Idempotent.
    pub fn cancel(&self) {
        let retired = {
            let mut inner = self.shared.lock();
            let retired = self.shared.discard(&mut inner, "cancelled");
            self.shared.publish(JobSnapshot::idle());
            retired
        };
        drop(retired);
    }

    /// Same as [`cancel`](Self::cancel); used when the consumer wants to start over.
    pub fn reset(&self) {
        self.cancel();
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.publisher.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.shared.publisher.subscribe()
    }

    pub fn download_url(&self) -> Option<String> {
        self.snapshot()
            .artifact_ref
            .map(|a| ArtifactMode::Download.url_for(&a))
    }

    pub fn preview_url(&self) -> Option<String> {
        self.snapshot()
            .artifact_ref
            .map(|a| ArtifactMode::Preview.url_for(&a))
    }

    /// Hand a resource derived from the current job to the lifecycle manager.
    ///
    /// Without a current job the resource is released immediately and `false`
    /// is returned.
    pub fn adopt_resource(&self, resource: Box<dyn LocalResource>) -> bool {
        let mut inner = self.shared.lock();
        if inner.job.is_none() {
            drop(inner);
            resource.release();
            return false;
        }
        let retired = std::mem::take(&mut inner.resources);
        inner.resources.adopt(resource);
        drop(inner);
        drop(retired);
        true
    }

    /// Fetch the finished file in preview mode and keep a local copy until the
    /// job is cancelled, reset or superseded.
    pub async fn open_preview(&self) -> Result<PathBuf, PreviewError> {
        let (generation, job_id, artifact) = {
            let inner = self.shared.lock();
            let job = inner.job.as_ref().ok_or(PreviewError::NotReady)?;
            let artifact = job
                .handle
                .artifact_ref()
                .cloned()
                .ok_or(PreviewError::NotReady)?;
            (inner.generation, job.handle.id().to_string(), artifact)
        };

        let bytes = self
            .state
            .artifacts
            .fetch(&artifact, ArtifactMode::Preview)
            .await?;
        let preview = Box::new(PreviewFile::create(&self.preview_dir, &job_id, &bytes).await?);
        let path = preview.path().to_path_buf();

        let mut inner = self.shared.lock();
        if inner.generation != generation {
            drop(inner);
            preview.release();
            return Err(PreviewError::Superseded);
        }
        let retired = std::mem::take(&mut inner.resources);
        inner.resources.adopt(preview);
        drop(inner);
        drop(retired);
        info!(job_id = %job_id, path = %path.display(), "Preview ready");
        Ok(path)
    }
}

impl Drop for JobOrchestrator {
    fn drop(&mut self) {
        let retired = {
            let mut inner = self.shared.lock();
            self.shared.discard(&mut inner, "dropped")
        };
        drop(retired);
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, snapshot: JobSnapshot) {
        self.publisher.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Invalidate the current generation: stop polling and drop the handle.
    ///
    /// The job's resources are handed back to the caller, which releases them
    /// once the state lock is gone; releasing may touch the filesystem.
    #[must_use]
    fn discard(&self, inner: &mut Inner, why: &'static str) -> ResourceLifecycleManager {
        inner.generation += 1;
        let retired = std::mem::take(&mut inner.resources);

        if let Some(mut job) = inner.job.take() {
            if let Some(poll) = job.poll.take() {
                poll.stop();
            }
            if job.handle.status() == JobStatus::Active {
                metrics::counter!("tracker_jobs_cancelled_total").increment(1);
            }
            info!(
                job_id = %job.handle.id(),
                reason = why,
                releasing_resource = retired.is_tracking(),
                "Job discarded"
            );
        }
        retired
    }

    fn deliver(weak: &Weak<Shared>, generation: u64, event: PollEvent) -> PollControl {
        match weak.upgrade() {
            Some(shared) => shared.on_poll_event(generation, event),
            None => PollControl::Stop,
        }
    }

    fn on_poll_event(&self, generation: u64, event: PollEvent) -> PollControl {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(generation, "Dropping poll result for a discarded job");
            return PollControl::Stop;
        }
        let Some(job) = inner.job.as_mut() else {
            return PollControl::Stop;
        };

        let next = match event {
            PollEvent::Update(update) => match state_machine::apply(&job.handle, &update) {
                Ok(transition) => {
                    if let Some(violation) = transition.protocol_error {
                        warn!(job_id = %job.handle.id(), error = %violation, "Protocol violation from status service");
                    }
                    if transition.advanced_from(&job.handle) {
                        info!(
                            job_id = %job.handle.id(),
                            from = %job.handle.stage(),
                            to = %transition.handle.stage(),
                            progress = transition.handle.progress(),
                            "Stage advanced"
                        );
                    }
                    transition.handle
                }
                Err(Rejection::AlreadyTerminal(stage)) => {
                    debug!(job_id = %job.handle.id(), stage = %stage, "Update after terminal stage ignored");
                    return PollControl::Stop;
                }
                Err(rejection) => {
                    metrics::counter!("tracker_stale_updates_total").increment(1);
                    debug!(job_id = %job.handle.id(), reason = %rejection, "Status update dropped");
                    return PollControl::Continue;
                }
            },
            PollEvent::TransportExhausted {
                attempts,
                last_error,
            } => {
                warn!(
                    job_id = %job.handle.id(),
                    attempts,
                    error = %last_error,
                    "Status service unreachable, giving up"
                );
                match state_machine::transport_failure(&job.handle, Utc::now()) {
                    Ok(handle) => handle,
                    Err(_) => return PollControl::Stop,
                }
            }
        };

        job.handle = next;
        let status = job.handle.status();
        let snapshot = job.handle.snapshot();

        let control = if status.is_terminal() {
            record_outcome(job);
            job.poll = None;
            PollControl::Stop
        } else {
            PollControl::Continue
        };

        self.publish(snapshot);
        control
    }
}

fn record_outcome(job: &ActiveJob) {
    let elapsed = job.started.elapsed().as_secs_f64();
    metrics::histogram!("tracker_job_duration_seconds").record(elapsed);

    match job.handle.status() {
        JobStatus::Succeeded => {
            metrics::counter!("tracker_jobs_succeeded_total").increment(1);
            info!(
                job_id = %job.handle.id(),
                duration_secs = elapsed,
                artifact = ?job.handle.artifact_ref().map(|a| a.as_str()),
                "Job completed successfully"
            );
        }
        _ => {
            metrics::counter!("tracker_jobs_failed_total").increment(1);
            warn!(
                job_id = %job.handle.id(),
                duration_secs = elapsed,
                reason = ?job.handle.failure_reason(),
                "Job failed"
            );
        }
    }
}

/// Failure of the optional preview download.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("No finished artifact to preview")]
    NotReady,

    #[error("Job was cancelled while the preview was downloading")]
    Superseded,

    #[error("Failed to fetch artifact: {0}")]
    Fetch(#[from] ArtifactError),

    #[error("Failed to write preview file: {0}")]
    Io(#[from] std::io::Error),
}
