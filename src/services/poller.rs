use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::PollSettings;
use crate::models::status::StatusUpdate;
use crate::services::status::StatusService;

/// Delivered to the poll callback.
#[derive(Debug)]
pub enum PollEvent {
    /// A status record was received; not yet validated.
    Update(StatusUpdate),
    /// The consecutive-failure budget ran out. Polling has stopped.
    TransportExhausted { attempts: u32, last_error: String },
}

/// Returned by the poll callback to keep or stop the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

/// Fixed-interval poll loop against the status service.
#[derive(Clone)]
pub struct StatusPoller {
    service: Arc<dyn StatusService>,
    settings: PollSettings,
}

impl StatusPoller {
    pub fn new(service: Arc<dyn StatusService>, settings: PollSettings) -> Self {
        Self { service, settings }
    }

    /// Run the loop on a new task. Dropping or stopping the returned
    /// [`PollTask`] ends it.
    pub fn spawn<F>(&self, job_id: String, on_event: F) -> PollTask
    where
        F: FnMut(PollEvent) -> PollControl + Send + 'static,
    {
        let token = CancellationToken::new();
        let poller = self.clone();
        let child = token.clone();
        let handle = tokio::spawn(async move { poller.run(&job_id, child, on_event).await });
        PollTask {
            token,
            handle: Some(handle),
        }
    }

    /// Poll until the callback says stop, the budget is exhausted, or
    /// `token` is cancelled. Nothing is delivered once `token` is cancelled.
    pub async fn run<F>(&self, job_id: &str, token: CancellationToken, mut on_event: F)
    where
        F: FnMut(PollEvent) -> PollControl,
    {
        let budget = self.settings.max_consecutive_failures.max(1);
        let mut consecutive_failures = 0u32;

        loop {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = self.service.fetch_status(job_id) => result,
            };

            if token.is_cancelled() {
                break;
            }

            match result {
                Ok(raw) => {
                    consecutive_failures = 0;
                    trace!(job_id, stage = %raw.stage, progress = raw.progress, "Status received");
                    if on_event(PollEvent::Update(StatusUpdate::now(raw))) == PollControl::Stop {
                        debug!(job_id, "Poll loop stopped by consumer");
                        return;
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    metrics::counter!("tracker_poll_transport_failures_total").increment(1);
                    warn!(
                        job_id,
                        attempt = consecutive_failures,
                        budget,
                        error = %e,
                        "Status poll failed"
                    );

                    if consecutive_failures >= budget {
                        on_event(PollEvent::TransportExhausted {
                            attempts: consecutive_failures,
                            last_error: e.to_string(),
                        });
                        return;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep(self.settings.interval) => {}
            }
        }

        debug!(job_id, "Poll loop cancelled");
    }
}

/// Handle to a running poll loop. Dropping it requests stop.
#[derive(Debug)]
pub struct PollTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollTask {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
