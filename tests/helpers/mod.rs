//! Scripted collaborators and wait helpers for orchestrator tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};

use resume_tracker::app_state::AppState;
use resume_tracker::config::PollSettings;
use resume_tracker::models::job::ArtifactRef;
use resume_tracker::models::status::RawStatus;
use resume_tracker::services::artifact::{ArtifactError, ArtifactMode, ArtifactService};
use resume_tracker::services::intake::{IntakeError, IntakeService};
use resume_tracker::services::resources::LocalResource;
use resume_tracker::services::status::{StatusService, TransportError};
use resume_tracker::{JobOrchestrator, JobSnapshot, SourceFile};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Intake service that hands out queued responses in order.
#[derive(Clone, Default)]
pub struct FakeIntake {
    responses: Arc<Mutex<VecDeque<Result<String, (u16, String)>>>>,
    calls: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
}

impl FakeIntake {
    pub fn accepting(ids: &[&str]) -> Self {
        let intake = Self::default();
        for id in ids {
            intake.responses.lock().unwrap().push_back(Ok(id.to_string()));
        }
        intake
    }

    pub fn rejecting(status: u16, detail: &str) -> Self {
        let intake = Self::default();
        intake
            .responses
            .lock()
            .unwrap()
            .push_back(Err((status, detail.to_string())));
        intake
    }

    /// Park every submission until the gate is notified. Responses are
    /// assigned in call order, before parking.
    pub fn gated(self, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..self
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntakeService for FakeIntake {
    async fn submit(&self, _file: &SourceFile) -> Result<String, IntakeError> {
        let next = self.responses.lock().unwrap().pop_front();
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match next {
            Some(Ok(id)) => Ok(id),
            Some(Err((status, detail))) => Err(IntakeError::Rejected { status, detail }),
            None => Err(IntakeError::Rejected {
                status: 503,
                detail: "intake script exhausted".to_string(),
            }),
        }
    }
}

/// One scripted reply from the status service.
pub enum Step {
    Reply(RawStatus),
    Fail,
    /// Wait for the gate, then reply.
    Hold(Arc<Notify>, RawStatus),
}

/// Status service replaying a per-job script. Once a job's script runs out,
/// further polls never resolve.
#[derive(Clone, Default)]
pub struct ScriptedStatus {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Step>>>>,
    calls: Arc<AtomicUsize>,
    polled: Arc<Mutex<Vec<String>>>,
}

impl ScriptedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, job_id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(job_id.to_string(), steps.into_iter().collect());
        self
    }

    pub fn replies(self, job_id: &str, statuses: Vec<RawStatus>) -> Self {
        self.script(job_id, statuses.into_iter().map(Step::Reply).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Job ids in the order they were polled.
    pub fn polled_jobs(&self) -> Vec<String> {
        self.polled.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusService for ScriptedStatus {
    async fn fetch_status(&self, job_id: &str) -> Result<RawStatus, TransportError> {
        self.polled.lock().unwrap().push(job_id.to_string());
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(VecDeque::pop_front);
        match step {
            Some(Step::Reply(raw)) => Ok(raw),
            Some(Step::Fail) => Err(TransportError::Status(503)),
            Some(Step::Hold(gate, raw)) => {
                gate.notified().await;
                Ok(raw)
            }
            None => std::future::pending().await,
        }
    }
}

/// Artifact service returning fixed bytes.
#[derive(Clone, Default)]
pub struct FakeArtifacts {
    requested: Arc<Mutex<Vec<(String, ArtifactMode)>>>,
    gate: Option<Arc<Notify>>,
}

impl FakeArtifacts {
    /// Park every fetch until the gate is notified.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn requested(&self) -> Vec<(String, ArtifactMode)> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactService for FakeArtifacts {
    async fn fetch(&self, artifact: &ArtifactRef, mode: ArtifactMode) -> Result<Vec<u8>, ArtifactError> {
        self.requested
            .lock()
            .unwrap()
            .push((artifact.as_str().to_string(), mode));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(b"%PDF-1.7 optimized resume".to_vec())
    }
}

/// Resource that counts its releases.
#[derive(Debug)]
pub struct CountedResource(pub Arc<AtomicUsize>);

impl LocalResource for CountedResource {
    fn release(self: Box<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn fast_polling() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(5),
        max_consecutive_failures: 5,
    }
}

pub fn orchestrator(intake: &FakeIntake, status: &ScriptedStatus) -> JobOrchestrator {
    orchestrator_with_artifacts(intake, status, &FakeArtifacts::default())
}

pub fn orchestrator_with_artifacts(
    intake: &FakeIntake,
    status: &ScriptedStatus,
    artifacts: &FakeArtifacts,
) -> JobOrchestrator {
    let state = AppState::new(intake.clone(), status.clone(), artifacts.clone());
    JobOrchestrator::new(state, fast_polling())
}

/// Wait until the published snapshot satisfies `predicate`.
pub async fn wait_for_snapshot<F>(rx: &mut watch::Receiver<JobSnapshot>, predicate: F) -> JobSnapshot
where
    F: FnMut(&JobSnapshot) -> bool,
{
    let snapshot = tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("orchestrator dropped");
    snapshot.clone()
}

/// Wait until `counter()` reaches at least `target`.
pub async fn wait_for_calls<F>(mut counter: F, target: usize)
where
    F: FnMut() -> usize,
{
    tokio::time::timeout(WAIT_TIMEOUT, async {
        while counter() < target {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("timed out waiting for calls");
}

/// Record every snapshot the receiver observes until dropped.
pub fn record_snapshots(mut rx: watch::Receiver<JobSnapshot>) -> Arc<Mutex<Vec<JobSnapshot>>> {
    let seen = Arc::new(Mutex::new(vec![rx.borrow_and_update().clone()]));
    let sink = seen.clone();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            sink.lock().unwrap().push(snapshot);
        }
    });
    seen
}
