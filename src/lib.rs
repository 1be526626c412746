//! Resume Optimization Job Tracker
//!
//! This library tracks a single resume optimization job from file submission
//! to a finished PDF (or a failure): it submits the file to the intake
//! service, polls the processing service, validates each stage transition and
//! publishes read-only snapshots for a UI or CLI to render.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;

pub use models::job::{ArtifactRef, JobSnapshot, JobStatus, Stage};
pub use models::upload::{SourceFile, ValidationError};
pub use services::orchestrator::JobOrchestrator;
