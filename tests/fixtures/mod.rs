//! Test fixtures for orchestrator scenarios

#![allow(dead_code)]

use resume_tracker::models::status::RawStatus;
use resume_tracker::SourceFile;

pub const MIB: usize = 1024 * 1024;

pub const ARTIFACT_URL: &str = "https://files.example.com/api/download/job-1";

/// Stages reported by a healthy pipeline run, with the progress for each.
pub const HAPPY_PATH: &[(&str, i64)] = &[
    ("uploading", 10),
    ("parsing", 30),
    ("enhancing", 55),
    ("generating", 80),
    ("compiling", 95),
];

/// The full happy-path status sequence ending in `done`.
pub fn happy_path_statuses(artifact_url: &str) -> Vec<RawStatus> {
    let mut statuses: Vec<RawStatus> = HAPPY_PATH
        .iter()
        .map(|(stage, progress)| RawStatus::new(*stage, *progress))
        .collect();
    statuses.push(RawStatus::new("done", 100).with_artifact(artifact_url));
    statuses
}

pub fn pdf_of_size(size: usize) -> SourceFile {
    SourceFile::new(
        "resume.pdf",
        Some("application/pdf".to_string()),
        vec![b'%'; size],
    )
}

pub fn small_pdf() -> SourceFile {
    pdf_of_size(2 * MIB)
}
