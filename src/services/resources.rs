use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// A client-held resource derived from a job result.
pub trait LocalResource: Send + std::fmt::Debug {
    /// Give the resource back. Called exactly once by the manager.
    fn release(self: Box<Self>);
}

/// Tracks at most one local resource and guarantees it is released.
///
/// Every `adopt` is paired with exactly one release: either the next `adopt`,
/// an explicit `release_all`, or the final release in `Drop`. Moving a manager
/// out with `std::mem::take` defers the release to wherever it is dropped.
#[derive(Debug, Default)]
pub struct ResourceLifecycleManager {
    tracked: Option<Box<dyn LocalResource>>,
}

impl ResourceLifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `resource`, releasing whatever was tracked before.
    pub fn adopt(&mut self, resource: Box<dyn LocalResource>) {
        self.release_all();
        debug!(resource = ?resource, "Adopting local resource");
        self.tracked = Some(resource);
    }

    /// Release the tracked resource, if any.
    pub fn release_all(&mut self) {
        if let Some(resource) = self.tracked.take() {
            debug!(resource = ?resource, "Releasing local resource");
            resource.release();
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracked.is_some()
    }
}

impl Drop for ResourceLifecycleManager {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// A preview copy of a finished artifact written to local disk.
#[derive(Debug)]
pub struct PreviewFile {
    path: PathBuf,
}

impl PreviewFile {
    /// Write `bytes` to a uniquely named file under `dir`.
    pub async fn create(dir: &Path, job_id: &str, bytes: &[u8]) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}-{}.pdf", sanitize(job_id), Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalResource for PreviewFile {
    fn release(self: Box<Self>) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to delete preview file"),
        }
    }
}

fn sanitize(job_id: &str) -> String {
    job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
