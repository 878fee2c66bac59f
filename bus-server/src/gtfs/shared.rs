//! The published snapshot handle.
//!
//! Readers take a cheap `Arc<Snapshot>` clone and keep it for the duration
//! of one request; a reload builds the new snapshot entirely off to the
//! side and publishes it with a single reference swap. Readers therefore
//! always see a complete snapshot, old or new, never a partial one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::error::DataError;
use super::snapshot::Snapshot;

/// Thread-safe handle to the current GTFS snapshot.
#[derive(Clone)]
pub struct SharedSnapshot {
    inner: Arc<RwLock<Arc<Snapshot>>>,
    dir: PathBuf,
}

impl SharedSnapshot {
    /// Load the initial snapshot from `dir`.
    pub fn load(dir: &Path) -> Result<Self, DataError> {
        let snapshot = Snapshot::load(dir)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
            dir: dir.to_path_buf(),
        })
    }

    /// The dataset directory this handle reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The current snapshot.
    pub async fn current(&self) -> Arc<Snapshot> {
        let guard = self.inner.read().await;
        Arc::clone(&guard)
    }

    /// Re-read the dataset directory and publish the result.
    ///
    /// On failure the previous snapshot stays published and the error is
    /// returned. Parsing happens on a blocking worker so the executor is
    /// not stalled by file IO.
    pub async fn reload(&self) -> Result<Arc<Snapshot>, DataError> {
        let dir = self.dir.clone();
        let snapshot = tokio::task::spawn_blocking(move || Snapshot::load(&dir))
            .await
            .map_err(|e| DataError::Io {
                file: "<reload task>".to_string(),
                source: std::io::Error::other(e),
            })??;

        let snapshot = Arc::new(snapshot);
        let mut guard = self.inner.write().await;
        *guard = Arc::clone(&snapshot);
        Ok(snapshot)
    }
}
