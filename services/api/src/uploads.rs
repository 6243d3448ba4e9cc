//! services/api/src/uploads.rs
//!
//! Temporary storage for uploaded files. Every request that writes a file
//! here is responsible for deleting it on both success and failure paths;
//! a periodic background sweep reclaims anything a crashed request left
//! behind.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which per-content-type subdirectory a file lands in.
#[derive(Debug, Clone, Copy)]
pub enum UploadKind {
    Image,
    Pdf,
}

impl UploadKind {
    fn subdir(&self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Pdf => "pdf",
        }
    }
}

/// Hands out unique paths under the upload root and cleans up after use.
#[derive(Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Writes `bytes` to a fresh file under the subdirectory for `kind`.
    /// The stored name keeps the original extension so media types can be
    /// recovered later.
    pub async fn save(
        &self,
        kind: UploadKind,
        original_name: &str,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        let dir = self.root.join(kind.subdir());
        tokio::fs::create_dir_all(&dir).await?;

        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let path = dir.join(format!("upload-{}.{}", Uuid::new_v4(), extension));
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "stored upload");
        Ok(path)
    }

    /// Best-effort delete: failures are logged and never propagated.
    pub async fn remove(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "deleted upload"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to delete upload"),
        }
    }

    /// Deletes every file under the upload root older than `max_age`.
    /// Returns how many files were reclaimed.
    pub async fn sweep_once(&self, max_age: Duration) -> usize {
        let mut reclaimed = 0;
        for kind in [UploadKind::Image, UploadKind::Pdf] {
            let dir = self.root.join(kind.subdir());
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue, // nothing uploaded of this kind yet
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let expired = entry
                    .metadata()
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .and_then(|t| t.elapsed().ok())
                    .map(|age| age >= max_age)
                    .unwrap_or(false);
                if expired {
                    self.remove(&entry.path()).await;
                    reclaimed += 1;
                }
            }
        }
        reclaimed
    }

    /// Spawns the safety-net sweeper: every `interval`, delete files older
    /// than `max_age`. This is the only background task in the service.
    pub fn spawn_sweeper(&self, interval: Duration, max_age: Duration) {
        let store = self.clone();
        tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                max_age_secs = max_age.as_secs(),
                "upload cleanup sweeper started"
            );
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // immediate first tick, skip it
            loop {
                ticker.tick().await;
                let reclaimed = store.sweep_once(max_age).await;
                if reclaimed > 0 {
                    info!(reclaimed, "upload sweeper reclaimed stale files");
                }
            }
        });
    }
}

impl std::fmt::Debug for UploadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadStore").field("root", &self.root).finish()
    }
}
