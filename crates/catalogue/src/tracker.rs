//! The tracker collaborator.
//!
//! The tracker is the remote asset-management service. The core only
//! distinguishes "available" from "unavailable"; authentication and
//! transport are the implementation's concern.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shotkit_common::{ShotkitError, ShotkitResult};

/// Plain-record interface to the tracker.
#[async_trait::async_trait]
pub trait Tracker: Send + Sync {
    async fn all_assets(&self, project: &str) -> ShotkitResult<Vec<Value>>;

    async fn all_shots(&self, project: &str) -> ShotkitResult<Vec<Value>>;

    async fn all_sequences(&self, project: &str) -> ShotkitResult<Vec<Value>>;

    /// Ids of the assets used by a shot.
    async fn assets_in_shot(&self, shot_id: &str) -> ShotkitResult<Vec<String>>;

    /// Status string of a task, `None` when the task is unknown.
    async fn task_status(&self, task_id: &str) -> ShotkitResult<Option<String>>;
}

/// Everything a tracker can answer, as one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerDocument {
    pub assets: Vec<Value>,
    pub shots: Vec<Value>,
    pub sequences: Vec<Value>,
    pub shot_assets: BTreeMap<String, Vec<String>>,
    pub tasks: BTreeMap<String, String>,
}

/// Tracker backed by a JSON document on disk, re-read on every call.
#[derive(Debug, Clone)]
pub struct JsonTracker {
    path: PathBuf,
}

impl JsonTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn document(&self) -> ShotkitResult<TrackerDocument> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ShotkitError::catalogue_unavailable(format!(
                "cannot read tracker document {}: {e}",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ShotkitError::catalogue_unavailable(format!(
                "tracker document {} is invalid: {e}",
                self.path.display()
            ))
        })
    }
}

#[async_trait::async_trait]
impl Tracker for JsonTracker {
    async fn all_assets(&self, _project: &str) -> ShotkitResult<Vec<Value>> {
        Ok(self.document().await?.assets)
    }

    async fn all_shots(&self, _project: &str) -> ShotkitResult<Vec<Value>> {
        Ok(self.document().await?.shots)
    }

    async fn all_sequences(&self, _project: &str) -> ShotkitResult<Vec<Value>> {
        Ok(self.document().await?.sequences)
    }

    async fn assets_in_shot(&self, shot_id: &str) -> ShotkitResult<Vec<String>> {
        Ok(self
            .document()
            .await?
            .shot_assets
            .remove(shot_id)
            .unwrap_or_default())
    }

    async fn task_status(&self, task_id: &str) -> ShotkitResult<Option<String>> {
        Ok(self.document().await?.tasks.remove(task_id))
    }
}

/// In-process tracker whose document can be swapped and whose
/// availability can be toggled.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    document: RwLock<TrackerDocument>,
    offline: AtomicBool,
}

impl MemoryTracker {
    pub fn new(document: TrackerDocument) -> Self {
        Self {
            document: RwLock::new(document),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_document(&self, document: TrackerDocument) {
        *self.document.write() = document;
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    fn read(&self) -> ShotkitResult<parking_lot::RwLockReadGuard<'_, TrackerDocument>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ShotkitError::catalogue_unavailable("tracker is offline"));
        }
        Ok(self.document.read())
    }
}

#[async_trait::async_trait]
impl Tracker for MemoryTracker {
    async fn all_assets(&self, _project: &str) -> ShotkitResult<Vec<Value>> {
        Ok(self.read()?.assets.clone())
    }

    async fn all_shots(&self, _project: &str) -> ShotkitResult<Vec<Value>> {
        Ok(self.read()?.shots.clone())
    }

    async fn all_sequences(&self, _project: &str) -> ShotkitResult<Vec<Value>> {
        Ok(self.read()?.sequences.clone())
    }

    async fn assets_in_shot(&self, shot_id: &str) -> ShotkitResult<Vec<String>> {
        Ok(self
            .read()?
            .shot_assets
            .get(shot_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn task_status(&self, task_id: &str) -> ShotkitResult<Option<String>> {
        Ok(self.read()?.tasks.get(task_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn json_tracker_reads_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(
            &path,
            json!({
                "assets": [{"id": "a1", "name": "hero"}],
                "shot_assets": {"s1": ["a1"]},
                "tasks": {"t1": "approved"}
            })
            .to_string(),
        )
        .unwrap();

        let tracker = JsonTracker::new(&path);
        assert_eq!(tracker.all_assets("demo").await.unwrap().len(), 1);
        assert!(tracker.all_shots("demo").await.unwrap().is_empty());
        assert_eq!(tracker.assets_in_shot("s1").await.unwrap(), vec!["a1"]);
        assert_eq!(
            tracker.task_status("t1").await.unwrap().as_deref(),
            Some("approved")
        );
        assert_eq!(tracker.task_status("t9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreadable_documents_are_unavailable() {
        let tracker = JsonTracker::new("/definitely/not/here.json");
        let err = tracker.all_assets("demo").await.unwrap_err();
        assert_eq!(err.code().as_str(), "catalogue_unavailable");
    }

    #[tokio::test]
    async fn memory_tracker_can_go_offline() {
        let tracker = MemoryTracker::default();
        assert!(tracker.all_assets("demo").await.is_ok());
        tracker.set_available(false);
        assert!(tracker.all_assets("demo").await.is_err());
    }
}
