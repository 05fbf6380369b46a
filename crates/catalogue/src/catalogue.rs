//! The shared catalogue handle.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use shotkit_common::{ProjectConfig, ShotkitError, ShotkitResult, Warning, Warnings};
use shotkit_project_model::{CatalogueEntry, EntryKind};

use crate::snapshot::Snapshot;
use crate::tracker::Tracker;

/// Counts and warnings of one successful refresh.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub assets: usize,
    pub shots: usize,
    pub sequences: usize,
    pub warnings: Vec<Warning>,
}

/// Project catalogue.
///
/// Readers take an `Arc<Snapshot>` and keep it for as long as they need;
/// a refresh never mutates an installed snapshot.
pub struct Catalogue {
    config: ProjectConfig,
    tracker: Arc<dyn Tracker>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Catalogue {
    /// Create an empty catalogue. Nothing is fetched until [`Catalogue::refresh`].
    pub fn new(config: ProjectConfig, tracker: Arc<dyn Tracker>) -> Self {
        Self {
            config,
            tracker,
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
        }
    }

    pub fn project(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// The currently installed snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    pub fn find_entry(&self, id: &str) -> Option<Arc<CatalogueEntry>> {
        self.snapshot().find_entry(id)
    }

    pub fn find_by_name(&self, name: &str, kind: EntryKind) -> Option<Arc<CatalogueEntry>> {
        self.snapshot().find_by_name(name, kind)
    }

    pub fn find_by_name_any(&self, name: &str) -> Option<Arc<CatalogueEntry>> {
        self.snapshot().find_by_name_any(name)
    }

    pub fn entries_of_kind(&self, kind: EntryKind) -> Vec<Arc<CatalogueEntry>> {
        self.snapshot().entries_of_kind(kind)
    }

    pub fn entries_in_sequence(&self, sequence_id: &str) -> Vec<Arc<CatalogueEntry>> {
        self.snapshot().entries_in_sequence(sequence_id)
    }

    /// Re-read the tracker and install a new snapshot.
    ///
    /// On failure the previous snapshot stays installed.
    pub async fn refresh(&self) -> ShotkitResult<RefreshReport> {
        let project = self.config.name.as_str();
        tracing::info!(project = %project, "Refreshing catalogue");

        let (assets, shots, sequences) = tokio::try_join!(
            self.tracker.all_assets(project),
            self.tracker.all_shots(project),
            self.tracker.all_sequences(project),
        )
        .map_err(unavailable)?;

        let (snapshot, warnings) = Snapshot::build(&assets, &shots, &sequences, &self.config);
        let report = RefreshReport {
            assets: snapshot.count(EntryKind::Asset),
            shots: snapshot.count(EntryKind::Shot),
            sequences: snapshot.count(EntryKind::Sequence),
            warnings: warnings.into_vec(),
        };

        *self.snapshot.write() = Arc::new(snapshot);

        tracing::info!(
            project = %project,
            assets = report.assets,
            shots = report.shots,
            sequences = report.sequences,
            warnings = report.warnings.len(),
            "Catalogue refreshed"
        );
        Ok(report)
    }

    /// Assets used by a shot, resolved against the current snapshot.
    ///
    /// Ids the snapshot does not know are skipped with a warning.
    pub async fn assets_in_shot(
        &self,
        shot_id: &str,
    ) -> ShotkitResult<(Vec<Arc<CatalogueEntry>>, Warnings)> {
        let ids = self
            .tracker
            .assets_in_shot(shot_id)
            .await
            .map_err(unavailable)?;

        let snapshot = self.snapshot();
        let mut warnings = Warnings::new();
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            match snapshot.find_entry(&id) {
                Some(entry) => entries.push(entry),
                None => warnings.warn(
                    shotkit_common::WarningCode::CatalogueEntryMissing,
                    id,
                    format!("asset listed for shot '{shot_id}' is not in the catalogue"),
                ),
            }
        }
        Ok((entries, warnings))
    }

    pub async fn task_status(&self, task_id: &str) -> ShotkitResult<Option<String>> {
        self.tracker.task_status(task_id).await.map_err(unavailable)
    }
}

impl std::fmt::Debug for Catalogue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalogue")
            .field("project", &self.config.name)
            .field("entries", &self.snapshot.read().len())
            .finish()
    }
}

fn unavailable(err: ShotkitError) -> ShotkitError {
    match err {
        e @ ShotkitError::CatalogueUnavailable { .. } => e,
        other => ShotkitError::catalogue_unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{MemoryTracker, TrackerDocument};
    use serde_json::json;

    fn document() -> TrackerDocument {
        TrackerDocument {
            assets: vec![json!({"id": "a1", "name": "char_A", "category": "character"})],
            shots: vec![json!({"id": "s1", "name": "sh010", "sequence": "q1"})],
            sequences: vec![json!({"id": "q1", "name": "seq01", "shots": ["s1"]})],
            shot_assets: [("s1".to_string(), vec!["a1".to_string(), "ghost".to_string()])]
                .into_iter()
                .collect(),
            tasks: [("t1".to_string(), "wip".to_string())].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn refresh_installs_a_new_snapshot() {
        let tracker = Arc::new(MemoryTracker::new(document()));
        let catalogue = Catalogue::new(ProjectConfig::default(), tracker);
        assert!(catalogue.find_entry("a1").is_none());

        let report = catalogue.refresh().await.unwrap();
        assert_eq!((report.assets, report.shots, report.sequences), (1, 1, 1));
        assert_eq!(catalogue.find_by_name("char_A", EntryKind::Asset).unwrap().id, "a1");
        assert_eq!(catalogue.entries_in_sequence("q1").len(), 1);
    }

    #[tokio::test]
    async fn assets_in_shot_skips_unknown_ids() {
        let tracker = Arc::new(MemoryTracker::new(document()));
        let catalogue = Catalogue::new(ProjectConfig::default(), tracker);
        catalogue.refresh().await.unwrap();

        let (entries, warnings) = catalogue.assets_in_shot("s1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            catalogue.task_status("t1").await.unwrap().as_deref(),
            Some("wip")
        );
    }
}
