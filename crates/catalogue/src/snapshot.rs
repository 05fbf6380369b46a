//! Immutable catalogue snapshots.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use shotkit_common::{ProjectConfig, WarningCode, Warnings};
use shotkit_project_model::{CatalogueEntry, EntryKind, EntryPayload};

/// A fully built, internally consistent set of entries.
///
/// Every shot's sequence resolves and every sequence's shot list resolves.
#[derive(Debug, Default)]
pub struct Snapshot {
    by_id: HashMap<String, Arc<CatalogueEntry>>,
    by_name: HashMap<(EntryKind, String), Arc<CatalogueEntry>>,
    by_kind: HashMap<EntryKind, Vec<Arc<CatalogueEntry>>>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Normalize tracker records into a snapshot.
    ///
    /// Records are taken in the order assets, sequences, shots. A record
    /// that cannot be normalized is skipped, a repeated id keeps the first
    /// record, shots whose sequence does not resolve are dropped, and
    /// sequence shot lists are filtered to resolving shots with unlisted
    /// member shots appended in name order.
    pub fn build(
        assets: &[Value],
        shots: &[Value],
        sequences: &[Value],
        config: &ProjectConfig,
    ) -> (Self, Warnings) {
        let mut warnings = Warnings::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut entries: Vec<CatalogueEntry> = Vec::new();

        let batches = [
            (EntryKind::Asset, assets),
            (EntryKind::Sequence, sequences),
            (EntryKind::Shot, shots),
        ];
        for (kind, records) in batches {
            for record in records {
                let entry = match CatalogueEntry::from_record(kind, record, config) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warnings.warn(
                            WarningCode::DanglingReference,
                            kind.as_str(),
                            format!("skipping {kind} record: {e}"),
                        );
                        continue;
                    }
                };
                if !seen.insert(entry.id.clone()) {
                    warnings.warn(
                        WarningCode::DuplicateEntry,
                        entry.id.clone(),
                        format!("duplicate id, keeping the first record (dropped '{}')", entry.name),
                    );
                    continue;
                }
                if !entry.category.known {
                    warnings.warn(
                        WarningCode::UnknownCategory,
                        entry.id.clone(),
                        format!("category '{}' is not declared for {kind}", entry.category.name),
                    );
                }
                entries.push(entry);
            }
        }

        let sequence_ids: HashSet<String> = entries
            .iter()
            .filter(|e| e.kind() == EntryKind::Sequence)
            .map(|e| e.id.clone())
            .collect();

        entries.retain(|entry| match entry.sequence_id() {
            Some(seq) if !sequence_ids.contains(seq) => {
                warnings.warn(
                    WarningCode::DanglingReference,
                    entry.id.clone(),
                    format!("shot '{}' names unknown sequence '{seq}', dropped", entry.name),
                );
                false
            }
            _ => true,
        });

        let shot_names: HashMap<String, (String, String)> = entries
            .iter()
            .filter_map(|e| {
                e.sequence_id()
                    .map(|seq| (e.id.clone(), (seq.to_string(), e.name.clone())))
            })
            .collect();

        for entry in entries.iter_mut() {
            let seq_id = entry.id.clone();
            let EntryPayload::Sequence { shot_ids } = &mut entry.payload else {
                continue;
            };
            let before = shot_ids.len();
            shot_ids.retain(|id| shot_names.contains_key(id));
            if shot_ids.len() != before {
                warnings.warn(
                    WarningCode::DanglingReference,
                    seq_id.clone(),
                    format!("{} unknown shot id(s) removed from sequence", before - shot_ids.len()),
                );
            }
            let mut dedup: HashSet<String> = HashSet::new();
            shot_ids.retain(|id| dedup.insert(id.clone()));

            let mut unlisted: Vec<(&String, &String)> = shot_names
                .iter()
                .filter(|(id, (seq, _))| *seq == seq_id && !dedup.contains(*id))
                .map(|(id, (_, name))| (name, id))
                .collect();
            unlisted.sort();
            shot_ids.extend(unlisted.into_iter().map(|(_, id)| id.clone()));
        }

        let mut snapshot = Self::default();
        for entry in entries {
            let entry = Arc::new(entry);
            snapshot
                .by_name
                .entry((entry.kind(), entry.name.clone()))
                .or_insert_with(|| entry.clone());
            snapshot
                .by_kind
                .entry(entry.kind())
                .or_default()
                .push(entry.clone());
            snapshot.by_id.insert(entry.id.clone(), entry);
        }
        (snapshot, warnings)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn count(&self, kind: EntryKind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }

    pub fn find_entry(&self, id: &str) -> Option<Arc<CatalogueEntry>> {
        self.by_id.get(id).cloned()
    }

    pub fn find_by_name(&self, name: &str, kind: EntryKind) -> Option<Arc<CatalogueEntry>> {
        self.by_name.get(&(kind, name.to_string())).cloned()
    }

    /// First entry named `name`, trying assets, then shots, then sequences.
    pub fn find_by_name_any(&self, name: &str) -> Option<Arc<CatalogueEntry>> {
        [EntryKind::Asset, EntryKind::Shot, EntryKind::Sequence]
            .into_iter()
            .find_map(|kind| self.find_by_name(name, kind))
    }

    /// Entries of one kind, in tracker order.
    pub fn entries_of_kind(&self, kind: EntryKind) -> Vec<Arc<CatalogueEntry>> {
        self.by_kind.get(&kind).cloned().unwrap_or_default()
    }

    /// Shots of a sequence, in sequence order. Empty for unknown ids.
    pub fn entries_in_sequence(&self, sequence_id: &str) -> Vec<Arc<CatalogueEntry>> {
        self.by_id
            .get(sequence_id)
            .map(|seq| {
                seq.shot_ids()
                    .iter()
                    .filter_map(|id| self.by_id.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn build(assets: Value, shots: Value, sequences: Value) -> (Snapshot, Warnings) {
        let as_vec = |v: Value| v.as_array().cloned().unwrap_or_default();
        Snapshot::build(
            &as_vec(assets),
            &as_vec(shots),
            &as_vec(sequences),
            &ProjectConfig::default(),
        )
    }

    #[test]
    fn lookups_cover_every_kind() {
        let (snapshot, warnings) = build(
            json!([{"id": "a1", "name": "hero", "category": "character"}]),
            json!([{"id": "s1", "name": "sh010", "sequence": "q1"}]),
            json!([{"id": "q1", "name": "seq01", "shots": ["s1"]}]),
        );
        assert!(warnings.is_empty());
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.find_entry("a1").unwrap().name, "hero");
        assert_eq!(
            snapshot.find_by_name("sh010", EntryKind::Shot).unwrap().id,
            "s1"
        );
        assert!(snapshot.find_by_name("sh010", EntryKind::Asset).is_none());
        assert_eq!(snapshot.find_by_name_any("seq01").unwrap().id, "q1");
        assert!(snapshot.find_entry("zz").is_none());
        assert_eq!(snapshot.entries_in_sequence("q1")[0].id, "s1");
        assert!(snapshot.entries_in_sequence("nope").is_empty());
    }

    #[test]
    fn first_duplicate_wins() {
        let (snapshot, warnings) = build(
            json!([
                {"id": "a1", "name": "hero", "category": "character"},
                {"id": "a1", "name": "impostor", "category": "character"}
            ]),
            json!([]),
            json!([]),
        );
        assert_eq!(snapshot.find_entry("a1").unwrap().name, "hero");
        assert!(warnings.contains(WarningCode::DuplicateEntry));
    }

    #[test]
    fn dangling_shots_are_dropped_and_sequences_filled() {
        let (snapshot, warnings) = build(
            json!([]),
            json!([
                {"id": "s3", "name": "sh030", "sequence": "q1"},
                {"id": "s2", "name": "sh020", "sequence": "q1"},
                {"id": "s1", "name": "sh010", "sequence": "q1"},
                {"id": "s9", "name": "sh090", "sequence": "gone"}
            ]),
            json!([{"id": "q1", "name": "seq01", "shots": ["s2", "s9", "x"]}]),
        );

        assert!(snapshot.find_entry("s9").is_none());
        let order: Vec<String> = snapshot
            .entries_in_sequence("q1")
            .iter()
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(order, vec!["s2", "s1", "s3"]);
        assert!(warnings.contains(WarningCode::DanglingReference));
    }

    #[test]
    fn unknown_categories_are_accepted_with_a_warning() {
        let (snapshot, warnings) = build(
            json!([{"id": "a1", "name": "boat", "category": "vehicle"}, {"name": "no id"}]),
            json!([]),
            json!([]),
        );
        assert!(!snapshot.find_entry("a1").unwrap().category.known);
        assert!(warnings.contains(WarningCode::UnknownCategory));
        assert_eq!(snapshot.len(), 1);
    }

    proptest! {
        #[test]
        fn snapshots_are_referentially_closed(
            seqs in proptest::collection::vec(0u8..4, 0..4),
            shots in proptest::collection::vec((0u8..8, 0u8..6), 0..10),
            listed in proptest::collection::vec((0u8..4, 0u8..10), 0..8),
        ) {
            let sequences: Vec<Value> = seqs.iter().map(|q| {
                let members: Vec<String> = listed
                    .iter()
                    .filter(|(owner, _)| owner == q)
                    .map(|(_, s)| format!("s{s}"))
                    .collect();
                json!({"id": format!("q{q}"), "name": format!("seq{q}"), "shots": members})
            }).collect();
            let shot_records: Vec<Value> = shots.iter().map(|(s, q)| {
                json!({"id": format!("s{s}"), "name": format!("sh{s}"), "sequence": format!("q{q}")})
            }).collect();

            let (snapshot, _) = Snapshot::build(&[], &shot_records, &sequences, &ProjectConfig::default());

            for shot in snapshot.entries_of_kind(EntryKind::Shot) {
                let seq = shot.sequence_id().unwrap();
                prop_assert!(snapshot.find_entry(seq).is_some());
            }
            for seq in snapshot.entries_of_kind(EntryKind::Sequence) {
                for id in seq.shot_ids() {
                    prop_assert!(snapshot.find_entry(id).is_some());
                }
            }
        }
    }
}
