use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use shotkit_catalogue::{Catalogue, MemoryTracker, TrackerDocument};
use shotkit_common::ProjectConfig;
use shotkit_project_model::EntryKind;

fn generation(n: usize) -> TrackerDocument {
    let sequences: Vec<Value> = (0..3)
        .map(|q| {
            json!({
                "id": format!("g{n}-q{q}"),
                "name": format!("seq{q}"),
                "shots": (0..4).map(|s| format!("g{n}-s{q}{s}")).collect::<Vec<_>>()
            })
        })
        .collect();
    let shots: Vec<Value> = (0..3)
        .flat_map(|q| {
            (0..4).map(move |s| {
                json!({
                    "id": format!("g{n}-s{q}{s}"),
                    "name": format!("sh{q}{s}0"),
                    "sequence": format!("g{n}-q{q}")
                })
            })
        })
        .collect();
    TrackerDocument {
        sequences,
        shots,
        ..TrackerDocument::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_a_half_built_snapshot() {
    let tracker = Arc::new(MemoryTracker::new(generation(0)));
    let catalogue = Arc::new(Catalogue::new(ProjectConfig::default(), tracker.clone()));
    catalogue.refresh().await.unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..3 {
        let catalogue = catalogue.clone();
        let stop = stop.clone();
        readers.push(tokio::task::spawn_blocking(move || {
            let mut checks = 0usize;
            while !stop.load(Ordering::SeqCst) {
                let snapshot = catalogue.snapshot();
                for shot in snapshot.entries_of_kind(EntryKind::Shot) {
                    let seq = shot.sequence_id().unwrap();
                    assert!(snapshot.find_entry(seq).is_some());
                    checks += 1;
                }
            }
            checks
        }));
    }

    for n in 1..20 {
        tracker.set_document(generation(n));
        catalogue.refresh().await.unwrap();
    }
    stop.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.await.unwrap();
    }
    assert!(catalogue.find_entry("g19-q0").is_some());
    assert!(catalogue.find_entry("g0-q0").is_none());
}

#[tokio::test]
async fn failed_refresh_keeps_the_previous_snapshot() {
    let tracker = Arc::new(MemoryTracker::new(generation(0)));
    let catalogue = Catalogue::new(ProjectConfig::default(), tracker.clone());
    catalogue.refresh().await.unwrap();

    tracker.set_available(false);
    tracker.set_document(generation(1));
    let err = catalogue.refresh().await.unwrap_err();
    assert_eq!(err.code().as_str(), "catalogue_unavailable");

    assert!(catalogue.find_entry("g0-s00").is_some());
    assert_eq!(catalogue.entries_of_kind(EntryKind::Sequence).len(), 3);
}
