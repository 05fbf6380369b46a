//! Shotkit Catalogue
//!
//! In-memory index of a project's assets, shots, and sequences:
//! - **Tracker:** the async collaborator that delivers loose records
//! - **Snapshot:** normalized, cross-checked entries with O(1) lookups
//! - **Catalogue:** the shared handle; `refresh()` builds a new snapshot
//!   off-lock and installs it with a single swap

pub mod catalogue;
pub mod snapshot;
pub mod tracker;

pub use catalogue::{Catalogue, RefreshReport};
pub use snapshot::Snapshot;
pub use tracker::{JsonTracker, MemoryTracker, Tracker, TrackerDocument};
