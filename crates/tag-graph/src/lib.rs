//! Shotkit Tag Graph
//!
//! Annotates host-scene transforms with production identity. A tag lives
//! either on a linked TagNode (a data node carrying the project's
//! `tag_type` discriminator) or embedded in a transform's `tag_info`
//! attribute, the form imported caches carry.
//!
//! Every schema attribute is written through a [`LockScope`], so tags are
//! locked again on every exit path.
//!
//! [`LockScope`]: shotkit_scene_core::LockScope

pub mod graph;
pub mod schema;

pub use graph::{TagFilter, TagForm, TagGraph, TagNode};
