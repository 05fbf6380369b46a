//! Shotkit host scene contracts.
//!
//! This crate defines the narrow host-scene surface the core relies on
//! (nodes, scalar/string attributes with locks, message connections,
//! namespaces, selection) without coupling to a concrete host. The
//! [`MemoryScene`] implementation backs headless tools and tests.

pub mod lock;
pub mod memory;
pub mod query;
pub mod scene;
pub mod value;

pub use lock::LockScope;
pub use memory::MemoryScene;
pub use query::*;
pub use scene::*;
pub use value::AttrValue;
