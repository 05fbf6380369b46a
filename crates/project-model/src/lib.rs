//! Shotkit Project Model
//!
//! Defines the core data contracts for Shotkit projects:
//! - **Catalogue entries:** assets, shots, and sequences normalized from
//!   loose tracker records into tagged variants
//! - **Tag records:** catalogue identity, type flags, hires linkage, and
//!   shader maps, plus their `tag_info` string form
//! - **Cache sidecars:** the metadata written next to every point-cache
//! - **Shot files:** the recursive-include JSON composition format, its
//!   loader, and its atomic saver
//!
//! Paths stored in documents are project-relative and forward-slash
//! normalized so files survive moves between platforms.

pub mod catalogue;
pub mod frames;
pub mod include;
pub mod paths;
pub mod shot;
pub mod sidecar;
pub mod tag;

pub use catalogue::*;
pub use frames::*;
pub use include::*;
pub use shot::*;
pub use sidecar::*;
pub use tag::*;
