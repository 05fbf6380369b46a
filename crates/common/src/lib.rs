//! Shotkit Common Utilities
//!
//! Shared infrastructure for all Shotkit crates:
//! - Error kinds with machine-stable codes
//! - The warning channel (non-fatal diagnostics carried in reports)
//! - Cooperative cancellation tokens
//! - Project configuration loading
//! - Tracing/logging initialization

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod warning;

pub use cancel::*;
pub use config::*;
pub use error::*;
pub use warning::*;
