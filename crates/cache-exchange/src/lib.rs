//! Shotkit Cache Exchange
//!
//! Export and import of interchange caches. Handlers are registered per
//! `(extension, kind)` in a [`FileTypeRegistry`]; each wraps a host plugin
//! that performs the actual file I/O.
//!
//! - **Point caches** are written with a sidecar carrying the tag
//!   dictionary of the exported roots, replayed on import.
//! - **Render proxies** are addressed by name and need no sidecar.
//!
//! The `reference` module provides JSON-backed host plugins for headless
//! use.

pub mod export;
pub mod handler;
pub mod plugin;
pub mod point_cache;
pub mod reference;
pub mod registry;
pub mod render_proxy;

pub use export::ExportStage;
pub use handler::{
    ExchangeContext, ExportJob, ExportReport, FileKind, FileTypeHandler, ImportJob, ImportReport,
};
pub use plugin::{CacheFlags, CachePlugin, FrameWriter, ProxyFlags, ProxyPlugin};
pub use point_cache::PointCacheHandler;
pub use reference::{JsonCachePlugin, JsonProxyPlugin};
pub use registry::FileTypeRegistry;
pub use render_proxy::RenderProxyHandler;
