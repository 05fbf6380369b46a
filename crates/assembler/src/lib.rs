//! Shotkit Assembler
//!
//! Orchestrates shot assembly on top of the other crates:
//! - **Project:** the explicit context holding configuration, catalogue,
//!   tag graph, file-type registry, overrides and shader library
//! - **Assembler:** shot-file load (parse, import, overrides, shader
//!   wiring) and save
//! - **Overrides:** named pre/post steps declared by a shot file
//! - **Shaders:** shading-group materialization and assignment

pub mod assembler;
pub mod overrides;
pub mod project;
pub mod shaders;

pub use assembler::{Assembler, LoadFailure, LoadStage, LoadedItem, PartialLoad};
pub use overrides::{AttributesOverride, OverrideRegistry, OverrideStep, ShotOverride};
pub use project::Project;
pub use shaders::{Assignment, DirectoryShaderLibrary, ShaderLibrary, ShaderWiring, WiringReport};
