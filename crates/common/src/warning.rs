//! The warning channel.
//!
//! Warnings are non-fatal diagnostics. They are returned inside operation
//! reports and mirrored to `tracing` at `warn` level; they never travel
//! through the `Err` channel.

use serde::{Deserialize, Serialize};

/// Machine-stable warning codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    SidecarMissing,
    TagReattachFailed,
    CatalogueEntryMissing,
    ShaderUnresolved,
    UnknownCategory,
    DuplicateEntry,
    DanglingReference,
    VersionMismatchAccepted,
    OverrideFailed,
}

impl WarningCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SidecarMissing => "sidecar_missing",
            Self::TagReattachFailed => "tag_reattach_failed",
            Self::CatalogueEntryMissing => "catalogue_entry_missing",
            Self::ShaderUnresolved => "shader_unresolved",
            Self::UnknownCategory => "unknown_category",
            Self::DuplicateEntry => "duplicate_entry",
            Self::DanglingReference => "dangling_reference",
            Self::VersionMismatchAccepted => "version_mismatch_accepted",
            Self::OverrideFailed => "override_failed",
        }
    }
}

/// A single non-fatal diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub code: WarningCode,

    /// What the warning is about (file path, node name, entry id).
    pub subject: String,

    /// Human-readable description.
    pub message: String,
}

impl Warning {
    pub fn new(code: WarningCode, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code.as_str(), self.subject, self.message)
    }
}

/// Collects warnings for one operation and mirrors each one to tracing.
#[derive(Debug, Default, Clone)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn push(&mut self, warning: Warning) {
        tracing::warn!(
            code = warning.code.as_str(),
            subject = %warning.subject,
            "{}",
            warning.message
        );
        self.items.push(warning);
    }

    /// Shorthand for `push(Warning::new(..))`.
    pub fn warn(&mut self, code: WarningCode, subject: impl Into<String>, message: impl Into<String>) {
        self.push(Warning::new(code, subject, message));
    }

    /// Move every warning of `other` into this collector without re-logging.
    pub fn absorb(&mut self, other: Warnings) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.items.iter()
    }

    /// Whether any recorded warning carries `code`.
    pub fn contains(&self, code: WarningCode) -> bool {
        self.items.iter().any(|w| w.code == code)
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.items
    }
}
