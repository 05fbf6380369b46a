//! Shot overrides.
//!
//! A shot file may carry an `overrides` map from override name to a data
//! record. Each registered override runs either before the imports
//! (`pre`) or after them and before shader wiring (`post`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use shotkit_common::{ShotkitError, ShotkitResult};
use shotkit_scene_core::{AttrValue, Scene};

/// When an override runs during a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideStep {
    Pre,
    Post,
}

impl std::fmt::Display for OverrideStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pre => f.write_str("pre"),
            Self::Post => f.write_str("post"),
        }
    }
}

/// A named shot override.
pub trait ShotOverride: Send + Sync {
    fn name(&self) -> &str;

    fn step(&self) -> OverrideStep;

    /// Apply the override's `data` record to the scene.
    fn apply(&self, scene: &mut dyn Scene, data: &Value) -> ShotkitResult<()>;
}

/// Overrides keyed by name.
#[derive(Default)]
pub struct OverrideRegistry {
    overrides: BTreeMap<String, Box<dyn ShotOverride>>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in overrides.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_override(Box::new(AttributesOverride));
        registry
    }

    pub fn register_override(&mut self, item: Box<dyn ShotOverride>) {
        let name = item.name().to_string();
        tracing::debug!(name = %name, step = %item.step(), "Registered override");
        if self.overrides.insert(name.clone(), item).is_some() {
            tracing::warn!(name = %name, "Replaced previously registered override");
        }
    }

    pub fn get(&self, name: &str) -> ShotkitResult<&dyn ShotOverride> {
        self.overrides
            .get(name)
            .map(|o| &**o)
            .ok_or_else(|| ShotkitError::UnregisteredOverride {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.overrides.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

impl std::fmt::Debug for OverrideRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.overrides.keys()).finish()
    }
}

/// Sets attributes on named nodes after the imports:
/// `{"<node name>": {"<attr>": <scalar>}}`.
///
/// Node names are full names; a name without a namespace also matches the
/// first node whose namespace-stripped name equals it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributesOverride;

impl ShotOverride for AttributesOverride {
    fn name(&self) -> &str {
        "attributes"
    }

    fn step(&self) -> OverrideStep {
        OverrideStep::Post
    }

    fn apply(&self, scene: &mut dyn Scene, data: &Value) -> ShotkitResult<()> {
        let Value::Object(nodes) = data else {
            return Err(ShotkitError::shot_file_invalid(
                "attributes override must be an object of node names",
            ));
        };
        for (name, attrs) in nodes {
            let node = find_node(&*scene, name)
                .ok_or_else(|| ShotkitError::node_missing(name.clone()))?;
            let Value::Object(attrs) = attrs else {
                return Err(ShotkitError::shot_file_invalid(format!(
                    "attributes of '{name}' must be an object"
                )));
            };
            for (attr, raw) in attrs {
                let value = AttrValue::from_json(raw).ok_or_else(|| {
                    ShotkitError::shot_file_invalid(format!(
                        "{name}.{attr}: only scalar and string values can be set"
                    ))
                })?;
                scene.set_attr(node, attr, value)?;
                tracing::debug!(node = %name, attr = %attr, "Override set attribute");
            }
        }
        Ok(())
    }
}

fn find_node(scene: &dyn Scene, name: &str) -> Option<shotkit_scene_core::NodeId> {
    if let Some(node) = scene.find_by_name(name) {
        return Some(node);
    }
    if name.contains(':') {
        return None;
    }
    let mut pending = scene.roots();
    while let Some(node) = pending.pop() {
        if let Ok(full) = scene.name(node) {
            if shotkit_scene_core::strip_namespace(&full) == name {
                return Some(node);
            }
        }
        if let Ok(mut children) = scene.children(node) {
            children.reverse();
            pending.extend(children);
        }
    }
    None
}
