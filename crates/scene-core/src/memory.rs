//! In-memory scene.
//!
//! Nodes live in an ordered map keyed by [`NodeId`]; message connections are
//! kept as adjacency maps keyed by plug (`node`, `attribute`). Scenes can be
//! written to and read from JSON so headless tools can chain invocations.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use shotkit_common::{ShotkitError, ShotkitResult};

use crate::scene::{Connection, NodeId, NodeKind, Scene};
use crate::value::AttrValue;

type Plug = (NodeId, String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Attribute {
    value: AttrValue,
    #[serde(default)]
    locked: bool,
}

#[derive(Debug, Clone)]
struct NodeRecord {
    name: String,
    namespace: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attrs: BTreeMap<String, Attribute>,
    referenced: bool,
}

impl NodeRecord {
    fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.namespace, self.name)
        }
    }
}

/// A scene held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    next_id: u64,
    nodes: BTreeMap<NodeId, NodeRecord>,
    /// Destination plug to its single source plug.
    inputs: BTreeMap<Plug, Plug>,
    /// Source node to `(src_attr, dst, dst_attr)` triples it feeds.
    outputs: BTreeMap<NodeId, BTreeSet<(String, NodeId, String)>>,
    selection: Vec<NodeId>,
}

fn split_name(name: &str) -> (String, String) {
    match name.rsplit_once(':') {
        Some((ns, base)) => (ns.trim_start_matches(':').to_string(), base.to_string()),
        None => (String::new(), name.to_string()),
    }
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every node, in creation order.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Mark a node as coming from a file reference.
    pub fn set_referenced(&mut self, node: NodeId, referenced: bool) -> ShotkitResult<()> {
        self.record_mut(node)?.referenced = referenced;
        Ok(())
    }

    fn record(&self, node: NodeId) -> ShotkitResult<&NodeRecord> {
        self.nodes
            .get(&node)
            .ok_or_else(|| ShotkitError::node_missing(node.to_string()))
    }

    fn record_mut(&mut self, node: NodeId) -> ShotkitResult<&mut NodeRecord> {
        self.nodes
            .get_mut(&node)
            .ok_or_else(|| ShotkitError::node_missing(node.to_string()))
    }

    fn locked_error(&self, node: NodeId, attr: &str) -> ShotkitError {
        let node = self
            .nodes
            .get(&node)
            .map(NodeRecord::full_name)
            .unwrap_or_else(|| node.to_string());
        ShotkitError::AttributeLocked {
            node,
            attribute: attr.to_string(),
        }
    }

    fn ensure_unlocked(&self, node: NodeId, attr: &str) -> ShotkitResult<()> {
        if self.is_locked(node, attr)? {
            return Err(self.locked_error(node, attr));
        }
        Ok(())
    }

    fn ensure_message_plug(&mut self, node: NodeId, attr: &str) -> ShotkitResult<()> {
        self.record_mut(node)?
            .attrs
            .entry(attr.to_string())
            .or_insert(Attribute {
                value: AttrValue::Message,
                locked: false,
            });
        Ok(())
    }

    fn remove_input(&mut self, dst: NodeId, dst_attr: &str) -> Option<Plug> {
        let (src, src_attr) = self.inputs.remove(&(dst, dst_attr.to_string()))?;
        if let Some(out) = self.outputs.get_mut(&src) {
            out.remove(&(src_attr.clone(), dst, dst_attr.to_string()));
            if out.is_empty() {
                self.outputs.remove(&src);
            }
        }
        Some((src, src_attr))
    }

    /// Drop every connection touching `node`, or only those on `attr`.
    fn drop_connections(&mut self, node: NodeId, attr: Option<&str>) {
        let incoming: Vec<String> = self
            .inputs
            .keys()
            .filter(|(dst, dst_attr)| *dst == node && attr.map_or(true, |a| a == dst_attr.as_str()))
            .map(|(_, dst_attr)| dst_attr.clone())
            .collect();
        for dst_attr in incoming {
            self.remove_input(node, &dst_attr);
        }

        let outgoing: Vec<(String, NodeId, String)> = self
            .outputs
            .get(&node)
            .map(|set| {
                set.iter()
                    .filter(|(src_attr, _, _)| attr.map_or(true, |a| a == src_attr.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for (_, dst, dst_attr) in outgoing {
            self.remove_input(dst, &dst_attr);
        }
    }

    fn collect_subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(next) = stack.pop() {
            if let Some(record) = self.nodes.get(&next) {
                out.push(next);
                stack.extend(record.children.iter().copied());
            }
        }
        out
    }

    /// Serialize the scene.
    pub fn to_json(&self) -> ShotkitResult<String> {
        Ok(serde_json::to_string_pretty(&SceneDocument::from(self))?)
    }

    /// Rebuild a scene from its serialized form.
    pub fn from_json(content: &str) -> ShotkitResult<Self> {
        let document: SceneDocument = serde_json::from_str(content)?;
        document.into_scene()
    }

    pub fn save(&self, path: &Path) -> ShotkitResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!(path = %path.display(), nodes = self.nodes.len(), "Scene saved");
        Ok(())
    }

    pub fn load(path: &Path) -> ShotkitResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ShotkitError::FileMissing {
                    path: path.to_path_buf(),
                }
            } else {
                ShotkitError::Io(e)
            }
        })?;
        Self::from_json(&content).map_err(|e| match e {
            ShotkitError::Json(err) => ShotkitError::MalformedJson {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
            other => other,
        })
    }
}

impl Scene for MemoryScene {
    fn create_node(
        &mut self,
        name: &str,
        kind: NodeKind,
        parent: Option<NodeId>,
    ) -> ShotkitResult<NodeId> {
        if let Some(parent) = parent {
            self.record(parent)?;
        }
        self.next_id += 1;
        let id = NodeId(self.next_id);
        let (namespace, base) = split_name(name);
        self.nodes.insert(
            id,
            NodeRecord {
                name: base,
                namespace,
                kind,
                parent,
                children: Vec::new(),
                attrs: BTreeMap::new(),
                referenced: false,
            },
        );
        if let Some(parent) = parent {
            self.record_mut(parent)?.children.push(id);
        }
        Ok(id)
    }

    fn exists(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn name(&self, node: NodeId) -> ShotkitResult<String> {
        Ok(self.record(node)?.full_name())
    }

    fn rename(&mut self, node: NodeId, name: &str) -> ShotkitResult<()> {
        let (namespace, base) = split_name(name);
        let record = self.record_mut(node)?;
        record.name = base;
        if !namespace.is_empty() {
            record.namespace = namespace;
        }
        Ok(())
    }

    fn kind(&self, node: NodeId) -> ShotkitResult<NodeKind> {
        Ok(self.record(node)?.kind)
    }

    fn parent(&self, node: NodeId) -> ShotkitResult<Option<NodeId>> {
        Ok(self.record(node)?.parent)
    }

    fn children(&self, node: NodeId) -> ShotkitResult<Vec<NodeId>> {
        Ok(self.record(node)?.children.clone())
    }

    fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, r)| r.parent.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    fn find_by_name(&self, name: &str) -> Option<NodeId> {
        let (namespace, base) = split_name(name);
        self.nodes
            .iter()
            .find(|(_, r)| r.name == base && r.namespace == namespace)
            .map(|(id, _)| *id)
    }

    fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, r)| r.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    fn delete_node(&mut self, node: NodeId) -> ShotkitResult<()> {
        let parent = self.record(node)?.parent;
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }
        let doomed = self.collect_subtree(node);
        for id in &doomed {
            self.drop_connections(*id, None);
        }
        for id in &doomed {
            self.nodes.remove(id);
        }
        self.selection.retain(|id| !doomed.contains(id));
        tracing::trace!(node = %node, removed = doomed.len(), "Node deleted");
        Ok(())
    }

    fn attr(&self, node: NodeId, attr: &str) -> ShotkitResult<Option<AttrValue>> {
        Ok(self
            .record(node)?
            .attrs
            .get(attr)
            .map(|a| a.value.clone()))
    }

    fn set_attr(&mut self, node: NodeId, attr: &str, value: AttrValue) -> ShotkitResult<()> {
        self.ensure_unlocked(node, attr)?;
        let record = self.record_mut(node)?;
        match record.attrs.get_mut(attr) {
            Some(existing) => existing.value = value,
            None => {
                record.attrs.insert(
                    attr.to_string(),
                    Attribute {
                        value,
                        locked: false,
                    },
                );
            }
        }
        Ok(())
    }

    fn delete_attr(&mut self, node: NodeId, attr: &str) -> ShotkitResult<()> {
        self.ensure_unlocked(node, attr)?;
        if self.record_mut(node)?.attrs.remove(attr).is_some() {
            self.drop_connections(node, Some(attr));
        }
        Ok(())
    }

    fn attr_names(&self, node: NodeId) -> ShotkitResult<Vec<String>> {
        Ok(self.record(node)?.attrs.keys().cloned().collect())
    }

    fn is_locked(&self, node: NodeId, attr: &str) -> ShotkitResult<bool> {
        Ok(self
            .record(node)?
            .attrs
            .get(attr)
            .is_some_and(|a| a.locked))
    }

    fn set_locked(&mut self, node: NodeId, attr: &str, locked: bool) -> ShotkitResult<()> {
        match self.record_mut(node)?.attrs.get_mut(attr) {
            Some(attribute) => attribute.locked = locked,
            None => tracing::trace!(node = %node, attr, "Lock change on missing attribute ignored"),
        }
        Ok(())
    }

    fn connect(
        &mut self,
        src: NodeId,
        src_attr: &str,
        dst: NodeId,
        dst_attr: &str,
    ) -> ShotkitResult<()> {
        self.record(src)?;
        self.record(dst)?;
        self.ensure_unlocked(dst, dst_attr)?;
        self.ensure_message_plug(src, src_attr)?;
        self.ensure_message_plug(dst, dst_attr)?;

        self.remove_input(dst, dst_attr);
        self.inputs.insert(
            (dst, dst_attr.to_string()),
            (src, src_attr.to_string()),
        );
        self.outputs
            .entry(src)
            .or_default()
            .insert((src_attr.to_string(), dst, dst_attr.to_string()));
        Ok(())
    }

    fn disconnect(
        &mut self,
        src: NodeId,
        src_attr: &str,
        dst: NodeId,
        dst_attr: &str,
    ) -> ShotkitResult<bool> {
        self.record(dst)?;
        let matches = self
            .inputs
            .get(&(dst, dst_attr.to_string()))
            .is_some_and(|(s, a)| *s == src && a == src_attr);
        if !matches {
            return Ok(false);
        }
        self.ensure_unlocked(dst, dst_attr)?;
        self.remove_input(dst, dst_attr);
        Ok(true)
    }

    fn connections(&self, node: NodeId) -> ShotkitResult<Vec<Connection>> {
        self.record(node)?;
        let mut out: Vec<Connection> = self
            .inputs
            .iter()
            .filter(|((dst, _), _)| *dst == node)
            .map(|((dst, dst_attr), (src, src_attr))| Connection {
                src: *src,
                src_attr: src_attr.clone(),
                dst: *dst,
                dst_attr: dst_attr.clone(),
            })
            .collect();
        if let Some(set) = self.outputs.get(&node) {
            out.extend(set.iter().map(|(src_attr, dst, dst_attr)| Connection {
                src: node,
                src_attr: src_attr.clone(),
                dst: *dst,
                dst_attr: dst_attr.clone(),
            }));
        }
        Ok(out)
    }

    fn is_referenced(&self, node: NodeId) -> ShotkitResult<bool> {
        Ok(self.record(node)?.referenced)
    }

    fn namespace(&self, node: NodeId) -> ShotkitResult<String> {
        Ok(self.record(node)?.namespace.clone())
    }

    fn set_namespace(&mut self, node: NodeId, namespace: &str) -> ShotkitResult<()> {
        self.record_mut(node)?.namespace = namespace.trim_start_matches(':').to_string();
        Ok(())
    }

    fn selection(&self) -> Vec<NodeId> {
        self.selection.clone()
    }

    fn select(&mut self, nodes: &[NodeId]) {
        self.selection = nodes
            .iter()
            .copied()
            .filter(|id| self.nodes.contains_key(id))
            .collect();
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeDocument {
    id: NodeId,
    name: String,
    #[serde(default)]
    namespace: String,
    kind: NodeKind,
    #[serde(default)]
    parent: Option<NodeId>,
    #[serde(default)]
    attrs: BTreeMap<String, Attribute>,
    #[serde(default)]
    referenced: bool,
}

/// Serialized scene.
#[derive(Debug, Serialize, Deserialize)]
struct SceneDocument {
    nodes: Vec<NodeDocument>,
    #[serde(default)]
    connections: Vec<Connection>,
    #[serde(default)]
    selection: Vec<NodeId>,
}

impl From<&MemoryScene> for SceneDocument {
    fn from(scene: &MemoryScene) -> Self {
        let nodes = scene
            .nodes
            .iter()
            .map(|(id, r)| NodeDocument {
                id: *id,
                name: r.name.clone(),
                namespace: r.namespace.clone(),
                kind: r.kind,
                parent: r.parent,
                attrs: r.attrs.clone(),
                referenced: r.referenced,
            })
            .collect();
        let connections = scene
            .inputs
            .iter()
            .map(|((dst, dst_attr), (src, src_attr))| Connection {
                src: *src,
                src_attr: src_attr.clone(),
                dst: *dst,
                dst_attr: dst_attr.clone(),
            })
            .collect();
        Self {
            nodes,
            connections,
            selection: scene.selection.clone(),
        }
    }
}

impl SceneDocument {
    fn into_scene(self) -> ShotkitResult<MemoryScene> {
        let mut scene = MemoryScene::new();
        for node in &self.nodes {
            scene.next_id = scene.next_id.max(node.id.0);
            scene.nodes.insert(
                node.id,
                NodeRecord {
                    name: node.name.clone(),
                    namespace: node.namespace.clone(),
                    kind: node.kind,
                    parent: node.parent,
                    children: Vec::new(),
                    attrs: node.attrs.clone(),
                    referenced: node.referenced,
                },
            );
        }

        let links: Vec<(NodeId, NodeId)> = scene
            .nodes
            .iter()
            .filter_map(|(id, r)| r.parent.map(|p| (p, *id)))
            .collect();
        for (parent, child) in links {
            scene.record_mut(parent)?.children.push(child);
        }

        for c in self.connections {
            scene.record(c.src)?;
            scene.record(c.dst)?;
            scene
                .outputs
                .entry(c.src)
                .or_default()
                .insert((c.src_attr.clone(), c.dst, c.dst_attr.clone()));
            scene.inputs.insert((c.dst, c.dst_attr), (c.src, c.src_attr));
        }

        scene.selection = self
            .selection
            .into_iter()
            .filter(|id| scene.nodes.contains_key(id))
            .collect();
        Ok(scene)
    }
}
