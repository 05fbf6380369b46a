//! The host scene interface.

use serde::{Deserialize, Serialize};

use shotkit_common::ShotkitResult;

use crate::value::AttrValue;

/// Opaque node identity, stable for the life of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node types the core distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A DAG transform.
    Transform,
    /// A mesh shape, parented under a transform.
    Mesh,
    /// A generic data-carrying node (tag nodes).
    Data,
    ShadingGroup,
    /// A render-proxy stand-in shape.
    Proxy,
}

/// A message connection `src.src_attr -> dst.dst_attr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub src: NodeId,
    pub src_attr: String,
    pub dst: NodeId,
    pub dst_attr: String,
}

/// Capabilities the core requires from a host scene.
///
/// Names are full names: `namespace:name`, or just `name` in the root
/// namespace. A destination plug accepts a single incoming connection;
/// connecting into an occupied plug replaces the previous source. Locked
/// attributes refuse writes, deletion, and connection changes with
/// `AttributeLocked`.
pub trait Scene {
    /// Create a node. A `ns:name` name places it in namespace `ns`.
    fn create_node(
        &mut self,
        name: &str,
        kind: NodeKind,
        parent: Option<NodeId>,
    ) -> ShotkitResult<NodeId>;

    fn exists(&self, node: NodeId) -> bool;

    /// Full name, including the namespace.
    fn name(&self, node: NodeId) -> ShotkitResult<String>;

    fn rename(&mut self, node: NodeId, name: &str) -> ShotkitResult<()>;

    fn kind(&self, node: NodeId) -> ShotkitResult<NodeKind>;

    fn parent(&self, node: NodeId) -> ShotkitResult<Option<NodeId>>;

    fn children(&self, node: NodeId) -> ShotkitResult<Vec<NodeId>>;

    /// Nodes without a parent, in creation order.
    fn roots(&self) -> Vec<NodeId>;

    /// First node whose full name equals `name`.
    fn find_by_name(&self, name: &str) -> Option<NodeId>;

    /// All nodes of a kind, in creation order.
    fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId>;

    /// Delete a node, its descendants, and every connection touching them.
    fn delete_node(&mut self, node: NodeId) -> ShotkitResult<()>;

    fn attr(&self, node: NodeId, attr: &str) -> ShotkitResult<Option<AttrValue>>;

    /// Create or overwrite an attribute.
    fn set_attr(&mut self, node: NodeId, attr: &str, value: AttrValue) -> ShotkitResult<()>;

    /// Remove an attribute and its connections. Missing attributes are a
    /// no-op.
    fn delete_attr(&mut self, node: NodeId, attr: &str) -> ShotkitResult<()>;

    fn attr_names(&self, node: NodeId) -> ShotkitResult<Vec<String>>;

    /// Lock state; `false` for missing attributes.
    fn is_locked(&self, node: NodeId, attr: &str) -> ShotkitResult<bool>;

    /// Lock or unlock an existing attribute.
    fn set_locked(&mut self, node: NodeId, attr: &str, locked: bool) -> ShotkitResult<()>;

    /// Connect `src.src_attr` into `dst.dst_attr`, creating message plugs
    /// that do not exist yet.
    fn connect(
        &mut self,
        src: NodeId,
        src_attr: &str,
        dst: NodeId,
        dst_attr: &str,
    ) -> ShotkitResult<()>;

    /// Remove a connection. Returns whether one existed.
    fn disconnect(
        &mut self,
        src: NodeId,
        src_attr: &str,
        dst: NodeId,
        dst_attr: &str,
    ) -> ShotkitResult<bool>;

    /// Every connection with `node` at either end.
    fn connections(&self, node: NodeId) -> ShotkitResult<Vec<Connection>>;

    fn is_referenced(&self, node: NodeId) -> ShotkitResult<bool>;

    /// Namespace without leading colon; empty for the root namespace.
    fn namespace(&self, node: NodeId) -> ShotkitResult<String>;

    fn set_namespace(&mut self, node: NodeId, namespace: &str) -> ShotkitResult<()>;

    /// The active selection.
    fn selection(&self) -> Vec<NodeId>;

    fn select(&mut self, nodes: &[NodeId]);
}
