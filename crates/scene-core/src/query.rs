//! Derived queries over any [`Scene`].

use shotkit_common::ShotkitResult;

use crate::scene::{Connection, NodeId, NodeKind, Scene};

/// Attribute read by [`is_renderable`].
pub const VISIBILITY_ATTR: &str = "visibility";

/// `ns1:ns2:char_A` -> `char_A`.
pub fn strip_namespace(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Namespace-stripped name of a node.
pub fn short_name<S: Scene + ?Sized>(scene: &S, node: NodeId) -> ShotkitResult<String> {
    Ok(strip_namespace(&scene.name(node)?).to_string())
}

/// Descendants of `node` in depth-first pre-order, excluding `node`.
pub fn descendants<S: Scene + ?Sized>(scene: &S, node: NodeId) -> ShotkitResult<Vec<NodeId>> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = scene.children(node)?.into_iter().rev().collect();
    while let Some(next) = stack.pop() {
        out.push(next);
        stack.extend(scene.children(next)?.into_iter().rev());
    }
    Ok(out)
}

/// `node` followed by its descendants.
pub fn subtree<S: Scene + ?Sized>(scene: &S, node: NodeId) -> ShotkitResult<Vec<NodeId>> {
    let mut out = vec![node];
    out.extend(descendants(scene, node)?);
    Ok(out)
}

/// A node is renderable when neither it nor any ancestor is hidden.
pub fn is_renderable<S: Scene + ?Sized>(scene: &S, node: NodeId) -> ShotkitResult<bool> {
    let mut current = Some(node);
    while let Some(id) = current {
        let visible = scene
            .attr(id, VISIBILITY_ATTR)?
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if !visible {
            return Ok(false);
        }
        current = scene.parent(id)?;
    }
    Ok(true)
}

/// Direct children of `transform` with the given kind.
pub fn shapes<S: Scene + ?Sized>(
    scene: &S,
    transform: NodeId,
    kind: NodeKind,
) -> ShotkitResult<Vec<NodeId>> {
    let mut out = Vec::new();
    for child in scene.children(transform)? {
        if scene.kind(child)? == kind {
            out.push(child);
        }
    }
    Ok(out)
}

/// Transforms in the subtree of `root` (inclusive) owning a mesh shape.
pub fn mesh_transforms<S: Scene + ?Sized>(scene: &S, root: NodeId) -> ShotkitResult<Vec<NodeId>> {
    let mut out = Vec::new();
    for node in subtree(scene, root)? {
        if scene.kind(node)? == NodeKind::Transform
            && !shapes(scene, node, NodeKind::Mesh)?.is_empty()
        {
            out.push(node);
        }
    }
    Ok(out)
}

/// The connection feeding `node.attr`, if any.
pub fn incoming<S: Scene + ?Sized>(
    scene: &S,
    node: NodeId,
    attr: &str,
) -> ShotkitResult<Option<Connection>> {
    Ok(scene
        .connections(node)?
        .into_iter()
        .find(|c| c.dst == node && c.dst_attr == attr))
}

/// Connections leaving `node.attr`.
pub fn outgoing<S: Scene + ?Sized>(
    scene: &S,
    node: NodeId,
    attr: &str,
) -> ShotkitResult<Vec<Connection>> {
    Ok(scene
        .connections(node)?
        .into_iter()
        .filter(|c| c.src == node && c.src_attr == attr)
        .collect())
}
