//! Unlock/write/relock guard.
//!
//! Every write made through a [`LockScope`] unlocks the target attribute
//! first and records it. When the scope drops, on success or on an early
//! `?` return, every recorded attribute that still exists is locked again.

use std::ops::Deref;

use shotkit_common::ShotkitResult;

use crate::scene::{NodeId, Scene};
use crate::value::AttrValue;

pub struct LockScope<'a, S: Scene + ?Sized> {
    scene: &'a mut S,
    node: NodeId,
    touched: Vec<String>,
}

impl<'a, S: Scene + ?Sized> LockScope<'a, S> {
    pub fn new(scene: &'a mut S, node: NodeId) -> Self {
        Self {
            scene,
            node,
            touched: Vec::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    fn open(&mut self, attr: &str) -> ShotkitResult<()> {
        if self.scene.is_locked(self.node, attr)? {
            self.scene.set_locked(self.node, attr, false)?;
        }
        if !self.touched.iter().any(|a| a == attr) {
            self.touched.push(attr.to_string());
        }
        Ok(())
    }

    /// Write an attribute of the scoped node.
    pub fn set(&mut self, attr: &str, value: AttrValue) -> ShotkitResult<()> {
        self.open(attr)?;
        self.scene.set_attr(self.node, attr, value)
    }

    /// Connect `src.src_attr` into `attr` of the scoped node.
    pub fn connect_into(&mut self, src: NodeId, src_attr: &str, attr: &str) -> ShotkitResult<()> {
        self.open(attr)?;
        self.scene.connect(src, src_attr, self.node, attr)
    }

    /// Connect `attr` of the scoped node into `dst.dst_attr`. The source
    /// plug is locked with the rest of the scope.
    pub fn connect_from(&mut self, attr: &str, dst: NodeId, dst_attr: &str) -> ShotkitResult<()> {
        self.open(attr)?;
        self.scene.connect(self.node, attr, dst, dst_attr)
    }

    /// Remove an attribute of the scoped node.
    pub fn remove(&mut self, attr: &str) -> ShotkitResult<()> {
        self.open(attr)?;
        self.scene.delete_attr(self.node, attr)
    }

    /// Unlock an attribute without writing it, so it is relocked on drop.
    pub fn touch(&mut self, attr: &str) -> ShotkitResult<()> {
        self.open(attr)
    }
}

impl<S: Scene + ?Sized> Deref for LockScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.scene
    }
}

impl<S: Scene + ?Sized> Drop for LockScope<'_, S> {
    fn drop(&mut self) {
        if !self.scene.exists(self.node) {
            return;
        }
        for attr in &self.touched {
            let present = matches!(self.scene.attr(self.node, attr), Ok(Some(_)));
            if !present {
                continue;
            }
            if let Err(e) = self.scene.set_locked(self.node, attr, true) {
                tracing::error!(node = %self.node, attr = %attr, "Failed to relock attribute: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryScene, NodeKind};
    use shotkit_common::ShotkitError;

    #[test]
    fn writes_are_relocked_on_success() {
        let mut scene = MemoryScene::new();
        let node = scene.create_node("tag", NodeKind::Data, None).unwrap();
        {
            let mut scope = LockScope::new(&mut scene, node);
            scope.set("id", AttrValue::from("a-1")).unwrap();
            scope.set("types", AttrValue::from("prop")).unwrap();
            assert!(!scope.is_locked(node, "id").unwrap());
        }
        assert!(scene.is_locked(node, "id").unwrap());
        assert!(scene.is_locked(node, "types").unwrap());
    }

    #[test]
    fn early_returns_still_relock() {
        fn failing(scene: &mut MemoryScene, node: NodeId) -> ShotkitResult<()> {
            let mut scope = LockScope::new(scene, node);
            scope.set("id", AttrValue::from("a-2"))?;
            Err(ShotkitError::plugin("boom"))
        }

        let mut scene = MemoryScene::new();
        let node = scene.create_node("tag", NodeKind::Data, None).unwrap();
        scene.set_attr(node, "id", AttrValue::from("a-1")).unwrap();
        scene.set_locked(node, "id", true).unwrap();

        assert!(failing(&mut scene, node).is_err());
        assert!(scene.is_locked(node, "id").unwrap());
        assert_eq!(scene.attr(node, "id").unwrap(), Some(AttrValue::from("a-2")));
    }

    #[test]
    fn removed_attributes_are_not_resurrected() {
        let mut scene = MemoryScene::new();
        let node = scene.create_node("tag", NodeKind::Data, None).unwrap();
        scene.set_attr(node, "hires", AttrValue::Message).unwrap();
        scene.set_locked(node, "hires", true).unwrap();
        {
            let mut scope = LockScope::new(&mut scene, node);
            scope.remove("hires").unwrap();
        }
        assert_eq!(scene.attr(node, "hires").unwrap(), None);
    }

    #[test]
    fn works_through_trait_objects() {
        let mut scene = MemoryScene::new();
        let node = scene.create_node("tag", NodeKind::Data, None).unwrap();
        let dynamic: &mut dyn Scene = &mut scene;
        {
            let mut scope = LockScope::new(dynamic, node);
            scope.set("id", AttrValue::Int(3)).unwrap();
        }
        assert!(scene.is_locked(node, "id").unwrap());
    }
}
