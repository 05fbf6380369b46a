//! JSON-backed host plugins for headless use.
//!
//! The point-cache format is line-delimited JSON: a header line describing
//! the node hierarchy, then one line per sampled frame holding the scalar
//! attributes of every node. The render-proxy format is a single JSON
//! document describing the exported roots.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use shotkit_common::{ShotkitError, ShotkitResult};
use shotkit_project_model::paths::to_forward_slashes;
use shotkit_project_model::FrameRange;
use shotkit_scene_core::{
    incoming, mesh_transforms, shapes, short_name, strip_namespace, subtree, AttrValue, NodeId,
    NodeKind, Scene,
};

use crate::plugin::{CacheFlags, CachePlugin, FrameWriter, ProxyFlags, ProxyPlugin};

const CACHE_FORMAT: &str = "shotkit-pointcache";
const PROXY_FORMAT: &str = "shotkit-proxy";
const FORMAT_VERSION: u32 = 1;

/// Attribute created on imported mesh transforms.
pub const SMOOTH_ATTR: &str = "displaySmoothMesh";

/// Plug on mesh shapes fed by their shading group.
pub const SHADING_GROUP_ATTR: &str = "shading_group";

/// Attribute on proxy shapes holding the proxy file path.
pub const PROXY_PATH_ATTR: &str = "dso";

fn unwritable(path: &Path, e: impl std::fmt::Display) -> ShotkitError {
    ShotkitError::DestinationUnwritable {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn malformed(path: &Path, message: impl Into<String>) -> ShotkitError {
    ShotkitError::MalformedJson {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn open_for_read(path: &Path) -> ShotkitResult<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ShotkitError::FileMissing {
                path: path.to_path_buf(),
            }
        } else {
            ShotkitError::Io(e)
        }
    })
}

/// Name of a node as written to a cache, after namespace stripping.
fn cached_name(full: &str, strip: Option<u32>) -> String {
    match strip {
        None => full.to_string(),
        Some(0) => strip_namespace(full).to_string(),
        Some(levels) => {
            let mut rest = full;
            for _ in 0..levels {
                match rest.split_once(':') {
                    Some((_, tail)) => rest = tail,
                    None => break,
                }
            }
            rest.to_string()
        }
    }
}

/// Name of an imported node: the cached name moved into `namespace`.
fn imported_name(cached: &str, namespace: Option<&str>) -> String {
    match namespace.filter(|ns| !ns.is_empty()) {
        Some(ns) => format!("{ns}:{}", strip_namespace(cached)),
        None => cached.to_string(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheHeader {
    format: String,
    version: u32,
    flags: CacheFlags,
    nodes: Vec<CachedNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedNode {
    name: String,
    kind: NodeKind,
    /// Index of the parent within the header, `None` for roots.
    parent: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FrameSample {
    frame: f64,
    values: BTreeMap<usize, BTreeMap<String, AttrValue>>,
}

/// Reference point-cache plugin.
#[derive(Debug, Clone)]
pub struct JsonCachePlugin {
    loaded: bool,
}

impl JsonCachePlugin {
    pub fn new() -> Self {
        Self { loaded: true }
    }

    /// A plugin that reports itself as not loaded.
    pub fn unloaded() -> Self {
        Self { loaded: false }
    }
}

impl Default for JsonCachePlugin {
    fn default() -> Self {
        Self::new()
    }
}

struct JsonFrameWriter {
    path: PathBuf,
    out: BufWriter<File>,
    nodes: Vec<NodeId>,
}

impl JsonFrameWriter {
    fn line<T: Serialize>(&mut self, value: &T) -> ShotkitResult<()> {
        serde_json::to_writer(&mut self.out, value)?;
        self.out
            .write_all(b"\n")
            .map_err(|e| unwritable(&self.path, e))
    }
}

impl FrameWriter for JsonFrameWriter {
    fn write_frame(&mut self, scene: &dyn Scene, frame: f64) -> ShotkitResult<()> {
        let mut values = BTreeMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let mut sampled = BTreeMap::new();
            for attr in scene.attr_names(*node)? {
                match scene.attr(*node, &attr)? {
                    Some(value @ (AttrValue::Bool(_) | AttrValue::Int(_) | AttrValue::Float(_))) => {
                        sampled.insert(attr, value);
                    }
                    _ => {}
                }
            }
            if !sampled.is_empty() {
                values.insert(index, sampled);
            }
        }
        self.line(&FrameSample { frame, values })
    }

    fn finish(self: Box<Self>) -> ShotkitResult<()> {
        let path = self.path.clone();
        let file = self.out.into_inner().map_err(|e| unwritable(&path, e.error()))?;
        file.sync_all().map_err(|e| unwritable(&path, e))
    }
}

impl CachePlugin for JsonCachePlugin {
    fn name(&self) -> &str {
        "json_pointcache"
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn open_writer(
        &self,
        scene: &dyn Scene,
        nodes: &[NodeId],
        path: &Path,
        flags: &CacheFlags,
    ) -> ShotkitResult<Box<dyn FrameWriter>> {
        let mut header = CacheHeader {
            format: CACHE_FORMAT.to_string(),
            version: FORMAT_VERSION,
            flags: flags.clone(),
            nodes: Vec::with_capacity(nodes.len()),
        };
        for node in nodes {
            let mut parent = scene.parent(*node)?;
            let mut parent_index = None;
            while let Some(p) = parent {
                if let Some(index) = nodes.iter().position(|n| *n == p) {
                    parent_index = Some(index);
                    break;
                }
                parent = scene.parent(p)?;
            }
            header.nodes.push(CachedNode {
                name: cached_name(&scene.name(*node)?, flags.strip_namespaces),
                kind: scene.kind(*node)?,
                parent: parent_index,
            });
        }

        let file = File::create(path).map_err(|e| unwritable(path, e))?;
        let mut writer = JsonFrameWriter {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            nodes: nodes.to_vec(),
        };
        writer.line(&header)?;
        Ok(Box::new(writer))
    }

    fn import(
        &self,
        scene: &mut dyn Scene,
        path: &Path,
        parent: Option<NodeId>,
        namespace: Option<&str>,
    ) -> ShotkitResult<Vec<NodeId>> {
        let mut lines = BufReader::new(open_for_read(path)?).lines();
        let header_line = lines
            .next()
            .ok_or_else(|| malformed(path, "empty cache file"))??;
        let header: CacheHeader =
            serde_json::from_str(&header_line).map_err(|e| malformed(path, e.to_string()))?;
        if header.format != CACHE_FORMAT {
            return Err(malformed(path, format!("unknown cache format '{}'", header.format)));
        }
        let first_frame: Option<FrameSample> = match lines.next() {
            Some(line) => Some(serde_json::from_str(&line?).map_err(|e| malformed(path, e.to_string()))?),
            None => None,
        };

        let mut created: Vec<NodeId> = Vec::with_capacity(header.nodes.len());
        for (index, cached) in header.nodes.iter().enumerate() {
            let node_parent = match cached.parent {
                Some(p) if p < index => Some(created[p]),
                Some(p) => {
                    return Err(malformed(
                        path,
                        format!("node {index} names parent {p} that is not declared before it"),
                    ))
                }
                None => parent,
            };
            let node = scene.create_node(
                &imported_name(&cached.name, namespace),
                cached.kind,
                node_parent,
            )?;
            created.push(node);
        }

        if let Some(sample) = first_frame {
            for (index, values) in sample.values {
                let Some(node) = created.get(index).copied() else {
                    continue;
                };
                for (attr, value) in values {
                    scene.set_attr(node, &attr, value)?;
                }
            }
        }

        for node in &created {
            if scene.kind(*node)? == NodeKind::Transform
                && !shapes(&*scene, *node, NodeKind::Mesh)?.is_empty()
                && scene.attr(*node, SMOOTH_ATTR)?.is_none()
            {
                scene.set_attr(*node, SMOOTH_ATTR, AttrValue::Int(0))?;
            }
        }

        tracing::debug!(path = %path.display(), nodes = created.len(), "Point cache imported");
        Ok(created)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProxyDocument {
    format: String,
    version: u32,
    roots: Vec<String>,
    frames: FrameRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bbox: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shaders: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct BoundingBox {
    min: [f64; 3],
    max: [f64; 3],
}

/// Reference render-proxy plugin.
#[derive(Debug, Clone)]
pub struct JsonProxyPlugin {
    loaded: bool,
}

impl JsonProxyPlugin {
    pub fn new() -> Self {
        Self { loaded: true }
    }

    pub fn unloaded() -> Self {
        Self { loaded: false }
    }
}

impl Default for JsonProxyPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn bounding_box(scene: &dyn Scene, roots: &[NodeId]) -> ShotkitResult<BoundingBox> {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for root in roots {
        for node in subtree(scene, *root)? {
            for (axis, attr) in ["translateX", "translateY", "translateZ"].iter().enumerate() {
                let value = scene
                    .attr(node, attr)?
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0);
                min[axis] = min[axis].min(value);
                max[axis] = max[axis].max(value);
            }
        }
    }
    Ok(BoundingBox { min, max })
}

fn shader_assignments(
    scene: &dyn Scene,
    roots: &[NodeId],
) -> ShotkitResult<BTreeMap<String, Vec<String>>> {
    let mut assignments: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for root in roots {
        for mesh in mesh_transforms(scene, *root)? {
            for shape in shapes(scene, mesh, NodeKind::Mesh)? {
                if let Some(conn) = incoming(scene, shape, SHADING_GROUP_ATTR)? {
                    let group = short_name(scene, conn.src)?;
                    let entry = assignments.entry(short_name(scene, mesh)?).or_default();
                    if !entry.contains(&group) {
                        entry.push(group);
                    }
                }
            }
        }
    }
    Ok(assignments)
}

impl ProxyPlugin for JsonProxyPlugin {
    fn name(&self) -> &str {
        "json_proxy"
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn export(
        &self,
        scene: &dyn Scene,
        roots: &[NodeId],
        path: &Path,
        frames: &FrameRange,
        flags: &ProxyFlags,
    ) -> ShotkitResult<()> {
        let mut names = Vec::with_capacity(roots.len());
        for root in roots {
            names.push(scene.name(*root)?);
        }
        let document = ProxyDocument {
            format: PROXY_FORMAT.to_string(),
            version: FORMAT_VERSION,
            roots: names,
            frames: *frames,
            bbox: if flags.compute_bbox {
                Some(bounding_box(scene, roots)?)
            } else {
                None
            },
            shaders: if flags.auto_shader_sync {
                Some(shader_assignments(scene, roots)?)
            } else {
                None
            },
        };
        let json = serde_json::to_string_pretty(&document)?;
        std::fs::write(path, json).map_err(|e| unwritable(path, e))
    }

    fn import(
        &self,
        scene: &mut dyn Scene,
        path: &Path,
        parent: Option<NodeId>,
        namespace: Option<&str>,
    ) -> ShotkitResult<Vec<NodeId>> {
        open_for_read(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "proxy".to_string());

        let transform = scene.create_node(&imported_name(&stem, namespace), NodeKind::Transform, parent)?;
        let shape = scene.create_node(
            &imported_name(&format!("{stem}_standin"), namespace),
            NodeKind::Proxy,
            Some(transform),
        )?;
        scene.set_attr(
            shape,
            PROXY_PATH_ATTR,
            AttrValue::from(to_forward_slashes(path)),
        )?;
        Ok(vec![transform, shape])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotkit_common::ErrorCode;
    use shotkit_scene_core::MemoryScene;

    #[test]
    fn namespace_stripping_follows_depth() {
        assert_eq!(cached_name("a:b:c", None), "a:b:c");
        assert_eq!(cached_name("a:b:c", Some(0)), "c");
        assert_eq!(cached_name("a:b:c", Some(1)), "b:c");
        assert_eq!(cached_name("c", Some(3)), "c");
        assert_eq!(imported_name("old:c", Some("ns1")), "ns1:c");
        assert_eq!(imported_name("old:c", None), "old:c");
    }

    #[test]
    fn cache_hierarchy_and_scalars_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.abc");
        let mut scene = MemoryScene::new();
        let root = scene.create_node("src:char_A", NodeKind::Transform, None).unwrap();
        let body = scene.create_node("src:body", NodeKind::Transform, Some(root)).unwrap();
        let shape = scene.create_node("src:bodyShape", NodeKind::Mesh, Some(body)).unwrap();
        scene.set_attr(body, "translateY", AttrValue::Float(2.5)).unwrap();
        scene.set_attr(root, "note", AttrValue::from("not cached")).unwrap();

        let plugin = JsonCachePlugin::new();
        let flags = CacheFlags {
            strip_namespaces: Some(0),
            ..CacheFlags::default()
        };
        let mut writer = plugin
            .open_writer(&scene, &[root, body, shape], &path, &flags)
            .unwrap();
        writer.write_frame(&scene, 1.0).unwrap();
        writer.write_frame(&scene, 2.0).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);

        let mut target = MemoryScene::new();
        let created = plugin.import(&mut target, &path, None, Some("ns1")).unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(target.name(created[0]).unwrap(), "ns1:char_A");
        assert_eq!(target.parent(created[2]).unwrap(), Some(created[1]));
        assert_eq!(target.kind(created[2]).unwrap(), NodeKind::Mesh);
        assert_eq!(
            target.attr(created[1], "translateY").unwrap(),
            Some(AttrValue::Float(2.5))
        );
        assert_eq!(target.attr(created[0], "note").unwrap(), None);
        assert_eq!(
            target.attr(created[1], SMOOTH_ATTR).unwrap(),
            Some(AttrValue::Int(0))
        );
    }

    #[test]
    fn missing_and_garbled_caches_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = JsonCachePlugin::new();
        let mut scene = MemoryScene::new();

        let err = plugin
            .import(&mut scene, &dir.path().join("nope.abc"), None, None)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::FileMissing);

        let garbled = dir.path().join("garbled.abc");
        std::fs::write(&garbled, "not json\n").unwrap();
        let err = plugin.import(&mut scene, &garbled, None, None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedJson);
    }

    #[test]
    fn proxies_record_bbox_and_shaders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.ass");
        let mut scene = MemoryScene::new();
        let root = scene.create_node("tree", NodeKind::Transform, None).unwrap();
        let leaves = scene.create_node("leaves", NodeKind::Transform, Some(root)).unwrap();
        let shape = scene.create_node("leavesShape", NodeKind::Mesh, Some(leaves)).unwrap();
        let sg = scene.create_node("leafSG", NodeKind::ShadingGroup, None).unwrap();
        scene.connect(sg, "message", shape, SHADING_GROUP_ATTR).unwrap();
        scene.set_attr(leaves, "translateX", AttrValue::Float(-3.0)).unwrap();

        let plugin = JsonProxyPlugin::new();
        plugin
            .export(&scene, &[root], &path, &FrameRange::single(1.0), &ProxyFlags::default())
            .unwrap();
        let document: ProxyDocument =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document.roots, vec!["tree"]);
        assert_eq!(document.bbox.unwrap().min[0], -3.0);
        assert_eq!(document.shaders.unwrap()["leaves"], vec!["leafSG"]);

        let mut target = MemoryScene::new();
        let created = plugin.import(&mut target, &path, None, Some("ns")).unwrap();
        assert_eq!(target.name(created[0]).unwrap(), "ns:tree");
        assert_eq!(target.kind(created[1]).unwrap(), NodeKind::Proxy);
        assert!(target
            .attr(created[1], PROXY_PATH_ATTR)
            .unwrap()
            .unwrap()
            .to_string()
            .ends_with("tree.ass"));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn imported_names_carry_one_namespace(
                parts in proptest::collection::vec("[a-z][a-z0-9_]{0,5}", 1..5),
                ns in "[a-z][a-z0-9]{0,5}",
            ) {
                let full = parts.join(":");
                let short = parts.last().unwrap();
                prop_assert_eq!(&cached_name(&full, Some(0)), short);
                prop_assert_eq!(imported_name(&full, Some(ns.as_str())), format!("{ns}:{short}"));
                prop_assert_eq!(imported_name(&full, None), full);
            }
        }
    }
}
