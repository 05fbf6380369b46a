//! Tag graph queries and edits.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use shotkit_catalogue::Snapshot;
use shotkit_common::{
    MissingEntryPolicy, ProjectConfig, ShotkitError, ShotkitResult, WarningCode, Warnings,
};
use shotkit_project_model::{
    decode_shaders, decode_types, strip_trailing_digits, CatalogueEntry, TagRecord, KEY_HIRES,
    KEY_ID, KEY_SHADERS, KEY_TYPES,
};
use shotkit_scene_core::{
    incoming, outgoing, short_name, strip_namespace, subtree, AttrValue, LockScope, NodeId,
    NodeKind, Scene,
};

use crate::schema::{
    is_reserved, ATTR_HIRES, ATTR_ID, ATTR_MESSAGE, ATTR_NODE, ATTR_SHADERS, ATTR_TAG_DATA,
    ATTR_TAG_INFO, ATTR_TAG_TYPE, ATTR_TYPES, TAG_NODE_SUFFIX,
};

/// Where a tag is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagForm {
    /// On a TagNode connected through `tag_data`.
    Linked,
    /// In the transform's own `tag_info` attribute.
    Embedded,
}

/// A tag as seen on one transform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagNode {
    /// The tagged transform.
    pub node: NodeId,
    pub form: TagForm,
    /// The data node holding a linked tag.
    pub tag_node: Option<NodeId>,
    pub record: TagRecord,
    pub hires_node: Option<NodeId>,
}

/// Filter for [`TagGraph::find_all_tags`].
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    pub form: Option<TagForm>,
    /// Every listed flag must be present.
    pub types: Vec<String>,
}

impl TagFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn form(mut self, form: TagForm) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    fn matches(&self, tag: &TagNode) -> bool {
        self.form.map_or(true, |f| f == tag.form) && tag.record.has_types(&self.types)
    }
}

/// View and edit API over the tags of one project.
#[derive(Debug, Clone)]
pub struct TagGraph {
    tag_type: String,
    resolution_policy: MissingEntryPolicy,
}

impl TagGraph {
    pub fn new(tag_type: impl Into<String>) -> Self {
        Self {
            tag_type: tag_type.into(),
            resolution_policy: MissingEntryPolicy::Silent,
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(config.tag_type())
            .with_resolution_policy(config.policies.resolution_missing_entry)
    }

    pub fn with_resolution_policy(mut self, policy: MissingEntryPolicy) -> Self {
        self.resolution_policy = policy;
        self
    }

    pub fn tag_type(&self) -> &str {
        &self.tag_type
    }

    /// Whether `node` is a TagNode of this project.
    pub fn is_own_tag_node<S: Scene + ?Sized>(&self, scene: &S, node: NodeId) -> ShotkitResult<bool> {
        let discriminator = scene.attr(node, ATTR_TAG_TYPE)?;
        Ok(discriminator.as_ref().and_then(AttrValue::as_str) == Some(self.tag_type.as_str()))
    }

    /// The TagNode of this project linked to `node`, if any.
    pub fn linked_tag_node<S: Scene + ?Sized>(
        &self,
        scene: &S,
        node: NodeId,
    ) -> ShotkitResult<Option<NodeId>> {
        for conn in outgoing(scene, node, ATTR_TAG_DATA)? {
            if conn.dst_attr == ATTR_NODE && self.is_own_tag_node(scene, conn.dst)? {
                return Ok(Some(conn.dst));
            }
        }
        Ok(None)
    }

    /// Tag or re-tag a transform.
    ///
    /// An existing TagNode of this project is updated in place. `hires`
    /// wins over `record.hires`; a hires name without a node is looked up
    /// by short name under `node`. Every written attribute is locked again
    /// before returning, including on error.
    pub fn tag<S: Scene + ?Sized>(
        &self,
        scene: &mut S,
        node: NodeId,
        record: &TagRecord,
        hires: Option<NodeId>,
    ) -> ShotkitResult<TagNode> {
        if !scene.exists(node) {
            return Err(ShotkitError::node_missing(node.to_string()));
        }
        let node_name = scene.name(node)?;
        if let Some(key) = record.extra.keys().find(|k| is_reserved(k)) {
            return Err(ShotkitError::invalid_tag(
                node_name,
                format!("'{key}' is a reserved tag attribute"),
            ));
        }

        let hires_node = match (hires, record.hires.as_deref()) {
            (Some(h), _) => {
                if !scene.exists(h) {
                    return Err(ShotkitError::node_missing(h.to_string()));
                }
                Some(h)
            }
            (None, Some(name)) => Some(find_in_subtree(scene, node, name)?.ok_or_else(|| {
                ShotkitError::invalid_tag(
                    node_name.clone(),
                    format!("hires group '{name}' not found under node"),
                )
            })?),
            (None, None) => None,
        };

        let mut stored = record.clone();
        stored.hires = match hires_node {
            Some(h) => Some(short_name(scene, h)?),
            None => None,
        };

        let tag_node = match self.linked_tag_node(scene, node)? {
            Some(existing) => existing,
            None => {
                let namespace = scene.namespace(node)?;
                let short = short_name(scene, node)?;
                let name = if namespace.is_empty() {
                    format!("{short}{TAG_NODE_SUFFIX}")
                } else {
                    format!("{namespace}:{short}{TAG_NODE_SUFFIX}")
                };
                scene.create_node(&name, NodeKind::Data, None)?
            }
        };

        let stale: Vec<String> = scene
            .attr_names(tag_node)?
            .into_iter()
            .filter(|a| !is_reserved(a) && !stored.extra.contains_key(a))
            .collect();

        {
            let mut scope = LockScope::new(&mut *scene, tag_node);
            scope.set(ATTR_TAG_TYPE, AttrValue::from(self.tag_type.as_str()))?;
            scope.connect_into(node, ATTR_TAG_DATA, ATTR_NODE)?;
            match &stored.catalogue_id {
                Some(id) => scope.set(ATTR_ID, AttrValue::from(id.as_str()))?,
                None => scope.remove(ATTR_ID)?,
            }
            scope.set(ATTR_TYPES, AttrValue::from(stored.types_string()))?;
            match hires_node {
                Some(h) => scope.connect_into(h, ATTR_MESSAGE, ATTR_HIRES)?,
                None => scope.remove(ATTR_HIRES)?,
            }
            scope.set(ATTR_SHADERS, AttrValue::from(stored.shaders_string()))?;
            for attr in &stale {
                scope.remove(attr)?;
            }
            for (key, raw) in &stored.extra {
                scope.set(key, AttrValue::parse_literal(raw))?;
            }
        }

        tracing::debug!(node = %node_name, tag_node = %tag_node, types = %stored.types_string(), "Node tagged");
        Ok(TagNode {
            node,
            form: TagForm::Linked,
            tag_node: Some(tag_node),
            record: stored,
            hires_node,
        })
    }

    /// Remove every tag of this project from `node`. Returns whether one
    /// was present.
    pub fn untag<S: Scene + ?Sized>(&self, scene: &mut S, node: NodeId) -> ShotkitResult<bool> {
        if !scene.exists(node) {
            return Err(ShotkitError::node_missing(node.to_string()));
        }
        let mut removed = false;
        while let Some(tag_node) = self.linked_tag_node(scene, node)? {
            for attr in scene.attr_names(tag_node)? {
                scene.set_locked(tag_node, &attr, false)?;
            }
            scene.delete_node(tag_node)?;
            removed = true;
        }
        if scene.attr(node, ATTR_TAG_INFO)?.is_some() {
            scene.set_locked(node, ATTR_TAG_INFO, false)?;
            scene.delete_attr(node, ATTR_TAG_INFO)?;
            removed = true;
        }
        if scene.attr(node, ATTR_TAG_DATA)?.is_some() && outgoing(scene, node, ATTR_TAG_DATA)?.is_empty() {
            scene.set_locked(node, ATTR_TAG_DATA, false)?;
            scene.delete_attr(node, ATTR_TAG_DATA)?;
        }
        if removed {
            tracing::debug!(node = %node, "Node untagged");
        }
        Ok(removed)
    }

    /// Write the embedded form of `record` onto `node`.
    pub fn embed<S: Scene + ?Sized>(
        &self,
        scene: &mut S,
        node: NodeId,
        record: &TagRecord,
    ) -> ShotkitResult<()> {
        if !scene.exists(node) {
            return Err(ShotkitError::node_missing(node.to_string()));
        }
        let mut scope = LockScope::new(scene, node);
        scope.set(ATTR_TAG_INFO, AttrValue::from(record.to_tag_info()))?;
        Ok(())
    }

    /// The tag carried by `node`: a linked TagNode of this project first,
    /// then the embedded `tag_info` form. Foreign tags are ignored.
    pub fn find_tag_for_node<S: Scene + ?Sized>(
        &self,
        scene: &S,
        node: NodeId,
    ) -> ShotkitResult<Option<TagNode>> {
        if !scene.exists(node) {
            return Err(ShotkitError::node_missing(node.to_string()));
        }
        if let Some(tag_node) = self.linked_tag_node(scene, node)? {
            return read_linked(scene, node, tag_node).map(Some);
        }
        read_embedded(scene, node)
    }

    /// Every tagged transform matching `filter`, ordered by short name.
    pub fn find_all_tags<S: Scene + ?Sized>(
        &self,
        scene: &S,
        filter: &TagFilter,
    ) -> ShotkitResult<Vec<TagNode>> {
        let mut found = Vec::new();
        for node in scene.nodes_of_kind(NodeKind::Transform) {
            if let Some(tag) = self.find_tag_for_node(scene, node)? {
                if filter.matches(&tag) {
                    found.push((short_name(scene, node)?, tag));
                }
            }
        }
        found.sort_by(|(a, ta), (b, tb)| a.cmp(b).then(ta.node.cmp(&tb.node)));
        Ok(found.into_iter().map(|(_, tag)| tag).collect())
    }

    /// Catalogue entry of a tag, using the resolution policy.
    pub fn resolve_to_catalogue<S: Scene + ?Sized>(
        &self,
        scene: &S,
        tag: &TagNode,
        snapshot: &Snapshot,
        warnings: &mut Warnings,
    ) -> ShotkitResult<Option<Arc<CatalogueEntry>>> {
        self.resolve_with_policy(scene, tag, snapshot, self.resolution_policy, warnings)
    }

    /// Catalogue entry of a tag: the stored id when present, else the
    /// node's short name (then without trailing digits) across all kinds.
    pub fn resolve_with_policy<S: Scene + ?Sized>(
        &self,
        scene: &S,
        tag: &TagNode,
        snapshot: &Snapshot,
        policy: MissingEntryPolicy,
        warnings: &mut Warnings,
    ) -> ShotkitResult<Option<Arc<CatalogueEntry>>> {
        let short = short_name(scene, tag.node)?;
        let found = match &tag.record.catalogue_id {
            Some(id) => snapshot.find_entry(id),
            None => snapshot.find_by_name_any(&short).or_else(|| {
                let stripped = strip_trailing_digits(&short);
                if stripped.is_empty() || stripped == short {
                    None
                } else {
                    snapshot.find_by_name_any(stripped)
                }
            }),
        };

        if found.is_none() {
            let key = tag.record.catalogue_id.as_deref().unwrap_or(&short);
            match policy {
                MissingEntryPolicy::Warn => warnings.warn(
                    WarningCode::CatalogueEntryMissing,
                    short.clone(),
                    format!("no catalogue entry for '{key}'"),
                ),
                MissingEntryPolicy::Silent => {
                    tracing::debug!(node = %short, key, "No catalogue entry for tag");
                }
            }
        }
        Ok(found)
    }

    /// Tag records of `roots`, keyed by short name. Untagged roots are
    /// omitted; on colliding short names the first root wins.
    pub fn tag_dictionary<S: Scene + ?Sized>(
        &self,
        scene: &S,
        roots: &[NodeId],
    ) -> ShotkitResult<BTreeMap<String, TagRecord>> {
        let mut dictionary = BTreeMap::new();
        for root in roots {
            if let Some(tag) = self.find_tag_for_node(scene, *root)? {
                dictionary
                    .entry(short_name(scene, *root)?)
                    .or_insert(tag.record);
            }
        }
        Ok(dictionary)
    }
}

fn read_linked<S: Scene + ?Sized>(
    scene: &S,
    node: NodeId,
    tag_node: NodeId,
) -> ShotkitResult<TagNode> {
    let text = |attr: &str| -> ShotkitResult<Option<String>> {
        Ok(scene
            .attr(tag_node, attr)?
            .map(|v| v.to_string())
            .filter(|s| !s.is_empty()))
    };

    let hires_node = incoming(scene, tag_node, ATTR_HIRES)?.map(|c| c.src);
    let hires = match hires_node {
        Some(h) => Some(short_name(scene, h)?),
        None => None,
    };
    let shaders = match text(ATTR_SHADERS)? {
        Some(raw) => decode_shaders(&Value::String(raw))
            .map_err(|e| ShotkitError::invalid_tag(scene.name(tag_node).unwrap_or_default(), e.to_string()))?,
        None => Default::default(),
    };

    let mut extra = BTreeMap::new();
    for attr in scene.attr_names(tag_node)? {
        if is_reserved(&attr) {
            continue;
        }
        match scene.attr(tag_node, &attr)? {
            None | Some(AttrValue::Message) => {}
            Some(value) => {
                extra.insert(attr, value.to_string());
            }
        }
    }

    let record = TagRecord {
        catalogue_id: text(ATTR_ID)?,
        types: decode_types(&text(ATTR_TYPES)?.unwrap_or_default()),
        hires,
        shaders,
        extra,
    };
    Ok(TagNode {
        node,
        form: TagForm::Linked,
        tag_node: Some(tag_node),
        record,
        hires_node,
    })
}

fn read_embedded<S: Scene + ?Sized>(scene: &S, node: NodeId) -> ShotkitResult<Option<TagNode>> {
    let raw = match scene.attr(node, ATTR_TAG_INFO)? {
        Some(AttrValue::String(raw)) => raw,
        _ => return Ok(None),
    };
    let short = short_name(scene, node)?;
    let Some(record) = parse_embedded(&raw, &short)
        .map_err(|message| ShotkitError::invalid_tag(scene.name(node).unwrap_or_default(), message))?
    else {
        return Ok(None);
    };
    let hires_node = match record.hires.as_deref() {
        Some(name) => find_in_subtree(scene, node, name)?,
        None => None,
    };
    Ok(Some(TagNode {
        node,
        form: TagForm::Embedded,
        tag_node: None,
        record,
        hires_node,
    }))
}

/// Decode a `tag_info` string.
///
/// The value is either one record or a dictionary of records keyed by
/// short name; a dictionary is looked up by `short`, then by `short`
/// without trailing digits.
fn parse_embedded(raw: &str, short: &str) -> Result<Option<TagRecord>, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("tag_info is not JSON: {e}"))?;
    let Value::Object(map) = &value else {
        return Err("tag_info must be a JSON object".to_string());
    };

    let is_record = map.is_empty()
        || [KEY_ID, KEY_TYPES, KEY_HIRES, KEY_SHADERS]
            .iter()
            .any(|key| map.contains_key(*key))
        || !map.values().all(Value::is_object);
    if is_record {
        return TagRecord::try_from(value).map(Some).map_err(|e| e.to_string());
    }

    match map
        .get(short)
        .or_else(|| map.get(strip_trailing_digits(short)))
    {
        Some(entry) => TagRecord::try_from(entry.clone())
            .map(Some)
            .map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

fn find_in_subtree<S: Scene + ?Sized>(
    scene: &S,
    root: NodeId,
    short: &str,
) -> ShotkitResult<Option<NodeId>> {
    let wanted = strip_namespace(short);
    for node in subtree(scene, root)? {
        if short_name(scene, node)? == wanted {
            return Ok(Some(node));
        }
    }
    Ok(None)
}
