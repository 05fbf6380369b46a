//! Attribute names of the tag schema.

/// Discriminator on a TagNode, holding the project's tag type.
pub const ATTR_TAG_TYPE: &str = "tag_type";

/// Message plug on a TagNode fed by its owning transform.
pub const ATTR_NODE: &str = "node";

/// Catalogue entry id.
pub const ATTR_ID: &str = "id";

/// Whitespace-separated type flags.
pub const ATTR_TYPES: &str = "types";

/// Message plug on a TagNode fed by the hires group.
pub const ATTR_HIRES: &str = "hires";

/// Serialized shader map.
pub const ATTR_SHADERS: &str = "shaders";

/// Message plug on a tagged transform feeding its TagNode.
pub const ATTR_TAG_DATA: &str = "tag_data";

/// Embedded tag record on imported transforms.
pub const ATTR_TAG_INFO: &str = "tag_info";

/// Generic source plug used for hires and shading-group links.
pub const ATTR_MESSAGE: &str = "message";

/// Suffix of TagNode names (`char_A` -> `char_A_tag`).
pub const TAG_NODE_SUFFIX: &str = "_tag";

/// Attributes of a TagNode that are not free-form extras.
pub const RESERVED: [&str; 6] = [
    ATTR_TAG_TYPE,
    ATTR_NODE,
    ATTR_ID,
    ATTR_TYPES,
    ATTR_HIRES,
    ATTR_SHADERS,
];

pub fn is_reserved(attr: &str) -> bool {
    RESERVED.contains(&attr)
}
