//! Canonical layout tree node.
//!
//! # Responsibility
//! - Define the typed node used by decode output and encode input.
//! - Define persisted override records and their merge rule.
//!
//! # Invariants
//! - `children` is `Some` only for structural nodes that declared content.
//! - `attributes.size` is never stored as the default `100` by the codec.
//! - Override fields win over computed fields only where they are present.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Insertion-ordered attribute map.
pub type Attributes = Map<String, Value>;

/// Attribute holding the percentage width of a node.
pub const SIZE_ATTRIBUTE: &str = "size";
/// Attribute holding the enabled flag of a leaf node.
pub const ENABLED_ATTRIBUTE: &str = "enabled";
/// Attribute holding the composite key of a position leaf.
pub const KEY_ATTRIBUTE: &str = "key";
/// Size implied when no size is declared.
pub const DEFAULT_SIZE: f64 = 100.0;

/// Node type vocabulary.
///
/// Unknown names are preserved in `Other` so that foreign overrides survive
/// a decode/encode cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Atoms,
    Wrapper,
    Container,
    Section,
    Grid,
    Block,
    Offcanvas,
    Particle,
    Atom,
    Position,
    System,
    /// Presentation form of `system-content` and `system-messages` leaves.
    Pagecontent,
    Other(String),
}

impl NodeType {
    /// Matches a structural section name, case-sensitively.
    pub fn structural(name: &str) -> Option<Self> {
        match name {
            "atoms" => Some(Self::Atoms),
            "wrapper" => Some(Self::Wrapper),
            "container" => Some(Self::Container),
            "section" => Some(Self::Section),
            "grid" => Some(Self::Grid),
            "block" => Some(Self::Block),
            "offcanvas" => Some(Self::Offcanvas),
            _ => None,
        }
    }

    /// Matches the leading type segment of a leaf token, case-sensitively.
    pub fn leaf(name: &str) -> Option<Self> {
        match name {
            "system" => Some(Self::System),
            "position" => Some(Self::Position),
            "particle" => Some(Self::Particle),
            "atom" => Some(Self::Atom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Atoms => "atoms",
            Self::Wrapper => "wrapper",
            Self::Container => "container",
            Self::Section => "section",
            Self::Grid => "grid",
            Self::Block => "block",
            Self::Offcanvas => "offcanvas",
            Self::Particle => "particle",
            Self::Atom => "atom",
            Self::Position => "position",
            Self::System => "system",
            Self::Pagecontent => "pagecontent",
            Self::Other(name) => name.as_str(),
        }
    }

    /// Returns whether nodes of this type participate in layout nesting.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Atoms
                | Self::Wrapper
                | Self::Container
                | Self::Section
                | Self::Grid
                | Self::Block
                | Self::Offcanvas
        )
    }

    /// Returns whether this is one of the two row/column slot types.
    pub fn is_slot(&self) -> bool {
        matches!(self, Self::Grid | Self::Block)
    }
}

impl From<&str> for NodeType {
    fn from(value: &str) -> Self {
        if let Some(kind) = Self::structural(value).or_else(|| Self::leaf(value)) {
            return kind;
        }
        match value {
            "pagecontent" => Self::Pagecontent,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of the canonical layout tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique within one decode/encode session. May be empty on encode input.
    #[serde(default)]
    pub id: String,
    /// Serialized as `type` to match the stored tree schema.
    #[serde(rename = "type")]
    pub kind: NodeType,
    /// Written as `false` when absent.
    #[serde(default, with = "subtype_flag")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_attributes")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Node>>,
    /// Marks structural (layout-participating) nodes.
    #[serde(default, skip_serializing_if = "is_false")]
    pub layout: bool,
}

impl Node {
    /// Creates a structural node with no subtype, title or children.
    pub fn structural(id: impl Into<String>, kind: NodeType) -> Self {
        Self {
            id: id.into(),
            kind,
            subtype: None,
            title: None,
            attributes: Attributes::new(),
            children: None,
            layout: true,
        }
    }

    /// Creates a leaf node with the given title.
    pub fn leaf(id: impl Into<String>, kind: NodeType, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            subtype: None,
            title: Some(title.into()),
            attributes: Attributes::new(),
            children: None,
            layout: false,
        }
    }

    /// Builder-style child list replacement.
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = Some(children);
        self
    }

    /// Returns child nodes, empty for leaves.
    pub fn children(&self) -> &[Node] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Returns the numeric `size` attribute, if any.
    pub fn size(&self) -> Option<f64> {
        self.attributes
            .get(SIZE_ATTRIBUTE)
            .and_then(crate::grammar::size_of)
    }

    /// Visits this node and all descendants in document order.
    pub fn visit<'a>(&'a self, visitor: &mut impl FnMut(&'a Node)) {
        visitor(self);
        for child in self.children() {
            child.visit(visitor);
        }
    }
}

/// Persisted non-default fields for one node.
///
/// Stored in the `structure` table (keyed by structural id) and the
/// `content` table (keyed by leaf token).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

impl NodeOverride {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.kind.is_none()
            && self.subtype.is_none()
            && self.title.is_none()
            && self.attributes.is_none()
    }

    /// Layers `computed` under this override.
    ///
    /// Present override fields win; absent ones fall back to `computed`.
    /// Children and the layout flag always come from `computed`.
    pub fn merge_under(&self, computed: Node) -> Node {
        let Node {
            id,
            kind,
            subtype,
            title,
            attributes,
            children,
            layout,
        } = computed;
        Node {
            id: self.id.clone().unwrap_or(id),
            kind: self.kind.clone().unwrap_or(kind),
            subtype: self.subtype.clone().or(subtype),
            title: self.title.clone().or(title),
            attributes: self.attributes.clone().unwrap_or(attributes),
            children,
            layout,
        }
    }

    /// Reads an override record leniently.
    ///
    /// Returns `None` when `value` is not a mapping; fields of unexpected
    /// shape are ignored instead of failing the whole record.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            id: object.get("id").and_then(scalar_string),
            kind: object
                .get("type")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .map(NodeType::from),
            subtype: object.get("subtype").and_then(subtype_from_value),
            title: object.get("title").and_then(scalar_string),
            attributes: object.get("attributes").and_then(attributes_from_value),
        })
    }
}

impl<'de> Deserialize<'de> for NodeOverride {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value).unwrap_or_default())
    }
}

/// PHP-style truthiness used by the stored format (`0`, `""`, `"0"`, empty
/// collections and `null` are false).
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty() && text != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn subtype_from_value(value: &Value) -> Option<String> {
    scalar_string(value).filter(|text| !text.is_empty())
}

fn attributes_from_value(value: &Value) -> Option<Attributes> {
    match value {
        Value::Object(map) => Some(map.clone()),
        // Empty sequences are how empty maps come back from some writers.
        Value::Array(items) if items.is_empty() => Some(Attributes::new()),
        _ => None,
    }
}

fn lenient_attributes<'de, D>(deserializer: D) -> Result<Attributes, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(attributes_from_value(&value).unwrap_or_default())
}

mod subtype_flag {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(subtype) => serializer.serialize_str(subtype),
            None => serializer.serialize_bool(false),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(super::subtype_from_value(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::{is_truthy, Node, NodeOverride, NodeType, SIZE_ATTRIBUTE};
    use serde_json::json;

    #[test]
    fn node_type_keeps_unknown_names() {
        let kind = NodeType::from("spacer");
        assert_eq!(kind, NodeType::Other("spacer".to_string()));
        assert_eq!(String::from(kind), "spacer");
        assert_eq!(NodeType::from("pagecontent"), NodeType::Pagecontent);
        assert!(NodeType::Grid.is_slot());
        assert!(!NodeType::Particle.is_structural());
    }

    #[test]
    fn absent_subtype_serializes_as_false() {
        let node = Node::structural("grid-1", NodeType::Grid);
        let value = serde_json::to_value(&node).expect("value should serialize");
        assert_eq!(value["subtype"], json!(false));
        assert_eq!(value["type"], json!("grid"));
        assert_eq!(value["layout"], json!(true));
        assert!(value.get("children").is_none());

        let decoded: Node = serde_json::from_value(value).expect("value should deserialize");
        assert_eq!(decoded, node);
    }

    #[test]
    fn merge_prefers_present_override_fields() {
        let mut computed = Node::structural("header", NodeType::Section);
        computed.subtype = Some("header".to_string());
        computed.title = Some("Header".to_string());

        let overrides = NodeOverride {
            title: Some("Top Bar".to_string()),
            ..NodeOverride::default()
        };
        let merged = overrides.merge_under(computed);
        assert_eq!(merged.title.as_deref(), Some("Top Bar"));
        assert_eq!(merged.subtype.as_deref(), Some("header"));
        assert_eq!(merged.id, "header");
        assert!(merged.layout);
    }

    #[test]
    fn override_reader_ignores_malformed_fields() {
        let record = NodeOverride::from_value(&json!({
            "title": ["not", "a", "string"],
            "subtype": false,
            "attributes": {"class": "wide"},
            "type": "block"
        }))
        .expect("value should deserialize");
        assert_eq!(record.title, None);
        assert_eq!(record.subtype, None);
        assert_eq!(record.kind, Some(NodeType::Block));
        assert_eq!(record.attributes.expect("attributes should be kept")["class"], json!("wide"));

        assert!(NodeOverride::from_value(&json!("title")).is_none());
    }

    #[test]
    fn truthiness_follows_stored_format_rules() {
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
    }

    #[test]
    fn size_reads_numeric_and_string_values() {
        let mut node = Node::structural("block-1", NodeType::Block);
        node.attributes.insert(SIZE_ATTRIBUTE.to_string(), json!(30));
        assert_eq!(node.size(), Some(30.0));
        node.attributes.insert(SIZE_ATTRIBUTE.to_string(), json!("33.5"));
        assert_eq!(node.size(), Some(33.5));
    }
}
