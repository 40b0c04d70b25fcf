//! Stored document envelope and decode result.
//!
//! # Responsibility
//! - Read and write the versioned envelope in YAML or JSON.
//! - Reject inputs that are not mappings or declare a foreign version.
//!
//! # Invariants
//! - Malformed `atoms`, `structure` and `content` entries degrade to empty.
//! - `structure` and `content` serialize in key order.

use crate::error::{LayoutError, LayoutResult};
use crate::model::fragment::Fragment;
use crate::model::node::{Node, NodeOverride};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Envelope version written and read by this codec.
pub const FORMAT_VERSION: u64 = 2;

/// Override table keyed by structural id or leaf token.
pub type OverrideTable = BTreeMap<String, NodeOverride>;

/// Versioned stored form of a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    #[serde(default = "default_version", deserialize_with = "lenient_version")]
    pub version: u64,
    /// Opaque styling block passed through unchanged.
    #[serde(default)]
    pub preset: Value,
    #[serde(default)]
    pub layout: Fragment,
    #[serde(default, deserialize_with = "lenient_atoms")]
    pub atoms: Vec<String>,
    #[serde(default, deserialize_with = "lenient_table")]
    pub structure: OverrideTable,
    #[serde(default, deserialize_with = "lenient_table")]
    pub content: OverrideTable,
}

impl Default for LayoutDocument {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            preset: Value::Null,
            layout: Fragment::new(),
            atoms: Vec::new(),
            structure: OverrideTable::new(),
            content: OverrideTable::new(),
        }
    }
}

impl LayoutDocument {
    /// Parses a YAML envelope.
    ///
    /// # Errors
    /// - `Yaml` when the text is not YAML.
    /// - `InvalidDocumentShape` when the top level is not a mapping.
    /// - `UnsupportedVersion` when `version` is present and not 2.
    pub fn from_yaml_str(text: &str) -> LayoutResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        if !value.is_mapping() {
            return Err(LayoutError::InvalidDocumentShape {
                found: yaml_kind(&value),
            });
        }
        let document: Self = serde_yaml::from_value(value)?;
        document.ensure_supported()
    }

    /// Parses a JSON envelope. Same error contract as [`Self::from_yaml_str`].
    pub fn from_json_str(text: &str) -> LayoutResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json_value(value)
    }

    /// Reads an already-parsed JSON value as an envelope.
    pub fn from_json_value(value: Value) -> LayoutResult<Self> {
        if !value.is_object() {
            return Err(LayoutError::InvalidDocumentShape {
                found: json_kind(&value),
            });
        }
        let document: Self = serde_json::from_value(value)?;
        document.ensure_supported()
    }

    pub fn to_yaml_string(&self) -> LayoutResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json_string_pretty(&self) -> LayoutResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn ensure_supported(self) -> LayoutResult<Self> {
        if self.version != FORMAT_VERSION {
            return Err(LayoutError::UnsupportedVersion {
                found: self.version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(self)
    }
}

/// Canonical tree produced by decode and consumed by encode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedLayout {
    #[serde(default)]
    pub preset: Value,
    /// Top-level sections in layout order.
    #[serde(default)]
    pub children: Vec<Node>,
}

impl DecodedLayout {
    /// Reads a JSON tree, rejecting non-mapping input.
    pub fn from_json_str(text: &str) -> LayoutResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(LayoutError::InvalidDocumentShape {
                found: json_kind(&value),
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Reads a YAML tree, rejecting non-mapping input.
    pub fn from_yaml_str(text: &str) -> LayoutResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        if !value.is_mapping() {
            return Err(LayoutError::InvalidDocumentShape {
                found: yaml_kind(&value),
            });
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Finds the first node with `id` in document order.
    pub fn find(&self, id: &str) -> Option<&Node> {
        let mut found = None;
        for child in &self.children {
            child.visit(&mut |node| {
                if found.is_none() && node.id == id {
                    found = Some(node);
                }
            });
        }
        found
    }

    /// Returns every node id in document order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        for child in &self.children {
            child.visit(&mut |node| ids.push(node.id.as_str()));
        }
        ids
    }

    pub fn node_count(&self) -> usize {
        self.ids().len()
    }
}

fn default_version() -> u64 {
    FORMAT_VERSION
}

fn lenient_version<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => FORMAT_VERSION,
        Value::Number(number) => number.as_u64().unwrap_or_default(),
        Value::String(text) => text.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

fn lenient_atoms<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(text) if !text.is_empty() => Some(text),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .collect())
}

fn lenient_table<'de, D>(deserializer: D) -> Result<OverrideTable, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(entries) = value else {
        return Ok(OverrideTable::new());
    };
    Ok(entries
        .iter()
        .filter_map(|(key, entry)| {
            NodeOverride::from_value(entry).map(|record| (key.clone(), record))
        })
        .collect())
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::{LayoutDocument, FORMAT_VERSION};
    use crate::error::LayoutError;
    use serde_json::json;

    #[test]
    fn rejects_non_mapping_documents() {
        let err = LayoutDocument::from_yaml_str("- header\n- footer\n").unwrap_err();
        assert!(matches!(
            err,
            LayoutError::InvalidDocumentShape { found: "sequence" }
        ));

        let err = LayoutDocument::from_json_value(json!("layout")).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::InvalidDocumentShape { found: "string" }
        ));
    }

    #[test]
    fn rejects_foreign_versions() {
        let err = LayoutDocument::from_yaml_str("version: 1\nlayout: {}\n").unwrap_err();
        assert!(matches!(
            err,
            LayoutError::UnsupportedVersion {
                found: 1,
                supported: FORMAT_VERSION
            }
        ));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let document = LayoutDocument::from_yaml_str("layout:\n  header: ~\n")
            .expect("document yaml should parse");
        assert_eq!(document.version, FORMAT_VERSION);
        assert!(document.atoms.is_empty());
        assert!(document.structure.is_empty());
        assert_eq!(document.preset, serde_json::Value::Null);
    }

    #[test]
    fn malformed_side_tables_degrade_to_empty() {
        let document = LayoutDocument::from_json_value(json!({
            "version": "2",
            "layout": {"header": null},
            "atoms": "atom-analytics",
            "structure": ["not", "a", "map"],
            "content": {"logo-1": "bad", "menu-1": {"title": "Main Menu"}}
        }))
        .expect("value should deserialize");

        assert!(document.atoms.is_empty());
        assert!(document.structure.is_empty());
        assert_eq!(document.content.len(), 1);
        assert_eq!(
            document.content["menu-1"].title.as_deref(),
            Some("Main Menu")
        );
    }
}
