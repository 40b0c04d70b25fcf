//! Encode entry point.
//!
//! # Responsibility
//! - Reduce a canonical tree to the version-2 envelope.
//!
//! # Invariants
//! - Each call owns a fresh `IdAssigner` and fresh side tables.
//! - Ids already present in the tree are never minted for other nodes.

use crate::codec::builder::TreeBuilder;
use crate::codec::ids::IdAssigner;
use crate::model::document::{DecodedLayout, LayoutDocument, FORMAT_VERSION};
use crate::model::node::Node;
use log::debug;
use serde_json::Value;

/// Encodes `children` with `preset` into a stored document.
pub fn encode(preset: &Value, children: &[Node]) -> LayoutDocument {
    let mut ids = IdAssigner::new();
    for child in children {
        child.visit(&mut |node| {
            if !node.id.is_empty() {
                ids.reserve(node.id.as_str());
            }
        });
    }

    let mut builder = TreeBuilder::new(&mut ids);
    let layout = builder.build(children);
    let tables = builder.finish();

    debug!(
        "event=layout_encode module=codec status=ok sections={} atoms={} structure={} content={}",
        layout.len(),
        tables.atoms.len(),
        tables.structure.len(),
        tables.content.len()
    );
    LayoutDocument {
        version: FORMAT_VERSION,
        preset: preset.clone(),
        layout,
        atoms: tables.atoms,
        structure: tables.structure,
        content: tables.content,
    }
}

/// Encodes a decoded layout, keeping its preset.
pub fn encode_layout(decoded: &DecodedLayout) -> LayoutDocument {
    encode(&decoded.preset, &decoded.children)
}

#[cfg(test)]
mod tests {
    use super::encode;
    use crate::model::node::{Node, NodeType};
    use serde_json::json;

    #[test]
    fn envelope_has_version_and_preset() {
        let preset = json!({"name": "default"});
        let document = encode(&preset, &[]);
        assert_eq!(document.version, 2);
        assert_eq!(document.preset, preset);
        assert!(document.layout.is_empty());
        assert!(document.atoms.is_empty());
    }

    #[test]
    fn grid_and_block_ids_stay_out_of_structure() {
        let mut leaf = Node::leaf("contact-1", NodeType::Particle, "Contact");
        leaf.subtype = Some("contact".to_string());
        let tree = Node::structural("section-main", NodeType::Section).with_children(vec![
            Node::structural("grid-1", NodeType::Grid).with_children(vec![
                Node::structural("block-1", NodeType::Block).with_children(vec![leaf]),
            ]),
        ]);

        let document = encode(&json!({}), &[tree]);
        assert!(!document.structure.contains_key("grid-1"));
        assert!(!document.structure.contains_key("block-1"));
        let yaml = document.to_yaml_string().expect("document should serialize");
        assert!(yaml.contains("- contact-1"));
    }

    #[test]
    fn nodes_without_ids_get_fresh_ones() {
        let mut leaf = Node::leaf("", NodeType::Particle, "Logo");
        leaf.subtype = Some("logo".to_string());
        let mut section = Node::structural("", NodeType::Container);
        section.title = Some("Body".to_string());
        let section = section.with_children(vec![Node::structural("", NodeType::Grid)
            .with_children(vec![Node::structural("", NodeType::Block).with_children(vec![leaf])])]);

        let document = encode(&json!(null), &[section]);
        let json = serde_json::to_value(&document.layout).expect("value should serialize");
        assert_eq!(json, json!({"container-1": ["logo-1"]}));
        assert_eq!(
            document.structure["container-1"].title.as_deref(),
            Some("Body")
        );
    }
}
