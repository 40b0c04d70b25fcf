//! Decode entry point.
//!
//! # Responsibility
//! - Normalize the atom list and mirror it into the layout's `atoms` field.
//! - Reserve every id the input spells out before any id is minted.
//! - Expand each top-level field at scope 0.
//!
//! # Invariants
//! - Each call owns a fresh `IdAssigner`.
//! - Top-level fields whose value is not a mapping decode as childless.
//! - Trailing sizes on top-level fields are dropped.

use crate::codec::ids::IdAssigner;
use crate::codec::overrides::OverrideStore;
use crate::codec::parser::Parser;
use crate::grammar::{is_token, normalize_atom_id, LeafToken, SectionField};
use crate::model::document::{DecodedLayout, LayoutDocument};
use crate::model::fragment::{Fragment, Slot};
use log::debug;

const ATOMS_FIELD: &str = "atoms";

/// Decodes a document using its own `structure` and `content` tables.
pub fn decode(document: &LayoutDocument) -> DecodedLayout {
    decode_with(document, document)
}

/// Decodes a document, reading overrides from `overrides`.
pub fn decode_with<S: OverrideStore + ?Sized>(
    document: &LayoutDocument,
    overrides: &S,
) -> DecodedLayout {
    let atoms: Vec<String> = document
        .atoms
        .iter()
        .map(|atom| normalize_atom_id(atom))
        .collect();
    let atom_count = atoms.len();

    let mut layout = document.layout.clone();
    layout.insert(ATOMS_FIELD, Slot::Branch(Fragment::from_tokens(atoms)));

    let mut ids = IdAssigner::new();
    reserve_explicit(&layout, overrides, &mut ids);

    let empty = Fragment::new();
    let mut parser = Parser::new(&mut ids, overrides);
    let children: Vec<_> = layout
        .iter()
        .map(|(key, slot)| {
            let content = match slot {
                Slot::Branch(fragment) => fragment,
                Slot::Token(_) | Slot::Empty => &empty,
            };
            parser.parse(key, content, 0).node
        })
        .collect();

    let decoded = DecodedLayout {
        preset: document.preset.clone(),
        children,
    };
    debug!(
        "event=layout_decode module=codec status=ok sections={} nodes={} atoms={}",
        decoded.children.len(),
        decoded.node_count(),
        atom_count
    );
    decoded
}

fn reserve_explicit<S: OverrideStore + ?Sized>(
    fragment: &Fragment,
    overrides: &S,
    ids: &mut IdAssigner,
) {
    for (key, slot) in fragment.iter() {
        if let Some(field) = key.as_named() {
            let field = SectionField::parse(field);
            ids.reserve(field.section_id);
            if let Some(id) = overrides
                .structure(field.section_id)
                .and_then(|record| record.id.as_deref())
            {
                ids.reserve(id);
            }
        }

        match slot {
            Slot::Branch(child) => reserve_explicit(child, overrides, ids),
            Slot::Token(token) if is_token(token) => {
                let leaf = LeafToken::parse(token);
                if let Some(explicit) = leaf.explicit_id.as_deref() {
                    ids.reserve(IdAssigner::compose(
                        &leaf.kind,
                        leaf.subtype.as_deref(),
                        explicit,
                    ));
                }
                if let Some(id) = overrides
                    .content(leaf.token)
                    .and_then(|record| record.id.as_deref())
                {
                    ids.reserve(id);
                }
            }
            Slot::Token(_) | Slot::Empty => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::decode;
    use crate::model::document::LayoutDocument;
    use crate::model::node::NodeType;
    use serde_json::json;

    #[test]
    fn atoms_are_prefixed_and_placed_in_layout_order() {
        let document = LayoutDocument::from_yaml_str(
            r#"
version: 2
layout:
  header: [[logo]]
  atoms: ~
  footer: ~
atoms: [analytics, atom-frameworks]
"#,
        )
        .expect("yaml should parse");

        let decoded = decode(&document);
        let ids: Vec<_> = decoded.children.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(ids, ["header", "atoms", "footer"]);

        let atoms = &decoded.children[1];
        assert_eq!(atoms.kind, NodeType::Atoms);
        let leaves: Vec<_> = atoms
            .children()
            .iter()
            .map(|grid| &grid.children()[0].children()[0])
            .collect();
        assert_eq!(leaves[0].kind, NodeType::Atom);
        assert_eq!(leaves[0].id, "analytics-1");
        assert_eq!(leaves[1].id, "frameworks-1");
    }

    #[test]
    fn missing_atoms_field_is_appended() {
        let document = LayoutDocument::from_yaml_str("layout:\n  header: ~\n")
            .expect("document yaml should parse");
        let decoded = decode(&document);
        assert_eq!(decoded.children.len(), 2);
        assert_eq!(decoded.children[1].id, "atoms");
        assert!(decoded.children[1].children.is_none());
    }

    #[test]
    fn scalar_top_level_values_decode_as_childless_sections() {
        let document =
            LayoutDocument::from_yaml_str("layout:\n  \"section-hero 30\": hero-text\n")
                .expect("document yaml should parse");
        let decoded = decode(&document);
        let hero = &decoded.children[0];
        assert_eq!(hero.id, "section-hero");
        assert_eq!(hero.title.as_deref(), Some("Hero"));
        assert!(hero.children.is_none());
        assert!(hero.attributes.get("size").is_none());
    }

    #[test]
    fn minted_ids_avoid_explicit_ones() {
        let document = LayoutDocument::from_yaml_str(
            r#"
layout:
  header: [[logo, logo-1]]
"#,
        )
        .expect("yaml should parse");
        let decoded = decode(&document);
        let mut ids = decoded.ids();
        assert!(ids.contains(&"logo-1"));
        assert!(ids.contains(&"logo-2"));
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn preset_passes_through() {
        let document = LayoutDocument::from_json_value(json!({
            "preset": {"name": "default", "image": "gantry-admin://images/layouts/default.png"},
            "layout": {}
        }))
        .expect("value should deserialize");
        let decoded = decode(&document);
        assert_eq!(decoded.preset["name"], json!("default"));
    }
}
