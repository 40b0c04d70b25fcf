//! Compact fragment to canonical node expansion.
//!
//! # Responsibility
//! - Expand structural fields into `grid`/`block`/section nodes, recursively.
//! - Resolve leaf tokens into leaf nodes with scope-dependent wrapping.
//! - Layer stored overrides under the computed fields.
//!
//! # Invariants
//! - Anonymous slots alternate `grid` (scope 0) and `block` (scope 1).
//! - A named `grid` forces scope 1 for its children, a named `block` scope 0.
//! - A trailing size on a structural field is returned to the caller, which
//!   stores it on the parent. It never stays on the field's own node.
//!
//! # See also
//! - `codec::builder` for the inverse direction.

use crate::codec::ids::IdAssigner;
use crate::codec::overrides::OverrideStore;
use crate::grammar::{is_token, size_value, LeafToken, SectionField};
use crate::model::fragment::{FieldKey, Fragment, Slot};
use crate::model::node::{
    is_truthy, Node, NodeType, ENABLED_ATTRIBUTE, KEY_ATTRIBUTE, SIZE_ATTRIBUTE,
};
use log::trace;
use serde_json::Value;

/// Node produced for one compact entry plus the size it hands to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub node: Node,
    /// Trailing size of a structural field, for the enclosing node.
    pub size: Option<f64>,
}

/// Returns the type an anonymous slot takes at `scope`.
pub fn scope_kind(scope: u8) -> NodeType {
    if scope % 2 == 0 {
        NodeType::Grid
    } else {
        NodeType::Block
    }
}

/// Returns the scope children of a `kind` node are read at.
pub fn child_scope(kind: &NodeType, scope: u8) -> u8 {
    match kind {
        NodeType::Grid => 1,
        NodeType::Block => 0,
        _ => scope,
    }
}

/// Recursive fragment reader for one decode session.
pub struct Parser<'a, S: OverrideStore + ?Sized> {
    ids: &'a mut IdAssigner,
    overrides: &'a S,
}

impl<'a, S: OverrideStore + ?Sized> Parser<'a, S> {
    pub fn new(ids: &'a mut IdAssigner, overrides: &'a S) -> Self {
        Self { ids, overrides }
    }

    /// Expands one structural entry and its content.
    pub fn parse(&mut self, key: &FieldKey, content: &Fragment, scope: u8) -> Parsed {
        let (mut node, size, inner_scope) = match key.as_named() {
            None => {
                let kind = scope_kind(scope);
                let id = self.ids.next(&kind, None, None);
                (Node::structural(id, kind), None, (scope + 1) % 2)
            }
            Some(field) => {
                let field = SectionField::parse(field);
                let inner_scope = child_scope(&field.kind, scope);
                let node = self.named_section(&field);
                (node, field.size, inner_scope)
            }
        };

        if !content.is_empty() {
            let mut children = Vec::with_capacity(content.len());
            for (child_key, slot) in content.iter() {
                let child = match slot {
                    Slot::Branch(fragment) => self.parse(child_key, fragment, inner_scope),
                    Slot::Token(token) if is_token(token) => self.resolve(token, inner_scope),
                    Slot::Token(_) | Slot::Empty => {
                        self.parse(child_key, &Fragment::new(), inner_scope)
                    }
                };
                if let Some(size) = child.size {
                    node.attributes
                        .insert(SIZE_ATTRIBUTE.to_string(), size_value(size));
                }
                children.push(child.node);
            }
            node.children = Some(children);
        }

        trace!(
            "event=section_parse module=codec status=ok id={} type={} scope={}",
            node.id,
            node.kind,
            scope
        );
        Parsed { node, size }
    }

    fn named_section(&mut self, field: &SectionField<'_>) -> Node {
        let record = self.overrides.structure(field.section_id);
        // A stored id another node already took falls back to the field name.
        let id = match record.and_then(|record| record.id.as_deref()) {
            Some(id) if self.ids.claim(id) => id.to_string(),
            _ if self.ids.claim(field.section_id) => field.section_id.to_string(),
            _ => self.ids.next(&field.kind, None, None),
        };

        let mut computed = Node::structural(id.clone(), field.kind.clone());
        computed.subtype = field.subtype.clone();
        computed.title = Some(field.title.clone());
        let mut node = match record {
            Some(record) => record.merge_under(computed),
            None => computed,
        };
        node.id = id;
        node
    }

    /// Resolves a leaf token, wrapping it in `block` (scope <= 1) and
    /// `grid` (scope 0) nodes.
    pub fn resolve(&mut self, raw: &str, scope: u8) -> Parsed {
        let leaf = LeafToken::parse(raw);
        let record = self.overrides.content(leaf.token);

        let id = match record.and_then(|record| record.id.as_deref()) {
            Some(id) if self.ids.claim(id) => id.to_string(),
            _ => self.ids.next(
                &leaf.kind,
                leaf.subtype.as_deref(),
                leaf.explicit_id.as_deref(),
            ),
        };

        let mut computed = Node::leaf(id.clone(), leaf.kind.clone(), leaf.title.clone());
        computed.subtype = leaf.subtype.clone();
        let mut node = match record {
            Some(record) => record.merge_under(computed),
            None => computed,
        };
        node.id = id;

        if !node.attributes.contains_key(ENABLED_ATTRIBUTE) {
            node.attributes
                .insert(ENABLED_ATTRIBUTE.to_string(), Value::from(1));
        }
        if let Some(key) = leaf.key.as_deref().filter(|_| node.kind == NodeType::Position) {
            node.attributes
                .insert(KEY_ATTRIBUTE.to_string(), Value::from(key));
        }
        trace!(
            "event=leaf_resolve module=codec status=ok id={} type={} enabled={}",
            node.id,
            node.kind,
            node.attributes
                .get(ENABLED_ATTRIBUTE)
                .map(is_truthy)
                .unwrap_or(true)
        );

        if scope > 1 {
            if let Some(size) = leaf.size {
                node.attributes
                    .insert(SIZE_ATTRIBUTE.to_string(), size_value(size));
            }
            return Parsed { node, size: None };
        }

        let block_id = self.ids.next(&NodeType::Block, None, None);
        let mut wrapped = Node::structural(block_id, NodeType::Block).with_children(vec![node]);
        if let Some(size) = leaf.size {
            wrapped
                .attributes
                .insert(SIZE_ATTRIBUTE.to_string(), size_value(size));
        }
        if scope == 0 {
            let grid_id = self.ids.next(&NodeType::Grid, None, None);
            wrapped = Node::structural(grid_id, NodeType::Grid).with_children(vec![wrapped]);
        }
        Parsed {
            node: wrapped,
            size: None,
        }
    }
}
