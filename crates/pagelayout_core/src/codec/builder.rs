//! Canonical tree to compact fragment reduction.
//!
//! # Responsibility
//! - Emit the compact nested map for a list of nodes.
//! - Record fields the token grammar cannot express into `structure` and
//!   `content`, and collect atoms into their own list.
//!
//! # Invariants
//! - Tracks the same scope parity as `codec::parser`, so an emitted entry
//!   decodes back to the node type it came from.
//! - A `grid`/`block` loses its id only when it carries nothing but identity
//!   and is the type an anonymous slot at its scope decodes to.
//! - Single-child wrappers collapse into a leaf token only, never into a
//!   nested fragment.
//! - Residuals are computed against the defaults the grammar derives from the
//!   emitted key or token.

use crate::codec::ids::IdAssigner;
use crate::codec::overrides::SideTables;
use crate::codec::parser::{child_scope, scope_kind};
use crate::grammar::{
    format_size, is_numeric_key, is_token, normalize_atom_id, LeafToken, SectionField,
};
use crate::model::fragment::{Fragment, Slot};
use crate::model::node::{
    is_truthy, Attributes, Node, NodeOverride, NodeType, DEFAULT_SIZE, ENABLED_ATTRIBUTE,
    KEY_ATTRIBUTE, SIZE_ATTRIBUTE,
};
use log::trace;
use std::collections::HashSet;

const PLACEHOLDER_TITLE: &str = "Untitled";
const ATOMS_FIELD: &str = "atoms";

/// How an emitted entry was produced; decides whether its parent may collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Leaf,
    CollapsedBlock,
    CollapsedGrid,
    Branch,
}

#[derive(Debug)]
struct Entry {
    /// `None` for positional entries.
    name: Option<String>,
    slot: Slot,
    origin: Origin,
}

#[derive(Debug, Default)]
struct Built {
    entries: Vec<Entry>,
    /// Parent size was appended to at least one named child key.
    size_carried: bool,
}

impl Built {
    fn into_fragment(self) -> Fragment {
        let mut fragment = Fragment::new();
        for entry in self.entries {
            match entry.name {
                Some(name) => fragment.insert(name, entry.slot),
                None => fragment.push(entry.slot),
            }
        }
        fragment
    }

    fn single_positional(&self) -> Option<&Entry> {
        match self.entries.as_slice() {
            [entry] if entry.name.is_none() => Some(entry),
            _ => None,
        }
    }
}

/// Recursive reducer for one encode session.
pub struct TreeBuilder<'a> {
    ids: &'a mut IdAssigner,
    tables: SideTables,
    /// Leaf tokens already written, in document order.
    emitted: HashSet<String>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(ids: &'a mut IdAssigner) -> Self {
        Self {
            ids,
            tables: SideTables::default(),
            emitted: HashSet::new(),
        }
    }

    /// Emits the top-level layout for `children`.
    ///
    /// Top-level nodes never collapse, since a bare token at the root has no
    /// structural field to decode into.
    pub fn build(&mut self, children: &[Node]) -> Fragment {
        self.build_children(children, 0, None, true).into_fragment()
    }

    /// Hands out the side tables collected so far.
    pub fn finish(self) -> SideTables {
        self.tables
    }

    fn build_children(
        &mut self,
        children: &[Node],
        scope: u8,
        parent_size: Option<f64>,
        top_level: bool,
    ) -> Built {
        let mut built = Built::default();
        for child in children {
            let entry = match child.kind {
                NodeType::Atom => {
                    self.record_atom(child);
                    None
                }
                ref kind if kind.is_structural() => {
                    self.build_section(child, scope, parent_size, top_level)
                }
                _ => Some(self.build_leaf(child)),
            };
            if let Some(entry) = entry {
                if entry.name.is_some() && parent_size.is_some() {
                    built.size_carried = true;
                }
                built.entries.push(entry);
            }
        }
        built
    }

    fn record_atom(&mut self, node: &Node) {
        let id = if node.id.is_empty() {
            self.ids.next(&node.kind, node.subtype.as_deref(), None)
        } else {
            node.id.clone()
        };
        let token = normalize_atom_id(&id);
        self.record_content(node, &token);
        self.tables.atoms.push(token);
    }

    /// Stores the residual of the first leaf written as `token`.
    ///
    /// Decode applies a `content` record to every occurrence of its token and
    /// hands a stored id only to the first one; later occurrences get a
    /// freshly minted id, so they write nothing here.
    fn record_content(&mut self, node: &Node, token: &str) {
        if !self.emitted.insert(token.to_string()) {
            return;
        }
        let residual = self.leaf_residual(node, token);
        if !residual.is_empty() {
            self.tables.content.insert(token.to_string(), residual);
        }
    }

    fn build_leaf(&mut self, node: &Node) -> Entry {
        let token = match (&node.kind, node.attributes.get(KEY_ATTRIBUTE)) {
            (NodeType::Position, Some(key)) => key.as_str().map(str::to_string),
            _ => None,
        }
        .unwrap_or_else(|| node.id.clone());
        let token = if is_token(&token) && !token.contains(' ') {
            token
        } else {
            self.ids.next(&node.kind, node.subtype.as_deref(), None)
        };

        self.record_content(node, &token);

        let value = match node.size().filter(|size| *size != DEFAULT_SIZE) {
            Some(size) => format!("{token} {}", format_size(size)),
            None => token,
        };
        trace!(
            "event=leaf_build module=codec status=ok id={} type={}",
            node.id,
            node.kind
        );
        Entry {
            name: None,
            slot: Slot::Token(value),
            origin: Origin::Leaf,
        }
    }

    fn leaf_residual(&self, node: &Node, token: &str) -> NodeOverride {
        let derived = LeafToken::parse(token);
        let mut residual = NodeOverride::default();

        let decoded_id = derived.explicit_id.as_deref().map(|explicit| {
            IdAssigner::compose(&derived.kind, derived.subtype.as_deref(), explicit)
        });
        if !node.id.is_empty() && decoded_id.as_deref() != Some(node.id.as_str()) {
            residual.id = Some(node.id.clone());
        }
        if node.kind != derived.kind {
            residual.kind = Some(node.kind.clone());
        }
        if let Some(subtype) = node.subtype.as_deref().filter(|value| !value.is_empty()) {
            if derived.subtype.as_deref() != Some(subtype) {
                residual.subtype = Some(subtype.to_string());
            }
        }
        residual.title = kept_title(node.title.as_deref(), &derived.title);

        let mut attributes = node.attributes.clone();
        attributes.shift_remove(SIZE_ATTRIBUTE);
        if node.kind == NodeType::Position {
            attributes.shift_remove(KEY_ATTRIBUTE);
        }
        if attributes.get(ENABLED_ATTRIBUTE).is_some_and(is_truthy) {
            attributes.shift_remove(ENABLED_ATTRIBUTE);
        }
        residual.attributes = non_empty(attributes);
        residual
    }

    fn build_section(
        &mut self,
        node: &Node,
        scope: u8,
        parent_size: Option<f64>,
        top_level: bool,
    ) -> Option<Entry> {
        let size = node.size().filter(|size| *size != DEFAULT_SIZE);
        let candidate = is_anonymous(node, scope);

        let mut id = if node.kind == NodeType::Atoms {
            ATOMS_FIELD.to_string()
        } else if is_field_name(&node.id) {
            node.id.clone()
        } else {
            self.ids.next(&node.kind, None, None)
        };
        if candidate && SectionField::parse(&id).kind != node.kind {
            id = self.ids.next(&node.kind, None, None);
        }
        let inner_scope = if candidate {
            (scope + 1) % 2
        } else {
            child_scope(&SectionField::parse(&id).kind, scope)
        };

        let built = self.build_children(node.children(), inner_scope, size, false);

        if candidate && !top_level {
            if let Some(collapsed) = collapse(&node.kind, size, &built) {
                trace!(
                    "event=wrapper_collapse module=codec status=ok type={}",
                    node.kind
                );
                return Some(collapsed);
            }
        }

        // Children existed but all of them were atoms or pruned wrappers.
        if built.entries.is_empty()
            && !node.children().is_empty()
            && node.kind != NodeType::Atoms
        {
            return None;
        }

        let size_carried = built.size_carried;
        let slot = if built.entries.is_empty() {
            Slot::Empty
        } else {
            Slot::Branch(built.into_fragment())
        };

        if candidate && (size.is_none() || size_carried) {
            return Some(Entry {
                name: None,
                slot,
                origin: Origin::Branch,
            });
        }

        let derived = SectionField::parse(&id);
        let mut residual = NodeOverride::default();
        if !node.id.is_empty() && node.id != id {
            residual.id = Some(node.id.clone());
        }
        if node.kind != derived.kind {
            residual.kind = Some(node.kind.clone());
        }
        if let Some(subtype) = node.subtype.as_deref().filter(|value| !value.is_empty()) {
            if derived.subtype.as_deref() != Some(subtype) {
                residual.subtype = Some(subtype.to_string());
            }
        }
        residual.title = kept_title(node.title.as_deref(), &derived.title);

        let mut attributes = node.attributes.clone();
        if size.is_none() || size_carried {
            attributes.shift_remove(SIZE_ATTRIBUTE);
        }
        residual.attributes = non_empty(attributes);
        if !residual.is_empty() {
            self.tables.structure.insert(id.clone(), residual);
        }

        let name = match parent_size {
            Some(parent_size) => format!("{id} {}", format_size(parent_size)),
            None => id,
        };
        Some(Entry {
            name: Some(name),
            slot,
            origin: Origin::Branch,
        })
    }
}

/// Folds a wrapper around a single leaf token into that token.
fn collapse(kind: &NodeType, size: Option<f64>, built: &Built) -> Option<Entry> {
    let entry = built.single_positional()?;
    let Slot::Token(token) = &entry.slot else {
        return None;
    };

    match (kind, entry.origin) {
        (NodeType::Block, Origin::Leaf) => {
            let value = match size {
                None => token.clone(),
                Some(size) if !token.contains(' ') => format!("{token} {}", format_size(size)),
                Some(_) => return None,
            };
            Some(Entry {
                name: None,
                slot: Slot::Token(value),
                origin: Origin::CollapsedBlock,
            })
        }
        (NodeType::Grid, Origin::CollapsedBlock) if size.is_none() => Some(Entry {
            name: None,
            slot: Slot::Token(token.clone()),
            origin: Origin::CollapsedGrid,
        }),
        _ => None,
    }
}

/// Returns whether `node` is exactly what an anonymous slot at `scope` decodes to.
fn is_anonymous(node: &Node, scope: u8) -> bool {
    node.kind == scope_kind(scope)
        && node
            .title
            .as_deref()
            .map_or(true, |title| title.is_empty() || title == PLACEHOLDER_TITLE)
        && node.subtype.as_deref().map_or(true, str::is_empty)
        && node
            .attributes
            .keys()
            .all(|name| name == SIZE_ATTRIBUTE)
}

/// Returns whether `id` can be written as a structural field name.
fn is_field_name(id: &str) -> bool {
    !id.is_empty() && !id.contains(' ') && !is_numeric_key(id)
}

fn kept_title(title: Option<&str>, default_title: &str) -> Option<String> {
    title
        .filter(|title| !title.is_empty() && *title != PLACEHOLDER_TITLE && *title != default_title)
        .map(str::to_string)
}

fn non_empty(attributes: Attributes) -> Option<Attributes> {
    (!attributes.is_empty()).then_some(attributes)
}

#[cfg(test)]
mod tests {
    use super::TreeBuilder;
    use crate::codec::ids::IdAssigner;
    use crate::model::fragment::{Fragment, Slot};
    use crate::model::node::{Node, NodeType};
    use serde_json::json;

    fn particle(id: &str, subtype: &str, title: &str) -> Node {
        let mut node = Node::leaf(id, NodeType::Particle, title);
        node.subtype = Some(subtype.to_string());
        node.attributes.insert("enabled".to_string(), json!(1));
        node
    }

    fn sized(mut node: Node, size: u32) -> Node {
        node.attributes.insert("size".to_string(), json!(size));
        node
    }

    fn build(children: &[Node]) -> (Fragment, crate::codec::overrides::SideTables) {
        let mut ids = IdAssigner::new();
        let mut builder = TreeBuilder::new(&mut ids);
        let fragment = builder.build(children);
        (fragment, builder.finish())
    }

    #[test]
    fn grid_block_leaf_chain_collapses_to_token() {
        let chain = Node::structural("grid-1", NodeType::Grid).with_children(vec![
            Node::structural("block-1", NodeType::Block)
                .with_children(vec![particle("contact-1", "contact", "Contact")]),
        ]);
        let mut section = Node::structural("section-main", NodeType::Section);
        section.title = Some("Main".to_string());
        let section = section.with_children(vec![chain]);

        let (fragment, tables) = build(&[section]);
        let yaml = serde_yaml::to_string(&fragment).expect("fragment should serialize to yaml");
        assert_eq!(yaml, "section-main:\n- contact-1\n");
        assert!(tables.structure.is_empty());
        assert!(tables.content.is_empty());
    }

    #[test]
    fn block_size_is_folded_into_token() {
        let row = Node::structural("grid-1", NodeType::Grid).with_children(vec![
            sized(Node::structural("block-1", NodeType::Block), 30)
                .with_children(vec![particle("logo-1", "logo", "Logo")]),
            sized(Node::structural("block-2", NodeType::Block), 70)
                .with_children(vec![particle("menu-1", "menu", "Main Menu")]),
        ]);
        let mut header = Node::structural("header", NodeType::Section);
        header.subtype = Some("header".to_string());
        header.title = Some("Header".to_string());
        let header = header.with_children(vec![row]);

        let (fragment, tables) = build(&[header]);
        let json = serde_json::to_value(&fragment).expect("fragment should serialize to json");
        assert_eq!(json, json!({"header": [["logo-1 30", "menu-1 70"]]}));
        assert!(tables.structure.is_empty());
        assert_eq!(tables.content["menu-1"].title.as_deref(), Some("Main Menu"));
        assert_eq!(tables.content.len(), 1);
    }

    #[test]
    fn titled_wrapper_keeps_its_id_and_override() {
        let mut grid = Node::structural("grid-4", NodeType::Grid);
        grid.title = Some("Feature Row".to_string());
        let grid = grid.with_children(vec![Node::structural("block-1", NodeType::Block)
            .with_children(vec![particle("logo-1", "logo", "Logo")])]);
        let section =
            Node::structural("section-main", NodeType::Section).with_children(vec![grid]);

        let (fragment, tables) = build(&[section]);
        let json = serde_json::to_value(&fragment).expect("fragment should serialize to json");
        assert_eq!(json, json!({"section-main": {"grid-4": ["logo-1"]}}));
        assert_eq!(
            tables.structure["grid-4"].title.as_deref(),
            Some("Feature Row")
        );
    }

    #[test]
    fn pagecontent_and_position_map_back_to_tokens() {
        let mut messages = Node::leaf(
            "system-messages-1",
            NodeType::Pagecontent,
            "System Messages",
        );
        messages.subtype = Some("system-messages".to_string());
        messages.attributes.insert("enabled".to_string(), json!(1));

        let mut position = Node::leaf(
            "position-position-header",
            NodeType::Position,
            "Position-header",
        );
        position.attributes.insert("enabled".to_string(), json!(1));
        position
            .attributes
            .insert("key".to_string(), json!("position-header"));

        let block = Node::structural("block-1", NodeType::Block).with_children(vec![messages]);
        let other = Node::structural("block-2", NodeType::Block).with_children(vec![position]);
        let grid = Node::structural("grid-1", NodeType::Grid).with_children(vec![block, other]);
        let section =
            Node::structural("section-main", NodeType::Section).with_children(vec![grid]);

        let (fragment, tables) = build(&[section]);
        let json = serde_json::to_value(&fragment).expect("fragment should serialize to json");
        assert_eq!(
            json,
            json!({"section-main": [["system-messages-1", "position-header"]]})
        );
        assert!(tables.content.is_empty());
    }

    #[test]
    fn atoms_are_listed_and_keep_a_placeholder() {
        let mut atom = Node::leaf("analytics-1", NodeType::Atom, "Analytics");
        atom.subtype = Some("analytics".to_string());
        atom.attributes.insert("enabled".to_string(), json!(1));
        let wrapped = Node::structural("grid-9", NodeType::Grid).with_children(vec![
            Node::structural("block-9", NodeType::Block).with_children(vec![atom]),
        ]);
        let mut atoms = Node::structural("atoms", NodeType::Atoms);
        atoms.title = Some("Atoms".to_string());
        let atoms = atoms.with_children(vec![wrapped]);

        let (fragment, tables) = build(&[atoms]);
        assert_eq!(fragment.get("atoms"), Some(&Slot::Empty));
        assert_eq!(tables.atoms, ["atom-analytics-1"]);
        assert!(tables.structure.is_empty());
    }

    #[test]
    fn sized_wrapper_carries_size_on_named_children() {
        let mut inner = Node::structural("section-left", NodeType::Section);
        inner.title = Some("Left".to_string());
        let inner = inner.with_children(vec![Node::structural("grid-2", NodeType::Grid)
            .with_children(vec![Node::structural("block-3", NodeType::Block)
                .with_children(vec![particle("logo-1", "logo", "Logo")])])]);
        let block =
            sized(Node::structural("block-1", NodeType::Block), 40).with_children(vec![inner]);
        let grid = Node::structural("grid-1", NodeType::Grid).with_children(vec![block]);
        let section =
            Node::structural("container", NodeType::Container).with_children(vec![grid]);

        let (fragment, tables) = build(&[section]);
        let json = serde_json::to_value(&fragment).expect("fragment should serialize to json");
        assert_eq!(
            json,
            json!({"container": [[{"section-left 40": ["logo-1"]}]]})
        );
        assert!(tables.structure.is_empty());
    }

    #[test]
    fn declared_empty_section_is_kept() {
        let mut footer = Node::structural("footer", NodeType::Section);
        footer.subtype = Some("footer".to_string());
        footer.title = Some("Footer".to_string());

        let (fragment, tables) = build(&[footer]);
        assert_eq!(fragment.get("footer"), Some(&Slot::Empty));
        assert!(tables.structure.is_empty());
    }

    #[test]
    fn repeated_position_token_leaves_id_to_decode() {
        let position = |id: &str| {
            let mut node = Node::leaf(id, NodeType::Position, "Position-mobile");
            node.attributes.insert("enabled".to_string(), json!(1));
            node.attributes
                .insert("key".to_string(), json!("position-mobile"));
            node
        };
        let first = Node::structural("section-a", NodeType::Section)
            .with_children(vec![position("position-position-mobile")]);
        let second = Node::structural("section-b", NodeType::Section)
            .with_children(vec![position("position-1")]);

        let (fragment, tables) = build(&[first, second]);
        let json = serde_json::to_value(&fragment).expect("fragment should serialize to json");
        assert_eq!(
            json,
            json!({"section-a": ["position-mobile"], "section-b": ["position-mobile"]})
        );
        assert!(tables.content.is_empty());
    }
}
