//! Session-scoped identifier minting.
//!
//! # Responsibility
//! - Build ids of the form `{type[-subtype]}-{n}` with a private counter per
//!   `(type, subtype)` key.
//! - Keep every id handed out in one session unique.
//!
//! # Invariants
//! - One `IdAssigner` serves exactly one decode or encode call.
//! - Minted ids skip values already reserved or issued.
//! - An explicit id that was already issued is replaced by a minted one.

use crate::model::node::NodeType;
use std::collections::{HashMap, HashSet};

/// Per-session id counter.
#[derive(Debug, Default)]
pub struct IdAssigner {
    counters: HashMap<String, u32>,
    reserved: HashSet<String>,
    issued: HashSet<String>,
}

impl IdAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter key for a node type.
    ///
    /// `pagecontent` maps back to `system-content` / `system-messages`;
    /// particles and atoms leave their type out of the key.
    pub fn key_for(kind: &NodeType, subtype: Option<&str>) -> String {
        let (name, subtype) = match kind {
            NodeType::Pagecontent => {
                let source = if subtype == Some("pagecontent") {
                    "content"
                } else {
                    "messages"
                };
                ("system", Some(source))
            }
            other => (other.as_str(), subtype),
        };

        let mut parts = Vec::with_capacity(2);
        if !matches!(kind, NodeType::Particle | NodeType::Atom) {
            parts.push(name);
        }
        if let Some(subtype) = subtype.filter(|value| !value.is_empty()) {
            parts.push(subtype);
        }
        parts.join("-")
    }

    /// Builds the id an explicit segment resolves to, without touching state.
    pub fn compose(kind: &NodeType, subtype: Option<&str>, explicit: &str) -> String {
        format!("{}-{explicit}", Self::key_for(kind, subtype))
    }

    /// Marks an id as present in the input so counters never produce it.
    pub fn reserve(&mut self, id: impl Into<String>) {
        self.reserved.insert(id.into());
    }

    /// Records `id` as handed out. Returns `false` when it already was.
    pub fn claim(&mut self, id: &str) -> bool {
        self.issued.insert(id.to_string())
    }

    /// Returns the next id for `(kind, subtype)`.
    ///
    /// With `explicit`, returns the composed id unless this session already
    /// issued it.
    pub fn next(
        &mut self,
        kind: &NodeType,
        subtype: Option<&str>,
        explicit: Option<&str>,
    ) -> String {
        let key = Self::key_for(kind, subtype);
        if let Some(explicit) = explicit {
            let id = format!("{key}-{explicit}");
            if self.issued.insert(id.clone()) {
                return id;
            }
        }

        let counter = self.counters.entry(key.clone()).or_insert(0);
        loop {
            *counter += 1;
            let id = format!("{key}-{counter}");
            if !self.reserved.contains(&id) && self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}
