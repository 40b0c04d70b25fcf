//! Override lookup seam between the codec and its storage.
//!
//! # Responsibility
//! - Expose `structure[id]` and `content[token]` lookups to the decoder.
//! - Collect the side tables the encoder writes.

use crate::model::document::{LayoutDocument, OverrideTable};
use crate::model::node::NodeOverride;

/// Read-only source of persisted override records.
pub trait OverrideStore {
    /// Looks up the record for a structural field id.
    fn structure(&self, id: &str) -> Option<&NodeOverride>;
    /// Looks up the record for a leaf token (without size).
    fn content(&self, token: &str) -> Option<&NodeOverride>;
}

impl OverrideStore for LayoutDocument {
    fn structure(&self, id: &str) -> Option<&NodeOverride> {
        self.structure.get(id)
    }

    fn content(&self, token: &str) -> Option<&NodeOverride> {
        self.content.get(token)
    }
}

/// Store with no records; every node keeps its computed defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverrides;

impl OverrideStore for NoOverrides {
    fn structure(&self, _id: &str) -> Option<&NodeOverride> {
        None
    }

    fn content(&self, _token: &str) -> Option<&NodeOverride> {
        None
    }
}

/// Side tables produced by one encode session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideTables {
    pub atoms: Vec<String>,
    pub structure: OverrideTable,
    pub content: OverrideTable,
}

impl OverrideStore for SideTables {
    fn structure(&self, id: &str) -> Option<&NodeOverride> {
        self.structure.get(id)
    }

    fn content(&self, token: &str) -> Option<&NodeOverride> {
        self.content.get(token)
    }
}
