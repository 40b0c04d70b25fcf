//! Page layout transcoder core.
//!
//! Converts between the compact, hand-authored layout encoding and the
//! canonical layout tree. Decode and encode are pure, synchronous and total
//! over well-shaped documents; see [`codec`] for the pipeline.

pub mod codec;
pub mod error;
pub mod grammar;
pub mod logging;
pub mod model;

pub use codec::encoder::{encode, encode_layout};
pub use codec::ids::IdAssigner;
pub use codec::loader::{decode, decode_with};
pub use codec::overrides::{NoOverrides, OverrideStore, SideTables};
pub use error::{LayoutError, LayoutResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::document::{DecodedLayout, LayoutDocument, OverrideTable, FORMAT_VERSION};
pub use model::fragment::{FieldKey, Fragment, Slot};
pub use model::node::{Attributes, Node, NodeOverride, NodeType};

/// Parses a YAML envelope and decodes it.
pub fn decode_yaml(text: &str) -> LayoutResult<DecodedLayout> {
    let document = LayoutDocument::from_yaml_str(text)?;
    Ok(decode(&document))
}

/// Encodes a decoded layout and renders the envelope as YAML.
pub fn encode_yaml(decoded: &DecodedLayout) -> LayoutResult<String> {
    encode_layout(decoded).to_yaml_string()
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
