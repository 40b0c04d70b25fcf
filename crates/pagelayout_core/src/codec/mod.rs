//! Layout transcoder: compact fragment <-> canonical tree.
//!
//! Decode runs `loader` -> `parser`; encode runs `encoder` -> `builder`.
//! Both directions share `ids` for identifier minting and `crate::grammar`
//! for token syntax.

pub mod builder;
pub mod encoder;
pub mod ids;
pub mod loader;
pub mod overrides;
pub mod parser;
