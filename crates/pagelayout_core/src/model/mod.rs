//! Typed layout model shared by the decode and encode paths.
//!
//! # Responsibility
//! - Define the canonical tree (`Node`), the compact form (`Fragment`) and
//!   the stored envelope (`LayoutDocument`).
//!
//! # Invariants
//! - Every type here reads its stored shape without failing on data-level
//!   defects; only the envelope entry points report errors.

pub mod document;
pub mod fragment;
pub mod node;
