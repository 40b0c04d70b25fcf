//! Compact token grammar.
//!
//! # Responsibility
//! - Parse structural fields (`section-id [size]`) and leaf tokens
//!   (`type-subtype-id [size]`) into their typed parts.
//! - Provide the default values both codec directions compare against.
//!
//! # Invariants
//! - Parsing is total: unknown names fall back to `section` / `particle`,
//!   unreadable sizes are treated as absent.
//! - No function here mints ids; see `codec::ids`.

use crate::model::node::{NodeType, DEFAULT_SIZE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

static SIZE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("valid size regex")
});
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?\s*$")
        .expect("valid numeric regex")
});
static EXPLICIT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:0|-?[1-9][0-9]*)$").expect("valid explicit id regex"));

/// HTML-like section names whose trailing segment is a display id.
const STRUCTURE_TAGS: &[&str] = &["div", "section", "aside", "nav", "article", "header", "footer"];

const ATOM_PREFIX: &str = "atom-";

/// Reads the leading decimal number of `text`.
///
/// `"30"`, `"30%"` and `" 33.3 wide"` all read as a size; zero, missing and
/// non-numeric input read as absent.
pub fn parse_size(text: &str) -> Option<f64> {
    let prefix = SIZE_PREFIX_RE.find(text)?;
    let value: f64 = prefix.as_str().trim().parse().ok()?;
    (value != 0.0 && value.is_finite()).then_some(value)
}

/// Reads a stored size attribute value.
pub fn size_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|size| *size != 0.0),
        Value::String(text) => parse_size(text),
        _ => None,
    }
}

/// Stores a size as an integer when it has no fractional part.
pub fn size_value(size: f64) -> Value {
    if size.fract() == 0.0 && size.abs() < 1e15 {
        return Value::from(size as i64);
    }
    Number::from_f64(size).map(Value::Number).unwrap_or(Value::Null)
}

/// Formats a size the way it appears after a space in a compact key.
pub fn format_size(size: f64) -> String {
    if size.fract() == 0.0 && size.abs() < 1e15 {
        return format!("{}", size as i64);
    }
    format!("{size}")
}

/// Returns whether a trailing hyphen segment is read as an explicit id.
///
/// Only canonical integers qualify (`0`, `12`, `-3`; not `01` or `+1`).
pub fn is_explicit_id(segment: &str) -> bool {
    EXPLICIT_ID_RE.is_match(segment)
}

/// Returns whether a mapping key is an implicit positional slot.
pub fn is_numeric_key(key: &str) -> bool {
    NUMERIC_RE.is_match(key)
}

/// Returns whether a compact leaf value carries a token at all.
pub fn is_token(value: &str) -> bool {
    !value.is_empty() && value != "0"
}

/// Upper-cases the first ASCII letter.
pub fn ucfirst(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Adds the `atom-` prefix when missing. Idempotent.
pub fn normalize_atom_id(id: &str) -> String {
    if id.starts_with(ATOM_PREFIX) {
        id.to_string()
    } else {
        format!("{ATOM_PREFIX}{id}")
    }
}

/// Splits `head size` at the first space. The default size reads as absent.
fn split_size(raw: &str) -> (&str, Option<f64>) {
    match raw.split_once(' ') {
        Some((head, rest)) => (
            head,
            parse_size(rest).filter(|size| *size != DEFAULT_SIZE),
        ),
        None => (raw, None),
    }
}

/// Parsed structural field: `section[-id] [size]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionField<'a> {
    /// Field text before the size; the node id and `structure` table key.
    pub section_id: &'a str,
    /// First hyphen segment.
    pub section: &'a str,
    pub kind: NodeType,
    /// Declared section name when it differs from the matched type.
    pub subtype: Option<String>,
    /// Capitalized display id.
    pub title: String,
    pub size: Option<f64>,
}

impl<'a> SectionField<'a> {
    pub fn parse(field: &'a str) -> Self {
        let (section_id, size) = split_size(field);
        let (section, rest) = match section_id.split_once('-') {
            Some((section, rest)) => (section, Some(rest)),
            None => (section_id, None),
        };
        let kind = NodeType::structural(section).unwrap_or(NodeType::Section);
        let display_id = if kind == NodeType::Section && STRUCTURE_TAGS.contains(&section) {
            rest.unwrap_or(section)
        } else {
            section_id
        };
        let subtype =
            (!section.is_empty() && kind.as_str() != section).then(|| section.to_string());

        Self {
            section_id,
            section,
            kind,
            subtype,
            title: ucfirst(display_id),
            size,
        }
    }
}

/// Parsed leaf token: `type[-subtype][-id] [size]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafToken<'a> {
    /// Token text before the size; the `content` table key.
    pub token: &'a str,
    /// Presentation type (`system-*` leaves become `pagecontent`).
    pub kind: NodeType,
    pub subtype: Option<String>,
    /// Explicit id segment, or the composite key for positions.
    pub explicit_id: Option<String>,
    /// Composite key of a position leaf.
    pub key: Option<String>,
    pub title: String,
    pub size: Option<f64>,
}

impl<'a> LeafToken<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let (token, size) = split_size(raw);
        let mut segments: Vec<&str> = token.split('-').collect();
        let head = segments.first().copied().unwrap_or_default();

        // A name that ends in a number (`footer-2020`) reads as an explicit id.
        let has_explicit_id = segments.last().is_some_and(|last| is_explicit_id(last));
        let mut explicit_id = if has_explicit_id {
            segments.pop().map(str::to_string)
        } else {
            None
        };

        let mut kind = match NodeType::leaf(head) {
            Some(kind) => {
                if !segments.is_empty() {
                    segments.remove(0);
                }
                kind
            }
            None => NodeType::Particle,
        };
        let joined = segments.join("-");
        let mut subtype = (!joined.is_empty()).then_some(joined);
        let mut title = ucfirst(subtype.as_deref().unwrap_or(kind.as_str()));
        let mut key = None;

        if kind == NodeType::System {
            match subtype.as_deref() {
                Some("messages") => {
                    kind = NodeType::Pagecontent;
                    subtype = Some("system-messages".to_string());
                    title = "System Messages".to_string();
                }
                Some("content") => {
                    kind = NodeType::Pagecontent;
                    subtype = Some("pagecontent".to_string());
                    title = "Page Content".to_string();
                }
                _ => {}
            }
        }

        if kind == NodeType::Position {
            let mut composite = String::from("position");
            if let Some(name) = subtype.take() {
                composite.push('-');
                composite.push_str(&name);
            }
            if let Some(id) = explicit_id.as_deref() {
                composite.push('-');
                composite.push_str(id);
            }
            title = ucfirst(&composite);
            explicit_id = Some(composite.clone());
            key = Some(composite);
        }

        Self {
            token,
            kind,
            subtype,
            explicit_id,
            key,
            title,
            size,
        }
    }
}
