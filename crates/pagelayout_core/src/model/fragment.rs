//! Compact nested-map representation of a layout.
//!
//! # Responsibility
//! - Hold the hand-authored `layout` mapping in declaration order.
//! - Read any YAML/JSON shape without failing; write sequences when every
//!   key is positional and mappings otherwise.
//!
//! # Invariants
//! - Positional keys are assigned in increasing order by `push`.
//! - `insert` replaces an existing named entry in place.

use crate::grammar::is_numeric_key;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Key of one compact entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Implicit "next row/column" slot (sequence item or numeric key).
    Position(usize),
    /// Structural field such as `"section-hero 30"`.
    Named(String),
}

impl FieldKey {
    pub fn as_named(&self) -> Option<&str> {
        match self {
            Self::Named(name) if !is_numeric_key(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position(index) => write!(f, "{index}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Value of one compact entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Leaf token such as `"position-header 50"`.
    Token(String),
    /// Nested structural content.
    Branch(Fragment),
    /// Declared without content (`null`, `false`, `0`, ...).
    Empty,
}

/// Ordered compact mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    entries: Vec<(FieldKey, Slot)>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sequence of leaf tokens.
    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut fragment = Self::new();
        for token in tokens {
            fragment.push(Slot::Token(token.into()));
        }
        fragment
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(FieldKey, Slot)> {
        self.entries.iter()
    }

    /// Appends a positional entry after the highest existing position.
    pub fn push(&mut self, slot: Slot) {
        let index = self
            .entries
            .iter()
            .filter_map(|(key, _)| match key {
                FieldKey::Position(index) => Some(index + 1),
                FieldKey::Named(_) => None,
            })
            .max()
            .unwrap_or(0);
        self.entries.push((FieldKey::Position(index), slot));
    }

    /// Sets a named entry, keeping the original position of an existing key.
    pub fn insert(&mut self, name: impl Into<String>, slot: Slot) {
        let name = name.into();
        let existing = self
            .entries
            .iter_mut()
            .find(|(key, _)| matches!(key, FieldKey::Named(current) if *current == name));
        match existing {
            Some((_, value)) => *value = slot,
            None => self.entries.push((FieldKey::Named(name), slot)),
        }
    }

    /// Looks up a named entry.
    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.entries.iter().find_map(|(key, slot)| match key {
            FieldKey::Named(current) if current == name => Some(slot),
            _ => None,
        })
    }

    fn is_sequence(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(expected, (key, _))| {
                matches!(key, FieldKey::Position(index) if *index == expected)
            })
    }
}

impl Serialize for Fragment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.is_sequence() {
            let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
            for (_, slot) in &self.entries {
                seq.serialize_element(slot)?;
            }
            return seq.end();
        }

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, slot) in &self.entries {
            match key {
                FieldKey::Position(index) => map.serialize_entry(&(*index as u64), slot)?,
                FieldKey::Named(name) => map.serialize_entry(name, slot)?,
            }
        }
        map.end()
    }
}

impl Serialize for Slot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Token(token) => serializer.serialize_str(token),
            Self::Branch(fragment) => fragment.serialize(serializer),
            Self::Empty => serializer.serialize_unit(),
        }
    }
}

fn fragment_from_seq<'de, A>(mut seq: A) -> Result<Fragment, A::Error>
where
    A: SeqAccess<'de>,
{
    let mut fragment = Fragment::new();
    while let Some(slot) = seq.next_element::<Slot>()? {
        fragment.push(slot);
    }
    Ok(fragment)
}

fn fragment_from_map<'de, A>(mut map: A) -> Result<Fragment, A::Error>
where
    A: MapAccess<'de>,
{
    let mut fragment = Fragment::new();
    while let Some((key, slot)) = map.next_entry::<FieldKey, Slot>()? {
        match key {
            FieldKey::Position(_) => fragment.push(slot),
            FieldKey::Named(name) => fragment.insert(name, slot),
        }
    }
    Ok(fragment)
}

struct FragmentVisitor;

impl<'de> Visitor<'de> for FragmentVisitor {
    type Value = Fragment;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a layout mapping or sequence")
    }

    fn visit_seq<A>(self, seq: A) -> Result<Fragment, A::Error>
    where
        A: SeqAccess<'de>,
    {
        fragment_from_seq(seq)
    }

    fn visit_map<A>(self, map: A) -> Result<Fragment, A::Error>
    where
        A: MapAccess<'de>,
    {
        fragment_from_map(map)
    }

    // Scalars where a mapping is expected degrade to an empty layout.
    fn visit_str<E: de::Error>(self, _value: &str) -> Result<Fragment, E> {
        Ok(Fragment::new())
    }

    fn visit_bool<E: de::Error>(self, _value: bool) -> Result<Fragment, E> {
        Ok(Fragment::new())
    }

    fn visit_i64<E: de::Error>(self, _value: i64) -> Result<Fragment, E> {
        Ok(Fragment::new())
    }

    fn visit_u64<E: de::Error>(self, _value: u64) -> Result<Fragment, E> {
        Ok(Fragment::new())
    }

    fn visit_f64<E: de::Error>(self, _value: f64) -> Result<Fragment, E> {
        Ok(Fragment::new())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Fragment, E> {
        Ok(Fragment::new())
    }

    fn visit_none<E: de::Error>(self) -> Result<Fragment, E> {
        Ok(Fragment::new())
    }
}

impl<'de> Deserialize<'de> for Fragment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FragmentVisitor)
    }
}

struct SlotVisitor;

impl<'de> Visitor<'de> for SlotVisitor {
    type Value = Slot;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a layout token, mapping or sequence")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Slot, E> {
        Ok(Slot::Token(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Slot, E> {
        Ok(Slot::Token(value))
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Slot, E> {
        Ok(if value {
            Slot::Token("1".to_string())
        } else {
            Slot::Empty
        })
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Slot, E> {
        Ok(Slot::Token(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Slot, E> {
        Ok(Slot::Token(value.to_string()))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Slot, E> {
        Ok(Slot::Token(value.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Slot, E> {
        Ok(Slot::Empty)
    }

    fn visit_none<E: de::Error>(self) -> Result<Slot, E> {
        Ok(Slot::Empty)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Slot, D::Error>
    where
        D: Deserializer<'de>,
    {
        Slot::deserialize(deserializer)
    }

    fn visit_seq<A>(self, seq: A) -> Result<Slot, A::Error>
    where
        A: SeqAccess<'de>,
    {
        fragment_from_seq(seq).map(Slot::Branch)
    }

    fn visit_map<A>(self, map: A) -> Result<Slot, A::Error>
    where
        A: MapAccess<'de>,
    {
        fragment_from_map(map).map(Slot::Branch)
    }
}

impl<'de> Deserialize<'de> for Slot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(SlotVisitor)
    }
}

struct FieldKeyVisitor;

impl<'de> Visitor<'de> for FieldKeyVisitor {
    type Value = FieldKey;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a layout field name or index")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<FieldKey, E> {
        if is_numeric_key(value) {
            let index = value.trim().parse::<usize>().unwrap_or_default();
            return Ok(FieldKey::Position(index));
        }
        Ok(FieldKey::Named(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<FieldKey, E> {
        Ok(FieldKey::Position(usize::try_from(value).unwrap_or_default()))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<FieldKey, E> {
        Ok(FieldKey::Position(usize::try_from(value).unwrap_or_default()))
    }

    fn visit_f64<E: de::Error>(self, _value: f64) -> Result<FieldKey, E> {
        Ok(FieldKey::Position(0))
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<FieldKey, E> {
        Ok(FieldKey::Position(usize::from(value)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<FieldKey, E> {
        Ok(FieldKey::Named(String::new()))
    }
}

impl<'de> Deserialize<'de> for FieldKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FieldKeyVisitor)
    }
}
