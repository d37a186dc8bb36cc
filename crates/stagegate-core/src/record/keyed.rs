//! Keyed collections as the hosted store hands them back.
//!
//! The store turns a map with dense integer keys into a JSON array and a
//! sparse array back into a map, so every stored collection may arrive in
//! either form. [`Keyed`] accepts both and remembers the entry key, which is
//! the address later used to patch that entry in place.

use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use std::cmp::Ordering;
use std::fmt;

use crate::store::tree::array_index;
use std::marker::PhantomData;

/// Ordered `(entry key, value)` pairs in store iteration order.
///
/// Arrays yield decimal index keys; `null` entries (array holes or deleted
/// map children) are skipped. Map keys that are array indexes come first in
/// numeric order, the rest follow in the order they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyed<T>(pub Vec<(String, T)>);

impl<T> Keyed<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn into_entries(self) -> Vec<(String, T)> {
        self.0
    }
}

impl<T> Default for Keyed<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Keyed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(KeyedVisitor(PhantomData))
    }
}

struct KeyedVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for KeyedVisitor<T> {
    type Value = Keyed<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map or an array of entries")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, Option<T>>()? {
            if let Some(value) = value {
                entries.push((key, value));
            }
        }
        entries.sort_by(|(left, _), (right, _)| iteration_order(left, right));
        Ok(Keyed(entries))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        let mut index = 0_usize;
        while let Some(value) = seq.next_element::<Option<T>>()? {
            if let Some(value) = value {
                entries.push((index.to_string(), value));
            }
            index += 1;
        }
        Ok(Keyed(entries))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(Keyed(Vec::new()))
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(Keyed(Vec::new()))
    }
}

/// Index keys before named keys; named keys keep their relative order.
fn iteration_order(left: &str, right: &str) -> Ordering {
    match (array_index(left), array_index(right)) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
