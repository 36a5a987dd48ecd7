//! Unique-key property bags and their algebra.
//!
//! A [`PropertyArray`] maps each key to at most one [`Property`]. The three
//! relations mirror set algebra lifted to properties: `merge` (union with
//! per-key merging), `intersection` (shared keys only), and
//! `symmetric_difference` (disjoint keys only). All three produce new arrays
//! and leave their inputs untouched.
use std::collections::BTreeMap;
use std::fmt;

use crate::property::{MergeError, Property};

/// An ordered map of properties, at most one per key.
///
/// Keys iterate in sorted order, which makes every derived artefact —
/// expansion order, candidate JSON, dump output — deterministic without
/// explicit sorting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyArray {
    entries: BTreeMap<String, Property>,
}

impl PropertyArray {
    /// Creates an empty array.
    pub fn new() -> PropertyArray {
        PropertyArray::default()
    }

    /// Builds an array from properties, merging duplicated keys.
    ///
    /// # Errors
    ///
    /// Propagates [`MergeError::ImmutableConflict`] from duplicate keys.
    pub fn from_properties<I>(properties: I) -> Result<PropertyArray, MergeError>
    where
        I: IntoIterator<Item = Property>,
    {
        let mut array = PropertyArray::new();
        for property in properties {
            array.add(property)?;
        }
        Ok(array)
    }

    /// Inserts a property; when the key is already present the existing
    /// property is merged in place per the precedence decision table.
    ///
    /// # Errors
    ///
    /// [`MergeError::ImmutableConflict`] when the merge hits two conflicting
    /// immutable values. The conflicting property keeps its stamped score so
    /// the caller can still inspect the array.
    pub fn add(&mut self, property: Property) -> Result<(), MergeError> {
        match self.entries.get_mut(property.key()) {
            Some(existing) => existing.update(&property),
            None => {
                self.entries.insert(property.key().to_owned(), property);
                Ok(())
            }
        }
    }

    /// Installs a property, replacing any existing entry without merging.
    /// Used by expansion, where each key is visited exactly once.
    pub fn set(&mut self, property: Property) {
        self.entries.insert(property.key().to_owned(), property);
    }

    /// Looks up a property by key.
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.entries.get(key)
    }

    /// Returns `true` when a property with this key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the array holds no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the properties in key order.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.entries.values()
    }

    /// Iterates over the keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Sum of the scores of all evaluated properties.
    pub fn score(&self) -> f64 {
        self.entries
            .values()
            .filter(|p| p.evaluated())
            .map(Property::score)
            .sum()
    }

    /// `A + B`: disjoint keys are copied, shared keys are merged (`self`'s
    /// property updated with `other`'s).
    ///
    /// # Errors
    ///
    /// Propagates [`MergeError::ImmutableConflict`] from any shared key.
    pub fn merge(&self, other: &PropertyArray) -> Result<PropertyArray, MergeError> {
        let mut result = self.symmetric_difference(other);
        for (key, ours) in &self.entries {
            if let Some(theirs) = other.entries.get(key) {
                result.set(ours.merged(theirs)?);
            }
        }
        Ok(result)
    }

    /// `A & B`: pairwise merges of shared keys only.
    ///
    /// # Errors
    ///
    /// Propagates [`MergeError::ImmutableConflict`] from any shared key.
    pub fn intersection(&self, other: &PropertyArray) -> Result<PropertyArray, MergeError> {
        let mut result = PropertyArray::new();
        for (key, ours) in &self.entries {
            if let Some(theirs) = other.entries.get(key) {
                result.set(ours.merged(theirs)?);
            }
        }
        Ok(result)
    }

    /// `A ^ B`: copies of the properties whose key appears on exactly one
    /// side.
    pub fn symmetric_difference(&self, other: &PropertyArray) -> PropertyArray {
        let mut result = PropertyArray::new();
        for (key, property) in &self.entries {
            if !other.entries.contains_key(key) {
                result.set(property.clone());
            }
        }
        for (key, property) in &other.entries {
            if !self.entries.contains_key(key) {
                result.set(property.clone());
            }
        }
        result
    }
}

impl fmt::Display for PropertyArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for property in self.entries.values() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{property}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<Property> for PropertyArray {
    /// Collects properties, resolving duplicate keys by last-write-wins
    /// installation (no merging). Use [`PropertyArray::from_properties`] when
    /// merge semantics are wanted.
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> PropertyArray {
        let mut array = PropertyArray::new();
        for property in iter {
            array.set(property);
        }
        array
    }
}
