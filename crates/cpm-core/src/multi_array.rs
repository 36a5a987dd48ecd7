//! Multi-valued property bags and Cartesian expansion.
//!
//! A [`PropertyMultiArray`] maps each key to a non-empty, insertion-ordered
//! list of alternative properties. CIB sources use it to describe mutually
//! exclusive characteristics (two supported MTU ranges, say); expansion
//! turns the alternatives into concrete [`PropertyArray`] combinations.
use std::collections::BTreeMap;
use std::fmt;

use crate::array::PropertyArray;
use crate::property::Property;

/// Key → ordered list of alternative properties for that key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMultiArray {
    entries: BTreeMap<String, Vec<Property>>,
}

impl PropertyMultiArray {
    /// Creates an empty multi-array.
    pub fn new() -> PropertyMultiArray {
        PropertyMultiArray::default()
    }

    /// Appends a property to its key's alternative list, preserving insertion
    /// order. Duplicates — same `(key, value, precedence)` triple — are
    /// dropped.
    pub fn add(&mut self, property: Property) {
        let alternatives = self.entries.entry(property.key().to_owned()).or_default();
        if !alternatives.iter().any(|p| p.same_definition(&property)) {
            alternatives.push(property);
        }
    }

    /// Returns the alternatives recorded for a key.
    pub fn get(&self, key: &str) -> Option<&[Property]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no key is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of property arrays [`PropertyMultiArray::expand`] will produce:
    /// the product of the per-key list lengths (1 for the empty multi-array).
    pub fn expansion_len(&self) -> usize {
        self.entries.values().map(Vec::len).product()
    }

    /// Expands the alternatives into every property array obtainable by
    /// picking exactly one property per key.
    ///
    /// The empty multi-array expands to exactly one empty array. Output
    /// order is deterministic: keys in sorted order, alternatives in
    /// insertion order, odometer-style.
    pub fn expand(&self) -> Vec<PropertyArray> {
        let mut arrays = vec![PropertyArray::new()];
        for alternatives in self.entries.values() {
            let mut extended = Vec::with_capacity(arrays.len() * alternatives.len());
            for base in &arrays {
                for alternative in alternatives {
                    let mut array = base.clone();
                    array.set(alternative.clone());
                    extended.push(array);
                }
            }
            arrays = extended;
        }
        arrays
    }
}

impl FromIterator<Property> for PropertyMultiArray {
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> PropertyMultiArray {
        let mut multi = PropertyMultiArray::new();
        for property in iter {
            multi.add(property);
        }
        multi
    }
}

impl fmt::Display for PropertyMultiArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for alternatives in self.entries.values() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if alternatives.len() == 1 {
                write!(f, "{}", alternatives[0])?;
            } else {
                f.write_str("{")?;
                for (i, alternative) in alternatives.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{alternative}")?;
                }
                f.write_str("}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use crate::property::Precedence;
    use crate::value::Value;

    use super::*;

    fn requested(key: &str, value: impl Into<Value>) -> Property {
        Property::new(key, value).with_score(1.0)
    }

    fn mtu_range(lo: f64, hi: f64) -> Property {
        requested("MTU", Value::range(lo, hi).expect("valid range"))
    }

    #[test]
    fn add_preserves_insertion_order() {
        let mut multi = PropertyMultiArray::new();
        multi.add(mtu_range(1000.0, 9000.0));
        multi.add(mtu_range(100.0, 1000.0));
        let alternatives = multi.get("MTU").expect("present");
        assert_eq!(
            *alternatives[0].value(),
            Value::range(1000.0, 9000.0).expect("range")
        );
        assert_eq!(
            *alternatives[1].value(),
            Value::range(100.0, 1000.0).expect("range")
        );
    }

    #[test]
    fn add_drops_exact_duplicates() {
        let mut multi = PropertyMultiArray::new();
        multi.add(requested("transport", "TCP"));
        multi.add(requested("transport", "TCP").with_score(5.0));
        assert_eq!(multi.get("transport").map(<[Property]>::len), Some(1));
    }

    #[test]
    fn same_value_different_precedence_is_kept() {
        let mut multi = PropertyMultiArray::new();
        multi.add(requested("transport", "TCP"));
        multi.add(requested("transport", "TCP").with_precedence(Precedence::Immutable));
        assert_eq!(multi.get("transport").map(<[Property]>::len), Some(2));
    }

    #[test]
    fn empty_multi_array_expands_to_one_empty_array() {
        let expanded = PropertyMultiArray::new().expand();
        assert_eq!(expanded.len(), 1);
        assert!(expanded[0].is_empty());
    }

    #[test]
    fn expansion_yields_cartesian_product() {
        let mut multi = PropertyMultiArray::new();
        multi.add(mtu_range(100.0, 1000.0));
        multi.add(mtu_range(1000.0, 9000.0));
        multi.add(requested("transport", "TCP"));
        assert_eq!(multi.expansion_len(), 2);

        let expanded = multi.expand();
        assert_eq!(expanded.len(), 2);
        for array in &expanded {
            assert_eq!(array.len(), 2);
            assert!(array.contains_key("MTU"));
            assert!(array.contains_key("transport"));
        }
        assert_eq!(
            *expanded[0].get("MTU").expect("present").value(),
            Value::range(100.0, 1000.0).expect("range")
        );
        assert_eq!(
            *expanded[1].get("MTU").expect("present").value(),
            Value::range(1000.0, 9000.0).expect("range")
        );
    }

    #[test]
    fn expansion_len_multiplies_alternative_counts() {
        let mut multi = PropertyMultiArray::new();
        multi.add(requested("transport", "TCP"));
        multi.add(requested("transport", "UDP"));
        multi.add(mtu_range(100.0, 1000.0));
        multi.add(mtu_range(1000.0, 9000.0));
        multi.add(requested("low_latency", true));
        assert_eq!(multi.expansion_len(), 4);
        assert_eq!(multi.expand().len(), 4);
    }
}
