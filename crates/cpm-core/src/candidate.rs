//! Connection candidates produced by a lookup.
use std::collections::BTreeSet;
use std::fmt;

use crate::array::PropertyArray;

/// One possible connection: a property array plus provenance.
///
/// A candidate is born when a CIB entry is joined with a request, and is
/// enriched as policies fire. It is a per-lookup clone; the repositories it
/// was derived from are never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// The joined properties describing this connection.
    pub properties: PropertyArray,
    /// Id of the CIB source this candidate was expanded from.
    pub source: String,
    /// Names of the policies applied to this candidate, in sorted order.
    pub policies: BTreeSet<String>,
    /// Set when a policy application hit an immutable conflict; invalid
    /// candidates are dropped before ranking.
    pub invalid: bool,
}

impl Candidate {
    /// Creates a fresh candidate with no applied policies.
    pub fn new(properties: PropertyArray, source: impl Into<String>) -> Candidate {
        Candidate {
            properties,
            source: source.into(),
            policies: BTreeSet::new(),
            invalid: false,
        }
    }

    /// Ranking score: the sum over the evaluated properties.
    pub fn score(&self) -> f64 {
        self.properties.score()
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.properties)?;
        if !self.policies.is_empty() {
            let names: Vec<&str> = self.policies.iter().map(String::as_str).collect();
            write!(f, " <- {}", names.join(","))?;
        }
        if self.invalid {
            f.write_str(" (invalid)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use crate::property::Property;

    use super::*;

    #[test]
    fn score_delegates_to_the_array() {
        let mut properties = PropertyArray::new();
        properties
            .add(Property::new("transport", "TCP").with_score(1.0))
            .expect("install");
        properties
            .add(Property::new("transport", "TCP").with_score(1.0))
            .expect("merge");
        let candidate = Candidate::new(properties, "wlan0");
        assert_eq!(candidate.score(), 2.0);
    }

    #[test]
    fn display_includes_provenance_and_policies() {
        let mut candidate = Candidate::new(PropertyArray::new(), "eth0");
        candidate.policies.insert("bulk_transfer".to_owned());
        assert_eq!(candidate.to_string(), "eth0:  <- bulk_transfer");
    }
}
