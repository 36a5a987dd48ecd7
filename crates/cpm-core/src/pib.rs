//! The Policy Information Base: match/apply transformation rules.
//!
//! A [`Pib`] plays one of two roles depending on which directory it was
//! loaded from. *Profiles* run before the CIB and expand a request into
//! enriched variants; *policies* run after the CIB and rewrite candidates.
//! Both roles share the same matching and application machinery.
use std::fmt;

use crate::array::PropertyArray;
use crate::candidate::Candidate;
use crate::property::MergeError;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// One transformation rule: conditions (`match_properties`) and effects
/// (`properties`).
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// Unique-ish display name; recorded on candidates the policy touched.
    pub name: String,
    /// Reserved ordering knob carried from the repository file.
    pub priority: i64,
    /// Free-form description carried from the repository file.
    pub description: Option<String>,
    /// Name of the file this policy was loaded from, when known.
    pub filename: Option<String>,
    /// The conditions a property array must overlap for the policy to fire.
    pub match_properties: PropertyArray,
    /// The effects merged into a matching array.
    pub properties: PropertyArray,
}

impl Policy {
    /// Creates a policy with priority 0 and no provenance.
    pub fn new(
        name: impl Into<String>,
        match_properties: PropertyArray,
        properties: PropertyArray,
    ) -> Policy {
        Policy {
            name: name.into(),
            priority: 0,
            description: None,
            filename: None,
            match_properties,
            properties,
        }
    }

    /// Number of match conditions. Policies are evaluated in ascending
    /// `match_len` order so that wildcards fire first and narrower rules can
    /// override what they wrote.
    pub fn match_len(&self) -> usize {
        self.match_properties.len()
    }

    /// Decides whether this policy fires against `properties`.
    ///
    /// An empty match is a wildcard and always fires. Otherwise at least one
    /// match condition must overlap a property with the same key; in strict
    /// mode every overlapping key additionally needs the target's precedence
    /// to be at least the condition's.
    pub fn compare(&self, properties: &PropertyArray, strict: bool) -> bool {
        if self.match_properties.is_empty() {
            return true;
        }

        let mut overlapping = 0usize;
        for condition in self.match_properties.properties() {
            let Some(target) = properties.get(condition.key()) else {
                continue;
            };
            if !condition.value().overlaps(target.value()) {
                continue;
            }
            if strict && target.precedence() < condition.precedence() {
                return false;
            }
            overlapping += 1;
        }
        overlapping > 0
    }

    /// Merges every effect property into `target`.
    ///
    /// # Errors
    ///
    /// [`MergeError::ImmutableConflict`] when an effect collides with an
    /// immutable property; the caller invalidates the candidate.
    pub fn apply(&self, target: &mut PropertyArray) -> Result<(), MergeError> {
        for property in self.properties.properties() {
            target.add(property.clone())?;
        }
        Ok(())
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} => {}",
            self.name, self.match_properties, self.properties
        )
    }
}

// ---------------------------------------------------------------------------
// RegisterError
// ---------------------------------------------------------------------------

/// Failure to register a policy.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterError {
    /// A policy with the same match conditions is already registered.
    DuplicateMatch {
        /// Name of the rejected policy.
        name: String,
        /// Name of the policy holding the match.
        existing: String,
    },
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::DuplicateMatch { name, existing } => {
                write!(
                    f,
                    "policy {name:?} duplicates the match conditions of {existing:?}"
                )
            }
        }
    }
}

impl std::error::Error for RegisterError {}

// ---------------------------------------------------------------------------
// Pib
// ---------------------------------------------------------------------------

/// An ordered collection of policies.
///
/// The list is kept stably sorted by ascending [`Policy::match_len`] after
/// every registration; lookup walks it front to back and fires *every*
/// matching policy, so later (narrower) policies see the properties written
/// by earlier (broader) ones.
#[derive(Debug, Clone, Default)]
pub struct Pib {
    policies: Vec<Policy>,
}

impl Pib {
    /// Creates an empty PIB.
    pub fn new() -> Pib {
        Pib::default()
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` when no policy is registered.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// The policies in evaluation order.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Registers a policy and re-sorts the evaluation order.
    ///
    /// # Errors
    ///
    /// [`RegisterError::DuplicateMatch`] when an already-registered policy
    /// has equal match conditions (same keys, values, and precedences); the
    /// new policy is dropped.
    pub fn register(&mut self, policy: Policy) -> Result<(), RegisterError> {
        if let Some(existing) = self
            .policies
            .iter()
            .find(|p| p.match_properties == policy.match_properties)
        {
            return Err(RegisterError::DuplicateMatch {
                name: policy.name,
                existing: existing.name.clone(),
            });
        }
        self.policies.push(policy);
        // stable: equal match_len keeps registration order
        self.policies.sort_by_key(Policy::match_len);
        Ok(())
    }

    /// Applies every matching policy to the candidate, recording the names
    /// of the policies that fired.
    ///
    /// A policy application that hits an immutable conflict marks the
    /// candidate invalid and stops the walk; the offending policy is still
    /// recorded for diagnosis.
    pub fn lookup(&self, candidate: &mut Candidate) {
        for policy in &self.policies {
            if !policy.compare(&candidate.properties, true) {
                continue;
            }
            match policy.apply(&mut candidate.properties) {
                Ok(()) => {
                    candidate.policies.insert(policy.name.clone());
                }
                Err(_) => {
                    candidate.policies.insert(policy.name.clone());
                    candidate.invalid = true;
                    return;
                }
            }
        }
    }

    /// Profile role: expands a request into one enriched variant per
    /// matching profile. When no profile matches (or every matching profile
    /// conflicts with the request), the original request is returned as the
    /// only variant.
    pub fn expand_request(&self, request: &PropertyArray) -> Vec<PropertyArray> {
        let mut variants = Vec::new();
        for profile in &self.policies {
            if !profile.compare(request, true) {
                continue;
            }
            let mut variant = request.clone();
            if profile.apply(&mut variant).is_ok() {
                variants.push(variant);
            }
        }
        if variants.is_empty() {
            variants.push(request.clone());
        }
        variants
    }
}
