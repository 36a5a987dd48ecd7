//! Properties and the three-level precedence merge.
//!
//! A [`Property`] is a `(key, value, precedence, score, evaluated, weight)`
//! record. [`Property::update`] implements the five-case merge decision table
//! that drives request joining, CIB path merging, and policy application.
use std::fmt;

use crate::value::{Value, ValueError};

// ---------------------------------------------------------------------------
// Scoring knobs
// ---------------------------------------------------------------------------

/// Score increment when a merge confirms an already-satisfied property.
pub const MATCH_BONUS: f64 = 1.0;

/// Score increment when an equal-or-higher precedence merge overrides a
/// conflicting value.
pub const MISMATCH_PENALTY: f64 = -1.0;

/// Score stamped on a property when two immutable values conflict. Large
/// enough to sink any candidate below every viable one.
pub const IMMUTABLE_CONFLICT_SCORE: f64 = -9999.0;

// ---------------------------------------------------------------------------
// Precedence
// ---------------------------------------------------------------------------

/// Importance level of a property, totally ordered.
///
/// An `Immutable` property must hold, a `Requested` property should hold, an
/// `Informational` property is a hint. On the wire these are the integers
/// 2, 1, and 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Precedence {
    /// A hint; lowest level (wire value 0).
    Informational,
    /// The default request level (wire value 1).
    #[default]
    Requested,
    /// Must hold; conflicts between two immutable values are fatal for a
    /// candidate (wire value 2).
    Immutable,
}

impl Precedence {
    /// Decodes the wire integer 0/1/2.
    pub fn from_number(n: u64) -> Option<Precedence> {
        match n {
            0 => Some(Precedence::Informational),
            1 => Some(Precedence::Requested),
            2 => Some(Precedence::Immutable),
            _ => None,
        }
    }

    /// Returns the wire integer for this level.
    pub fn as_number(self) -> u64 {
        match self {
            Precedence::Informational => 0,
            Precedence::Requested => 1,
            Precedence::Immutable => 2,
        }
    }
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precedence::Informational => f.write_str("informational"),
            Precedence::Requested => f.write_str("requested"),
            Precedence::Immutable => f.write_str("immutable"),
        }
    }
}

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// Failure modes of a property merge.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeError {
    /// The two properties do not share a key. The merge is a no-op; callers
    /// that maintain the one-property-per-key invariant never see this.
    KeyMismatch {
        /// Key of the property being updated.
        expected: String,
        /// Key of the incoming property.
        found: String,
    },
    /// Both properties are immutable and their values do not overlap. The
    /// candidate carrying the merged array must be discarded.
    ImmutableConflict {
        /// The contested key.
        key: String,
        /// Value held before the merge.
        current: Value,
        /// The incoming value.
        incoming: Value,
    },
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::KeyMismatch { expected, found } => {
                write!(f, "cannot merge key {found:?} into property {expected:?}")
            }
            MergeError::ImmutableConflict {
                key,
                current,
                incoming,
            } => {
                write!(
                    f,
                    "immutable property {key:?}: {current} conflicts with {incoming}"
                )
            }
        }
    }
}

impl std::error::Error for MergeError {}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// A single connection property.
///
/// `score` starts as NaN ("never evaluated") and is normalised to a real
/// number the first time the property participates in a merge. `evaluated`
/// records whether a lookup touched the property; only evaluated properties
/// contribute to a candidate's score.
#[derive(Debug, Clone)]
pub struct Property {
    key: String,
    value: Value,
    precedence: Precedence,
    score: f64,
    evaluated: bool,
    weight: f64,
}

impl Property {
    /// Creates a requested-level property with an unevaluated (NaN) score.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Property {
        Property {
            key: key.into(),
            value: value.into(),
            precedence: Precedence::Requested,
            score: f64::NAN,
            evaluated: false,
            weight: 1.0,
        }
    }

    /// Sets the precedence level.
    #[must_use]
    pub fn with_precedence(mut self, precedence: Precedence) -> Property {
        self.precedence = precedence;
        self
    }

    /// Sets the initial score.
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Property {
        self.score = score;
        self
    }

    /// Sets the score weight applied to match bonuses.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Property {
        self.weight = weight;
        self
    }

    /// Returns the property key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the current value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the precedence level.
    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Returns the current score (NaN when never evaluated).
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Returns whether a lookup has touched this property.
    pub fn evaluated(&self) -> bool {
        self.evaluated
    }

    /// Returns the score weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns `true` when `other` carries the same `(key, value, precedence)`
    /// triple. This is the deduplication relation used by multi-arrays and by
    /// duplicate-policy detection; score and evaluation state are ignored.
    pub fn same_definition(&self, other: &Property) -> bool {
        self.key == other.key && self.value == other.value && self.precedence == other.precedence
    }

    /// Computes the value overlap with another property of the same key.
    ///
    /// # Errors
    ///
    /// [`ValueError::NotNumeric`] when a range meets a non-numeric scalar.
    pub fn overlap(&self, other: &Property) -> Result<Option<Value>, ValueError> {
        if self.key != other.key {
            return Ok(None);
        }
        self.value.intersection(&other.value)
    }

    /// Merges `other` into `self`, per the precedence decision table:
    ///
    /// 1. `other` at equal or higher precedence (not both immutable): adopt
    ///    `other`'s value (narrowed to the overlap when the values overlap
    ///    numerically) and precedence; score +1 on agreement, −1 on override.
    /// 2. both immutable, values conflict: score pinned to
    ///    [`IMMUTABLE_CONFLICT_SCORE`] and the merge fails.
    /// 3. both immutable, values overlap: score +1, value unchanged.
    /// 4. `other` at lower precedence, values conflict: keep the value,
    ///    subtract `other`'s score.
    /// 5. `other` at lower precedence, values overlap: narrow the value to
    ///    the overlap, add `other`'s score.
    ///
    /// The property is marked evaluated and a NaN score is normalised to 0
    /// before the table is applied. A comparison that fails with
    /// [`ValueError::NotNumeric`] counts as "values conflict" so that a
    /// type-confused repository entry degrades the score instead of aborting
    /// the lookup.
    ///
    /// # Errors
    ///
    /// [`MergeError::KeyMismatch`] when the keys differ (state untouched);
    /// [`MergeError::ImmutableConflict`] for case 2.
    pub fn update(&mut self, other: &Property) -> Result<(), MergeError> {
        if self.key != other.key {
            return Err(MergeError::KeyMismatch {
                expected: self.key.clone(),
                found: other.key.clone(),
            });
        }

        self.evaluated = true;
        if self.score.is_nan() {
            self.score = 0.0;
        }

        let overlap = self.overlap(other).unwrap_or(None);
        let both_immutable = self.precedence == Precedence::Immutable
            && other.precedence == Precedence::Immutable;

        if other.precedence >= self.precedence && !both_immutable {
            match overlap {
                Some(narrowed) => {
                    self.value = narrowed;
                    self.score += MATCH_BONUS * self.weight;
                }
                None => {
                    self.value = other.value.clone();
                    self.score += MISMATCH_PENALTY;
                }
            }
            self.precedence = other.precedence;
        } else if both_immutable {
            match overlap {
                Some(_) => self.score += MATCH_BONUS * self.weight,
                None => {
                    self.score = IMMUTABLE_CONFLICT_SCORE;
                    return Err(MergeError::ImmutableConflict {
                        key: self.key.clone(),
                        current: self.value.clone(),
                        incoming: other.value.clone(),
                    });
                }
            }
        } else {
            // a never-evaluated other contributes nothing either way
            let other_score = if other.score.is_nan() { 0.0 } else { other.score };
            match overlap {
                Some(narrowed) => {
                    self.value = narrowed;
                    self.score += other_score;
                }
                None => self.score -= other_score,
            }
        }

        Ok(())
    }

    /// Returns a merged clone, leaving `self` untouched.
    ///
    /// # Errors
    ///
    /// Propagates [`Property::update`] failures.
    pub fn merged(&self, other: &Property) -> Result<Property, MergeError> {
        let mut clone = self.clone();
        clone.update(other)?;
        Ok(clone)
    }
}

impl PartialEq for Property {
    /// Equality is [`Property::same_definition`]: score, weight, and the
    /// evaluated flag are transient lookup state and do not participate.
    fn eq(&self, other: &Property) -> bool {
        self.same_definition(other)
    }
}

impl fmt::Display for Property {
    /// Bracketed notation: `[key|val]` immutable, `(key|val)` requested,
    /// `<key|val>` informational, with a signed score suffix once evaluated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = match self.precedence {
            Precedence::Immutable => ('[', ']'),
            Precedence::Requested => ('(', ')'),
            Precedence::Informational => ('<', '>'),
        };
        write!(f, "{open}{}|{}{close}", self.key, self.value)?;
        if !self.score.is_nan() {
            write!(f, "{:+.1}", self.score)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    fn requested(key: &str, value: impl Into<Value>) -> Property {
        Property::new(key, value).with_score(1.0)
    }

    fn immutable(key: &str, value: impl Into<Value>) -> Property {
        Property::new(key, value)
            .with_precedence(Precedence::Immutable)
            .with_score(1.0)
    }

    fn range(lo: f64, hi: f64) -> Value {
        Value::range(lo, hi).expect("valid range")
    }

    #[test]
    fn precedence_is_totally_ordered() {
        assert!(Precedence::Informational < Precedence::Requested);
        assert!(Precedence::Requested < Precedence::Immutable);
    }

    #[test]
    fn precedence_wire_numbers_round_trip() {
        for p in [
            Precedence::Informational,
            Precedence::Requested,
            Precedence::Immutable,
        ] {
            assert_eq!(Precedence::from_number(p.as_number()), Some(p));
        }
        assert_eq!(Precedence::from_number(3), None);
    }

    #[test]
    fn key_mismatch_is_a_no_op() {
        let mut p = requested("MTU", 1500.0);
        let err = p
            .update(&requested("transport", "TCP"))
            .expect_err("key mismatch");
        assert!(matches!(err, MergeError::KeyMismatch { .. }));
        assert_eq!(*p.value(), Value::Number(1500.0));
        assert!(!p.evaluated());
    }

    #[test]
    fn update_marks_evaluated_and_normalises_nan_score() {
        let mut p = Property::new("transport", "TCP");
        assert!(p.score().is_nan());
        p.update(&requested("transport", "TCP")).expect("merge");
        assert!(p.evaluated());
        assert_eq!(p.score(), MATCH_BONUS);
    }

    #[test]
    fn equal_precedence_agreement_narrows_and_rewards() {
        let mut p = requested("MTU", range(1000.0, 9000.0));
        p.update(&requested("MTU", range(1500.0, f64::INFINITY)))
            .expect("merge");
        assert_eq!(*p.value(), range(1500.0, 9000.0));
        assert_eq!(p.score(), 1.0 + MATCH_BONUS);
    }

    #[test]
    fn higher_precedence_conflict_overrides_with_penalty() {
        let mut p = Property::new("transport", "TCP")
            .with_precedence(Precedence::Informational)
            .with_score(1.0);
        p.update(&immutable("transport", "UDP")).expect("merge");
        assert_eq!(*p.value(), Value::Text("UDP".to_owned()));
        assert_eq!(p.precedence(), Precedence::Immutable);
        assert_eq!(p.score(), 1.0 + MISMATCH_PENALTY);
    }

    #[test]
    fn immutable_conflict_fails_and_stamps_score() {
        let mut p = immutable("transport", "UDP");
        let err = p
            .update(&immutable("transport", "TCP"))
            .expect_err("immutable conflict");
        assert!(matches!(err, MergeError::ImmutableConflict { .. }));
        assert_eq!(p.score(), IMMUTABLE_CONFLICT_SCORE);
        // value must not change
        assert_eq!(*p.value(), Value::Text("UDP".to_owned()));
    }

    #[test]
    fn immutable_agreement_is_rewarded() {
        let mut p = immutable("MTU", range(1000.0, 9000.0));
        p.update(&immutable("MTU", 2000.0)).expect("merge");
        assert_eq!(p.score(), 1.0 + MATCH_BONUS);
        // case 3 leaves the value untouched
        assert_eq!(*p.value(), range(1000.0, 9000.0));
    }

    #[test]
    fn lower_precedence_conflict_subtracts_other_score() {
        let mut p = immutable("MTU", 9000.0).with_score(2.0);
        p.update(&requested("MTU", 100.0).with_score(0.5))
            .expect("merge");
        assert_eq!(*p.value(), Value::Number(9000.0));
        assert_eq!(p.score(), 1.5);
    }

    #[test]
    fn lower_precedence_overlap_narrows_and_adds_other_score() {
        let mut p = immutable("MTU", range(1000.0, 9000.0)).with_score(2.0);
        p.update(&requested("MTU", range(0.0, 2000.0)).with_score(0.5))
            .expect("merge");
        assert_eq!(*p.value(), range(1000.0, 2000.0));
        assert_eq!(p.score(), 2.5);
    }

    #[test]
    fn type_confused_comparison_counts_as_conflict() {
        let mut p = requested("MTU", range(1000.0, 9000.0));
        p.update(&requested("MTU", "jumbo")).expect("merge");
        // case 1 with a conflict: adopt the other value, take the penalty
        assert_eq!(*p.value(), Value::Text("jumbo".to_owned()));
        assert_eq!(p.score(), 1.0 + MISMATCH_PENALTY);
    }

    #[test]
    fn merged_leaves_original_untouched() {
        let p = requested("MTU", range(1000.0, 9000.0));
        let merged = p
            .merged(&requested("MTU", range(1500.0, 2000.0)))
            .expect("merge");
        assert_eq!(*p.value(), range(1000.0, 9000.0));
        assert_eq!(*merged.value(), range(1500.0, 2000.0));
    }

    #[test]
    fn same_definition_ignores_score_and_evaluation() {
        let a = requested("MTU", 1500.0).with_score(3.0);
        let b = requested("MTU", 1500.0);
        assert!(a.same_definition(&b));
        assert!(!a.same_definition(&immutable("MTU", 1500.0)));
    }

    #[test]
    fn display_uses_bracketed_notation() {
        assert_eq!(
            immutable("transport", "TCP").to_string(),
            "[transport|TCP]+1.0"
        );
        assert_eq!(Property::new("MTU", 1500.0).to_string(), "(MTU|1500)");
        assert_eq!(
            Property::new("ttl", 64.0)
                .with_precedence(Precedence::Informational)
                .with_score(0.0)
                .to_string(),
            "<ttl|64>+0.0"
        );
    }
}
