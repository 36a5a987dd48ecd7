//! Property values: scalars and closed numeric intervals.
//!
//! A [`Value`] is either a singleton (string, boolean, finite number) or a
//! closed interval `[lo, hi]` with possibly infinite bounds. The overlap
//! relation implemented by [`Value::intersection`] is the foundation of the
//! whole property algebra: property merge, policy matching, and CIB entry
//! joining all reduce to it.
use std::fmt;

// ---------------------------------------------------------------------------
// ValueError
// ---------------------------------------------------------------------------

/// Errors produced while constructing or comparing a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValueError {
    /// A range was compared against a value that is neither a number nor a
    /// range.
    NotNumeric {
        /// Display form of the offending value.
        value: String,
    },
    /// Interval bounds are inverted (`lo > hi`) or not finite real numbers
    /// where required.
    InvalidRange {
        /// Lower bound as given.
        lo: f64,
        /// Upper bound as given.
        hi: f64,
    },
    /// The JSON shape does not describe any supported value.
    Malformed {
        /// Human-readable description of the problem.
        detail: String,
    },
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::NotNumeric { value } => {
                write!(f, "value {value:?} is not numeric")
            }
            ValueError::InvalidRange { lo, hi } => {
                write!(f, "invalid range [{lo}, {hi}]")
            }
            ValueError::Malformed { detail } => {
                write!(f, "malformed value: {detail}")
            }
        }
    }
}

impl std::error::Error for ValueError {}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A property value: a singleton scalar or a closed numeric interval.
///
/// Ranges always hold `lo <= hi`; a range whose bounds coincide is collapsed
/// to [`Value::Number`] at construction time, so `Range` is never degenerate.
/// Structural equality (`==`) is used for deduplication and duplicate-policy
/// detection; the *overlap* relation lives in [`Value::intersection`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean singleton.
    Boolean(bool),
    /// Numeric singleton. Never NaN; infinities are permitted.
    Number(f64),
    /// String singleton.
    Text(String),
    /// Closed interval `[lo, hi]` with `lo < hi`; bounds may be infinite.
    Range {
        /// Inclusive lower bound.
        lo: f64,
        /// Inclusive upper bound.
        hi: f64,
    },
}

impl Value {
    /// Builds a range value, collapsing a degenerate interval to a scalar.
    ///
    /// # Errors
    ///
    /// [`ValueError::InvalidRange`] when `lo > hi` or either bound is NaN.
    pub fn range(lo: f64, hi: f64) -> Result<Value, ValueError> {
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(ValueError::InvalidRange { lo, hi });
        }
        if lo == hi {
            Ok(Value::Number(lo))
        } else {
            Ok(Value::Range { lo, hi })
        }
    }

    /// Converts a decoded JSON value into a [`Value`].
    ///
    /// Accepted shapes:
    /// - JSON string, boolean, or number;
    /// - a two-element array `[lo, hi]`;
    /// - an object `{"start": lo, "end": hi}`.
    ///
    /// The spellings `"Infinity"` and `"-Infinity"` are accepted wherever a
    /// number is expected (the wire codec rewrites bare non-finite tokens to
    /// these strings before JSON parsing).
    ///
    /// # Errors
    ///
    /// [`ValueError::InvalidRange`] for inverted ranges,
    /// [`ValueError::NotNumeric`] for non-numeric range bounds, and
    /// [`ValueError::Malformed`] for unsupported shapes.
    pub fn from_json(json: &serde_json::Value) -> Result<Value, ValueError> {
        match json {
            serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
            serde_json::Value::Number(n) => {
                let f = n.as_f64().ok_or_else(|| ValueError::Malformed {
                    detail: format!("number {n} does not fit in an f64"),
                })?;
                Ok(Value::Number(f))
            }
            serde_json::Value::String(s) => match nonfinite_from_str(s) {
                Some(f) if f.is_nan() => Err(ValueError::Malformed {
                    detail: "NaN is not a usable property value".to_owned(),
                }),
                Some(f) => Ok(Value::Number(f)),
                None => Ok(Value::Text(s.clone())),
            },
            serde_json::Value::Array(items) => {
                if items.len() != 2 {
                    return Err(ValueError::Malformed {
                        detail: format!("range array has {} elements, expected 2", items.len()),
                    });
                }
                Value::range(bound_from_json(&items[0])?, bound_from_json(&items[1])?)
            }
            serde_json::Value::Object(map) => {
                let lo = map.get("start").ok_or_else(|| ValueError::Malformed {
                    detail: "range object is missing \"start\"".to_owned(),
                })?;
                let hi = map.get("end").ok_or_else(|| ValueError::Malformed {
                    detail: "range object is missing \"end\"".to_owned(),
                })?;
                Value::range(bound_from_json(lo)?, bound_from_json(hi)?)
            }
            serde_json::Value::Null => Err(ValueError::Malformed {
                detail: "null is not a property value".to_owned(),
            }),
        }
    }

    /// Serialises this value back to JSON.
    ///
    /// Non-finite numbers cannot be represented in strict JSON, so they are
    /// emitted as the quoted spellings `"Infinity"` / `"-Infinity"`, the same
    /// forms the decoder accepts.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(f) => number_to_json(*f),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Range { lo, hi } => {
                serde_json::Value::Array(vec![number_to_json(*lo), number_to_json(*hi)])
            }
        }
    }

    /// Returns the `[lo, hi]` interval view for numeric values; scalars are
    /// treated as point intervals. `None` for booleans and strings.
    fn as_interval(&self) -> Option<(f64, f64)> {
        match self {
            Value::Number(f) => Some((*f, *f)),
            Value::Range { lo, hi } => Some((*lo, *hi)),
            Value::Boolean(_) | Value::Text(_) => None,
        }
    }

    /// Computes the overlap of two values.
    ///
    /// - scalar vs. scalar: exact match, returning a clone of the value;
    /// - numeric pairings: interval intersection, collapsed to a scalar when
    ///   the bounds coincide;
    /// - any pairing of a range with a boolean or string fails.
    ///
    /// Returns `Ok(None)` when the values simply do not overlap.
    ///
    /// # Errors
    ///
    /// [`ValueError::NotNumeric`] when a range is compared against a
    /// non-numeric scalar.
    pub fn intersection(&self, other: &Value) -> Result<Option<Value>, ValueError> {
        match (self.as_interval(), other.as_interval()) {
            (Some((slo, shi)), Some((olo, ohi))) => {
                if olo > shi || ohi < slo {
                    return Ok(None);
                }
                Ok(Some(Value::Range {
                    lo: slo.max(olo),
                    hi: shi.min(ohi),
                }
                .collapsed()))
            }
            (None, None) => {
                if self == other {
                    Ok(Some(self.clone()))
                } else {
                    Ok(None)
                }
            }
            (Some(_), None) | (None, Some(_)) => {
                if matches!(self, Value::Range { .. }) || matches!(other, Value::Range { .. }) {
                    let scalar = if self.as_interval().is_none() {
                        self
                    } else {
                        other
                    };
                    Err(ValueError::NotNumeric {
                        value: scalar.to_string(),
                    })
                } else {
                    // number vs. bool/string: plain inequality, no overlap
                    Ok(None)
                }
            }
        }
    }

    /// Returns `true` when the two values overlap (ignoring type-mismatch
    /// failures, which count as "no overlap").
    pub fn overlaps(&self, other: &Value) -> bool {
        matches!(self.intersection(other), Ok(Some(_)))
    }

    fn collapsed(self) -> Value {
        match self {
            Value::Range { lo, hi } if lo == hi => Value::Number(lo),
            Value::Boolean(_) | Value::Number(_) | Value::Text(_) | Value::Range { .. } => self,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Range { lo, hi } => write!(f, "{lo}-{hi}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Number(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_owned())
    }
}

/// Parses the quoted non-finite spellings used on the wire.
fn nonfinite_from_str(s: &str) -> Option<f64> {
    match s {
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => None,
    }
}

/// Decodes one interval bound: a JSON number or a non-finite spelling.
fn bound_from_json(json: &serde_json::Value) -> Result<f64, ValueError> {
    match json {
        serde_json::Value::Number(n) => n.as_f64().ok_or_else(|| ValueError::Malformed {
            detail: format!("number {n} does not fit in an f64"),
        }),
        serde_json::Value::String(s) => match nonfinite_from_str(s) {
            Some(f) if !f.is_nan() => Ok(f),
            Some(_) | None => Err(ValueError::NotNumeric { value: s.clone() }),
        },
        serde_json::Value::Null
        | serde_json::Value::Bool(_)
        | serde_json::Value::Array(_)
        | serde_json::Value::Object(_) => Err(ValueError::NotNumeric {
            value: json.to_string(),
        }),
    }
}

/// Serialises one f64, falling back to the quoted spellings for values a JSON
/// number cannot carry.
fn number_to_json(f: f64) -> serde_json::Value {
    match serde_json::Number::from_f64(f) {
        Some(n) => serde_json::Value::Number(n),
        None if f == f64::INFINITY => serde_json::Value::String("Infinity".to_owned()),
        None if f == f64::NEG_INFINITY => serde_json::Value::String("-Infinity".to_owned()),
        None => serde_json::Value::String("NaN".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use serde_json::json;

    use super::*;

    fn value(json: serde_json::Value) -> Value {
        Value::from_json(&json).expect("valid value")
    }

    #[test]
    fn range_collapses_degenerate_interval() {
        assert_eq!(Value::range(5.0, 5.0), Ok(Value::Number(5.0)));
    }

    #[test]
    fn range_rejects_inverted_bounds() {
        assert_eq!(
            Value::range(9.0, 1.0),
            Err(ValueError::InvalidRange { lo: 9.0, hi: 1.0 })
        );
    }

    #[test]
    fn from_json_scalars() {
        assert_eq!(value(json!("TCP")), Value::Text("TCP".to_owned()));
        assert_eq!(value(json!(true)), Value::Boolean(true));
        assert_eq!(value(json!(1500)), Value::Number(1500.0));
    }

    #[test]
    fn from_json_range_array() {
        assert_eq!(
            value(json!([100, 9000])),
            Value::Range {
                lo: 100.0,
                hi: 9000.0
            }
        );
    }

    #[test]
    fn from_json_range_object() {
        assert_eq!(
            value(json!({"start": 50, "end": 1000})),
            Value::Range {
                lo: 50.0,
                hi: 1000.0
            }
        );
    }

    #[test]
    fn from_json_infinite_bound() {
        assert_eq!(
            value(json!([1500, "Infinity"])),
            Value::Range {
                lo: 1500.0,
                hi: f64::INFINITY
            }
        );
    }

    #[test]
    fn from_json_rejects_text_bound() {
        let err = Value::from_json(&json!(["low", 9000])).expect_err("non-numeric bound");
        assert!(matches!(err, ValueError::NotNumeric { .. }));
    }

    #[test]
    fn from_json_rejects_null_and_odd_arrays() {
        assert!(Value::from_json(&json!(null)).is_err());
        assert!(Value::from_json(&json!([1, 2, 3])).is_err());
        assert!(Value::from_json(&json!({"start": 1})).is_err());
    }

    #[test]
    fn scalar_intersection_is_exact_match() {
        let tcp = Value::from("TCP");
        assert_eq!(tcp.intersection(&Value::from("TCP")), Ok(Some(tcp.clone())));
        assert_eq!(tcp.intersection(&Value::from("UDP")), Ok(None));
    }

    #[test]
    fn number_in_range() {
        let range = value(json!([100, 1000]));
        assert_eq!(
            range.intersection(&Value::Number(500.0)),
            Ok(Some(Value::Number(500.0)))
        );
        assert_eq!(range.intersection(&Value::Number(5000.0)), Ok(None));
    }

    #[test]
    fn range_intersection_returns_subrange() {
        let a = value(json!([1000, 9000]));
        let b = value(json!([1500, "Infinity"]));
        let expected = Value::Range {
            lo: 1500.0,
            hi: 9000.0,
        };
        assert_eq!(a.intersection(&b), Ok(Some(expected.clone())));
        assert_eq!(b.intersection(&a), Ok(Some(expected)));
    }

    #[test]
    fn touching_ranges_collapse_to_scalar() {
        let a = value(json!([100, 1000]));
        let b = value(json!([1000, 9000]));
        assert_eq!(a.intersection(&b), Ok(Some(Value::Number(1000.0))));
    }

    #[test]
    fn range_against_text_is_not_numeric() {
        let range = value(json!([100, 1000]));
        let err = range
            .intersection(&Value::from("fast"))
            .expect_err("range vs text");
        assert!(matches!(err, ValueError::NotNumeric { .. }));
    }

    #[test]
    fn number_against_text_is_plain_mismatch() {
        assert_eq!(
            Value::Number(42.0).intersection(&Value::from("42")),
            Ok(None)
        );
    }

    #[test]
    fn to_json_round_trips_finite_values() {
        for v in [
            Value::Boolean(false),
            Value::Number(9000.0),
            Value::Text("TCP".to_owned()),
            Value::Range {
                lo: 100.0,
                hi: 1000.0,
            },
        ] {
            let back = Value::from_json(&v.to_json()).expect("round trip");
            assert_eq!(v, back);
        }
    }

    #[test]
    fn to_json_spells_out_infinity() {
        let v = Value::Range {
            lo: 1500.0,
            hi: f64::INFINITY,
        };
        assert_eq!(v.to_json(), json!([1500.0, "Infinity"]));
        assert_eq!(Value::from_json(&v.to_json()).expect("round trip"), v);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::from("TCP").to_string(), "TCP");
        assert_eq!(Value::Number(42.0).to_string(), "42");
        assert_eq!(
            Value::Range {
                lo: 100.0,
                hi: 1000.0
            }
            .to_string(),
            "100-1000"
        );
    }
}
