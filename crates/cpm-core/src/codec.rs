//! Wire codec: request decoding and candidate encoding.
//!
//! Requests arrive as a JSON object mapping keys to property attribute
//! objects. Clients historically emit the bare tokens `Infinity`,
//! `-Infinity`, and `NaN`, which strict JSON parsers reject;
//! [`normalize_nonfinite`] rewrites those tokens to quoted spellings before
//! the document reaches `serde_json`, and [`crate::value::Value`] understands
//! the quoted forms. Responses take the symmetric route: non-finite numbers
//! are emitted as the quoted spellings.
use std::borrow::Cow;
use std::fmt;

use crate::array::PropertyArray;
use crate::candidate::Candidate;
use crate::diag::LoadWarning;
use crate::property::{Precedence, Property};
use crate::value::Value;

/// Default score assigned to properties that do not carry one.
pub const DEFAULT_SCORE: f64 = 1.0;

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// A request document that could not be decoded at all.
///
/// Per-property problems are *not* errors; they surface as
/// [`LoadWarning::InvalidProperty`] and the property is skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The bytes are not a JSON document.
    MalformedJson {
        /// Parser error message.
        detail: String,
    },
    /// The document parsed but is not a JSON object.
    NotAnObject,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MalformedJson { detail } => write!(f, "malformed JSON: {detail}"),
            DecodeError::NotAnObject => f.write_str("request is not a JSON object"),
        }
    }
}

impl std::error::Error for DecodeError {}

// ---------------------------------------------------------------------------
// Lenient JSON
// ---------------------------------------------------------------------------

/// Rewrites the bare non-finite tokens `Infinity`, `-Infinity`, and `NaN`
/// (outside string literals) to their quoted spellings so the document can
/// be parsed by a strict JSON parser.
///
/// Returns the input unchanged when no rewrite is needed.
pub fn normalize_nonfinite(input: &str) -> Cow<'_, str> {
    if !input.contains("Infinity") && !input.contains("NaN") {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 8);
    let mut chars = input.char_indices();
    let mut in_string = false;
    let mut escaped = false;

    while let Some((index, c)) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push('"');
            continue;
        }

        let rest = &input[index..];
        let token = ["-Infinity", "Infinity", "NaN"]
            .into_iter()
            .find(|&t| rest.starts_with(t));
        match token {
            Some(token) => {
                out.push('"');
                out.push_str(token);
                out.push('"');
                // the tokens are ASCII, so chars and bytes advance in step
                for _ in 1..token.len() {
                    chars.next();
                }
            }
            None => out.push(c),
        }
    }

    Cow::Owned(out)
}

// ---------------------------------------------------------------------------
// Property decoding
// ---------------------------------------------------------------------------

/// Decodes one `{"value": V, "precedence"?: P, "score"?: S}` attribute
/// object into a property.
///
/// # Errors
///
/// [`LoadWarning::InvalidProperty`] describing why the property is unusable;
/// the caller logs it and skips the property.
pub fn decode_property(
    context: &str,
    key: &str,
    attrs: &serde_json::Value,
) -> Result<Property, LoadWarning> {
    let invalid = |detail: String| LoadWarning::InvalidProperty {
        context: context.to_owned(),
        key: key.to_owned(),
        detail,
    };

    let object = attrs
        .as_object()
        .ok_or_else(|| invalid(format!("expected an attribute object, got {attrs}")))?;
    let raw_value = object
        .get("value")
        .ok_or_else(|| invalid("missing \"value\"".to_owned()))?;
    let value = Value::from_json(raw_value).map_err(|e| invalid(e.to_string()))?;

    let precedence = match object.get("precedence") {
        None => Precedence::Requested,
        Some(p) => p
            .as_u64()
            .and_then(Precedence::from_number)
            .ok_or_else(|| invalid(format!("invalid precedence {p}")))?,
    };

    let score = match object.get("score") {
        None => DEFAULT_SCORE,
        Some(serde_json::Value::String(s)) if s == "NaN" => f64::NAN,
        Some(s) => s
            .as_f64()
            .ok_or_else(|| invalid(format!("invalid score {s}")))?,
    };

    Ok(Property::new(key, value)
        .with_precedence(precedence)
        .with_score(score))
}

// ---------------------------------------------------------------------------
// Request decoding
// ---------------------------------------------------------------------------

/// Decodes a request document into a property array.
///
/// Unusable properties are skipped and reported in the returned warning
/// list; a duplicate-key merge that hits an immutable conflict is likewise
/// downgraded to a warning (JSON objects cannot carry duplicate keys, so
/// this only guards hand-built documents).
///
/// # Errors
///
/// [`DecodeError`] when the document as a whole is unusable.
pub fn decode_request(input: &str) -> Result<(PropertyArray, Vec<LoadWarning>), DecodeError> {
    let normalized = normalize_nonfinite(input);
    let document: serde_json::Value = serde_json::from_str(normalized.as_ref())
        .map_err(|e| DecodeError::MalformedJson {
            detail: e.to_string(),
        })?;
    let object = document.as_object().ok_or(DecodeError::NotAnObject)?;

    let mut properties = PropertyArray::new();
    let mut warnings = Vec::new();
    for (key, attrs) in object {
        match decode_property("request", key, attrs) {
            Ok(property) => {
                if let Err(e) = properties.add(property) {
                    warnings.push(LoadWarning::InvalidProperty {
                        context: "request".to_owned(),
                        key: key.clone(),
                        detail: e.to_string(),
                    });
                }
            }
            Err(warning) => warnings.push(warning),
        }
    }
    Ok((properties, warnings))
}

// ---------------------------------------------------------------------------
// Candidate encoding
// ---------------------------------------------------------------------------

/// Serialises one property as its wire attribute object.
///
/// A NaN score (never evaluated) is omitted, matching the original JSON
/// export behaviour.
pub fn property_to_json(property: &Property) -> serde_json::Value {
    let mut attrs = serde_json::Map::new();
    attrs.insert("value".to_owned(), property.value().to_json());
    attrs.insert(
        "precedence".to_owned(),
        serde_json::Value::from(property.precedence().as_number()),
    );
    if let Some(score) = serde_json::Number::from_f64(property.score()) {
        attrs.insert("score".to_owned(), serde_json::Value::Number(score));
    }
    attrs.insert(
        "evaluated".to_owned(),
        serde_json::Value::Bool(property.evaluated()),
    );
    serde_json::Value::Object(attrs)
}

/// Serialises a property array as a wire object (`key → attributes`).
pub fn properties_to_json(properties: &PropertyArray) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for property in properties.properties() {
        object.insert(property.key().to_owned(), property_to_json(property));
    }
    serde_json::Value::Object(object)
}

/// Serialises ranked candidates as the response document: a JSON array of
/// per-candidate property objects, already sorted by descending score.
pub fn encode_candidates(candidates: &[Candidate]) -> String {
    let document = serde_json::Value::Array(
        candidates
            .iter()
            .map(|c| properties_to_json(&c.properties))
            .collect(),
    );
    document.to_string()
}
