//! On-disk repository loading.
//!
//! A repository is a directory of JSON files. CIB sources use the `.cib`,
//! `.local`, and `.connection` extensions; profile and policy PIBs use
//! `.profile` and `.policy`. Hidden files (`.` or `#` prefix) are ignored.
//! Files load in sorted name order so that two identical directories always
//! produce identical repositories. Every recoverable problem is reported as
//! a [`LoadWarning`] and skipped; only an unreadable directory is an error.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::slice;

use serde::Deserialize;

use crate::array::PropertyArray;
use crate::cib::{Cib, CibSource};
use crate::codec::{self, normalize_nonfinite};
use crate::diag::LoadWarning;
use crate::multi_array::PropertyMultiArray;
use crate::pib::{Pib, Policy, RegisterError};
use crate::property::{Precedence, Property};
use crate::value::Value;

/// File extensions that contain CIB sources.
pub const CIB_EXTENSIONS: &[&str] = &["cib", "local", "connection"];

/// File extension for the profile PIB (consumed before the CIB).
pub const PROFILE_EXTENSION: &str = "profile";

/// File extension for the policy PIB (consumed after the CIB).
pub const POLICY_EXTENSION: &str = "policy";

// ---------------------------------------------------------------------------
// File shells
// ---------------------------------------------------------------------------

/// JSON shell of a CIB source file. Property attributes stay raw because a
/// key may map to a single attribute object or a list of alternatives.
#[derive(Debug, Deserialize)]
struct CibSourceFile {
    id: String,
    #[serde(default)]
    root: bool,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "@next", default)]
    next: Vec<String>,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
}

/// The three precedence buckets of a policy's match or properties block.
#[derive(Debug, Default, Deserialize)]
struct PropertyBuckets {
    #[serde(default)]
    immutable: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    requested: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    informational: serde_json::Map<String, serde_json::Value>,
}

/// JSON shell of a policy or profile file.
#[derive(Debug, Deserialize)]
struct PolicyFile {
    name: String,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "match", default)]
    match_buckets: PropertyBuckets,
    #[serde(default)]
    properties: PropertyBuckets,
}

// ---------------------------------------------------------------------------
// Directory scanning
// ---------------------------------------------------------------------------

/// Collects the loadable files in `dir`: matching extension, not hidden,
/// sorted by path for deterministic load order.
fn scan_dir(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || name.starts_with('#') {
            continue;
        }
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !extensions.contains(&extension) || !path.is_file() {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Reads and JSON-decodes one repository file, with the non-finite token
/// rewrite applied first.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadWarning> {
    let text = fs::read_to_string(path).map_err(|e| LoadWarning::MalformedFile {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    serde_json::from_str(normalize_nonfinite(&text).as_ref()).map_err(|e| {
        LoadWarning::MalformedFile {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or_else(|| path.display().to_string(), ToOwned::to_owned)
}

// ---------------------------------------------------------------------------
// CIB loading
// ---------------------------------------------------------------------------

/// Loads every CIB source file in `dir` and validates the resulting
/// reference graph.
///
/// # Errors
///
/// Only when the directory itself cannot be read; all per-file and per-
/// property problems come back as warnings.
pub fn load_cib(dir: &Path) -> io::Result<(Cib, Vec<LoadWarning>)> {
    let mut cib = Cib::new();
    let mut warnings = Vec::new();

    for path in scan_dir(dir, CIB_EXTENSIONS)? {
        let file: CibSourceFile = match read_json(&path) {
            Ok(file) => file,
            Err(warning) => {
                warnings.push(warning);
                continue;
            }
        };
        if file.id.is_empty() {
            warnings.push(LoadWarning::MalformedFile {
                path: path.clone(),
                detail: "empty source id".to_owned(),
            });
            continue;
        }

        let label = file_label(&path);
        let mut properties = PropertyMultiArray::new();
        for (key, attrs) in &file.properties {
            // a key may carry one attribute object or a list of alternatives
            let alternatives: &[serde_json::Value] = match attrs {
                serde_json::Value::Array(list) => list.as_slice(),
                other => slice::from_ref(other),
            };
            for attrs in alternatives {
                match codec::decode_property(&label, key, attrs) {
                    Ok(property) => properties.add(property),
                    Err(warning) => warnings.push(warning),
                }
            }
        }

        let id = file.id.clone();
        let mut source = CibSource::new(file.id)
            .with_root(file.root)
            .with_priority(file.priority)
            .with_properties(properties)
            .with_refs(file.next);
        source.description = file.description;
        source.filename = Some(label);

        if cib.register(source).is_some() {
            warnings.push(LoadWarning::DuplicateSourceId { id, path });
        }
    }

    warnings.extend(cib.validate());
    Ok((cib, warnings))
}

// ---------------------------------------------------------------------------
// PIB loading
// ---------------------------------------------------------------------------

/// Decodes one precedence bucket into `target`.
///
/// Each entry is either a bare JSON value (shorthand) or an object
/// `{"value": V, "score"?: S}`; the precedence always comes from the bucket.
fn decode_bucket(
    label: &str,
    bucket: &serde_json::Map<String, serde_json::Value>,
    precedence: Precedence,
    target: &mut PropertyArray,
    warnings: &mut Vec<LoadWarning>,
) {
    for (key, raw) in bucket {
        let invalid = |detail: String| LoadWarning::InvalidProperty {
            context: label.to_owned(),
            key: key.clone(),
            detail,
        };

        let (raw_value, raw_score) = match raw.as_object() {
            Some(object) if object.contains_key("value") => {
                (object.get("value").unwrap_or(raw), object.get("score"))
            }
            Some(_) | None => (raw, None),
        };

        let value = match Value::from_json(raw_value) {
            Ok(value) => value,
            Err(e) => {
                warnings.push(invalid(e.to_string()));
                continue;
            }
        };
        let score = match raw_score {
            None => codec::DEFAULT_SCORE,
            Some(serde_json::Value::String(s)) if s == "NaN" => f64::NAN,
            Some(s) => match s.as_f64() {
                Some(score) => score,
                None => {
                    warnings.push(invalid(format!("invalid score {s}")));
                    continue;
                }
            },
        };

        let property = Property::new(key, value)
            .with_precedence(precedence)
            .with_score(score);
        if let Err(e) = target.add(property) {
            warnings.push(invalid(e.to_string()));
        }
    }
}

fn decode_buckets(
    label: &str,
    buckets: &PropertyBuckets,
    warnings: &mut Vec<LoadWarning>,
) -> PropertyArray {
    let mut array = PropertyArray::new();
    decode_bucket(
        label,
        &buckets.informational,
        Precedence::Informational,
        &mut array,
        warnings,
    );
    decode_bucket(
        label,
        &buckets.requested,
        Precedence::Requested,
        &mut array,
        warnings,
    );
    decode_bucket(
        label,
        &buckets.immutable,
        Precedence::Immutable,
        &mut array,
        warnings,
    );
    array
}

/// Loads every PIB file with the given extension from `dir`.
///
/// Pass [`PROFILE_EXTENSION`] for the pre-CIB profiles and
/// [`POLICY_EXTENSION`] for the post-CIB policies.
///
/// # Errors
///
/// Only when the directory itself cannot be read.
pub fn load_pib(dir: &Path, extension: &str) -> io::Result<(Pib, Vec<LoadWarning>)> {
    let mut pib = Pib::new();
    let mut warnings = Vec::new();

    for path in scan_dir(dir, &[extension])? {
        let file: PolicyFile = match read_json(&path) {
            Ok(file) => file,
            Err(warning) => {
                warnings.push(warning);
                continue;
            }
        };

        let label = file_label(&path);
        let match_properties = decode_buckets(&label, &file.match_buckets, &mut warnings);
        let properties = decode_buckets(&label, &file.properties, &mut warnings);

        let mut policy = Policy::new(file.name, match_properties, properties);
        policy.priority = file.priority;
        policy.description = file.description;
        policy.filename = Some(label);

        if let Err(RegisterError::DuplicateMatch { name, existing }) = pib.register(policy) {
            warnings.push(LoadWarning::DuplicatePolicyMatch {
                name,
                existing,
                path,
            });
        }
    }

    Ok((pib, warnings))
}
