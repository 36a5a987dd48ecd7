//! Structured warnings produced while decoding requests and loading
//! repositories.
//!
//! Every recoverable problem is skip-and-continue: the offending file or
//! property is dropped, a [`LoadWarning`] records what happened, and the
//! caller decides how to surface it (the daemon logs them at startup and per
//! request). Nothing here aborts a load or a lookup.
use std::fmt;
use std::path::PathBuf;

/// A recoverable problem found while loading a repository or decoding a
/// request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadWarning {
    /// A repository file could not be read or did not parse as JSON.
    MalformedFile {
        /// The offending file.
        path: PathBuf,
        /// Underlying parse or I/O error message.
        detail: String,
    },
    /// One property inside a request or repository file was unusable and was
    /// skipped.
    InvalidProperty {
        /// Where the property came from (file name or `"request"`).
        context: String,
        /// The property key.
        key: String,
        /// What was wrong with it.
        detail: String,
    },
    /// Two CIB files declare the same source id; the later file wins.
    DuplicateSourceId {
        /// The contested id.
        id: String,
        /// The file whose source displaced the earlier one.
        path: PathBuf,
    },
    /// A policy's match conditions duplicate an already-registered policy;
    /// the duplicate was dropped.
    DuplicatePolicyMatch {
        /// Name of the rejected policy.
        name: String,
        /// Name of the policy already holding this match.
        existing: String,
        /// The file the rejected policy came from.
        path: PathBuf,
    },
    /// A CIB source references an id that no loaded source declares.
    DanglingReference {
        /// The referencing source.
        source: String,
        /// The missing id.
        target: String,
    },
    /// A non-root CIB source is not reachable from any root and will never
    /// contribute to a candidate.
    UnreachableSource {
        /// The unreachable source id.
        id: String,
    },
    /// The CIB contains no root sources; every lookup will return nothing.
    NoRootSources,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::MalformedFile { path, detail } => {
                write!(f, "skipping {}: {detail}", path.display())
            }
            LoadWarning::InvalidProperty {
                context,
                key,
                detail,
            } => {
                write!(f, "{context}: skipping property {key:?}: {detail}")
            }
            LoadWarning::DuplicateSourceId { id, path } => {
                write!(
                    f,
                    "duplicate CIB source id {id:?}: keeping the one from {}",
                    path.display()
                )
            }
            LoadWarning::DuplicatePolicyMatch {
                name,
                existing,
                path,
            } => {
                write!(
                    f,
                    "policy {name:?} from {} duplicates the match of {existing:?}; dropped",
                    path.display()
                )
            }
            LoadWarning::DanglingReference { source, target } => {
                write!(f, "CIB source {source:?} references unknown id {target:?}")
            }
            LoadWarning::UnreachableSource { id } => {
                write!(f, "CIB source {id:?} is not reachable from any root")
            }
            LoadWarning::NoRootSources => f.write_str("CIB has no root sources"),
        }
    }
}
