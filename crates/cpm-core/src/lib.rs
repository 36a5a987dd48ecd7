#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod array;
pub mod candidate;
pub mod cib;
pub mod codec;
pub mod diag;
pub mod engine;
pub mod multi_array;
pub mod pib;
pub mod property;
pub mod repository;
pub mod value;

pub use array::PropertyArray;
pub use candidate::Candidate;
pub use cib::{Cib, CibEntry, CibSource, DEFAULT_CANDIDATES, Entries};
pub use codec::{
    DEFAULT_SCORE, DecodeError, decode_property, decode_request, encode_candidates,
    normalize_nonfinite, properties_to_json, property_to_json,
};
pub use diag::LoadWarning;
pub use engine::{DEFAULT_RESULTS, Engine};
pub use multi_array::PropertyMultiArray;
pub use pib::{Pib, Policy, RegisterError};
pub use property::{
    IMMUTABLE_CONFLICT_SCORE, MATCH_BONUS, MISMATCH_PENALTY, MergeError, Precedence, Property,
};
pub use repository::{
    CIB_EXTENSIONS, POLICY_EXTENSION, PROFILE_EXTENSION, load_cib, load_pib,
};
pub use value::{Value, ValueError};

/// Returns the current version of the cpm-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn version_is_semver() {
        let v = version();
        let parts: Vec<&str> = v.split('.').collect();
        assert_eq!(parts.len(), 3, "version should have 3 parts: {v}");
        for part in parts {
            part.parse::<u32>().expect("each part should be a number");
        }
    }
}
