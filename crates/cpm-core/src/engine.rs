//! The three-stage lookup pipeline: Profiles → CIB → Policies.
use crate::array::PropertyArray;
use crate::candidate::Candidate;
use crate::cib::{self, Cib};
use crate::pib::Pib;

/// Default number of candidates a pipeline lookup returns.
pub const DEFAULT_RESULTS: usize = 10;

/// The loaded decision engine.
///
/// All three repositories are read-only after construction; every lookup
/// works on clones, so a single engine can serve requests back to back with
/// deterministic results.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    /// Connection characteristics.
    pub cib: Cib,
    /// Profiles, consumed before the CIB to enrich the request.
    pub profiles: Pib,
    /// Policies, consumed after the CIB to enrich each candidate.
    pub policies: Pib,
}

impl Engine {
    /// Assembles an engine from loaded repositories.
    pub fn new(cib: Cib, profiles: Pib, policies: Pib) -> Engine {
        Engine {
            cib,
            profiles,
            policies,
        }
    }

    /// Evaluates one request end to end:
    ///
    /// 1. expand the request through the profiles;
    /// 2. run a CIB lookup for every enriched request;
    /// 3. apply the policy PIB to every candidate, dropping invalidated
    ///    ones;
    /// 4. rank by descending score (stable on ties) and keep the best
    ///    `limit`.
    pub fn lookup(&self, request: &PropertyArray, limit: usize) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for enriched in self.profiles.expand_request(request) {
            candidates.extend(self.cib.lookup(&enriched, cib::DEFAULT_CANDIDATES));
        }

        let mut results = Vec::new();
        for mut candidate in candidates {
            self.policies.lookup(&mut candidate);
            if candidate.invalid {
                continue;
            }
            results.push(candidate);
        }

        results.sort_by(|a, b| b.score().total_cmp(&a.score()));
        results.truncate(limit);
        results
    }
}
