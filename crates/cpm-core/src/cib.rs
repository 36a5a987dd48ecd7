//! The Characteristics Information Base: connection descriptors organised as
//! a reference graph.
//!
//! Each [`CibSource`] is a node in a directed graph (`refs` are the outgoing
//! edges). Expanding a source walks every simple path out of it, re-sorts
//! each path by ascending priority, and merges the Cartesian product of the
//! per-source property expansions along the path — later (higher-priority)
//! sources override earlier ones. [`Cib::entries`] streams the expansion of
//! every root source; [`Cib::lookup`] joins each entry with a request and
//! keeps the best-scoring candidates.
use std::collections::{BTreeMap, BTreeSet, HashSet};

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;

use crate::array::PropertyArray;
use crate::candidate::Candidate;
use crate::diag::LoadWarning;
use crate::multi_array::PropertyMultiArray;

/// Default number of candidates a CIB lookup returns.
pub const DEFAULT_CANDIDATES: usize = 5;

// ---------------------------------------------------------------------------
// CibSource
// ---------------------------------------------------------------------------

/// One node of the CIB reference graph.
#[derive(Debug, Clone, PartialEq)]
pub struct CibSource {
    /// Unique id of this source within the CIB.
    pub id: String,
    /// Roots are the entry points of [`Cib::entries`].
    pub root: bool,
    /// Priority used to order sources along a reference path; higher
    /// priority sources override lower ones when properties overlap.
    pub priority: i64,
    /// Free-form description carried from the repository file.
    pub description: Option<String>,
    /// Name of the file this source was loaded from, when known.
    pub filename: Option<String>,
    /// The characteristics this source contributes, possibly multi-valued.
    pub properties: PropertyMultiArray,
    /// Ids of the sources this one references (the file's `"@next"` list).
    pub refs: BTreeSet<String>,
}

impl CibSource {
    /// Creates a non-root source with priority 0 and no properties.
    pub fn new(id: impl Into<String>) -> CibSource {
        CibSource {
            id: id.into(),
            root: false,
            priority: 0,
            description: None,
            filename: None,
            properties: PropertyMultiArray::new(),
            refs: BTreeSet::new(),
        }
    }

    /// Marks this source as a root.
    #[must_use]
    pub fn with_root(mut self, root: bool) -> CibSource {
        self.root = root;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i64) -> CibSource {
        self.priority = priority;
        self
    }

    /// Sets the property multi-array.
    #[must_use]
    pub fn with_properties(mut self, properties: PropertyMultiArray) -> CibSource {
        self.properties = properties;
        self
    }

    /// Sets the outgoing references.
    #[must_use]
    pub fn with_refs<I, S>(mut self, refs: I) -> CibSource
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refs = refs.into_iter().map(Into::into).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// Cib
// ---------------------------------------------------------------------------

/// The loaded CIB: an id-indexed set of sources.
///
/// Read-only after loading; lookups only ever clone.
#[derive(Debug, Clone, Default)]
pub struct Cib {
    sources: BTreeMap<String, CibSource>,
}

impl Cib {
    /// Creates an empty CIB.
    pub fn new() -> Cib {
        Cib::default()
    }

    /// Registers a source, returning the displaced one when the id was
    /// already taken (the caller reports the collision).
    pub fn register(&mut self, source: CibSource) -> Option<CibSource> {
        self.sources.insert(source.id.clone(), source)
    }

    /// Looks up a source by id.
    pub fn get(&self, id: &str) -> Option<&CibSource> {
        self.sources.get(id)
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` when no source is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterates over all sources in id order.
    pub fn sources(&self) -> impl Iterator<Item = &CibSource> {
        self.sources.values()
    }

    /// Iterates over the root sources in id order.
    pub fn roots(&self) -> impl Iterator<Item = &CibSource> {
        self.sources.values().filter(|s| s.root)
    }

    /// Resolves every simple reference path starting at `id`.
    ///
    /// Each returned path contains distinct ids sorted by ascending source
    /// priority (stable: an id is inserted after all ids of equal priority).
    /// References to unknown ids are ignored here; [`Cib::validate`] reports
    /// them. Unknown `id` yields no paths.
    pub fn resolve_refs(&self, id: &str) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        self.extend_path(id, Vec::new(), &mut paths);
        paths
    }

    fn extend_path(&self, id: &str, mut path: Vec<String>, out: &mut Vec<Vec<String>>) {
        let Some(source) = self.sources.get(id) else {
            return;
        };

        // keep the path sorted by priority while walking (bisect-right)
        let position = path.partition_point(|pid| {
            self.sources.get(pid).map_or(0, |s| s.priority) <= source.priority
        });
        path.insert(position, source.id.clone());

        let pending: Vec<&String> = source
            .refs
            .iter()
            .filter(|r| !path.contains(*r) && self.sources.contains_key(r.as_str()))
            .collect();

        if pending.is_empty() {
            out.push(path);
            return;
        }
        for next in pending {
            self.extend_path(next, path.clone(), out);
        }
    }

    /// Streams the expansion of a single source: every reference path,
    /// crossed over the per-source property expansions, merged in path
    /// order. Combinations whose merge hits an immutable conflict are
    /// silently dropped.
    pub fn expand_source(&self, id: &str) -> Entries<'_> {
        let walks = self
            .resolve_refs(id)
            .into_iter()
            .map(|path| (id.to_owned(), path))
            .collect();
        Entries {
            cib: self,
            walks,
            next_walk: 0,
            current: None,
        }
    }

    /// Streams every expanded entry of every root source.
    ///
    /// The full cross-product is never materialised; entries are produced
    /// one at a time.
    pub fn entries(&self) -> Entries<'_> {
        let mut walks = Vec::new();
        for root in self.roots() {
            for path in self.resolve_refs(&root.id) {
                walks.push((root.id.clone(), path));
            }
        }
        Entries {
            cib: self,
            walks,
            next_walk: 0,
            current: None,
        }
    }

    /// Joins every entry with `request` and returns the `limit` best
    /// candidates by descending score, ties kept in entry order.
    ///
    /// An entry whose join raises an immutable conflict is skipped; partial
    /// matches survive with degraded (possibly negative) scores and are
    /// ranked like everything else.
    pub fn lookup(&self, request: &PropertyArray, limit: usize) -> Vec<Candidate> {
        let mut top: Vec<Candidate> = Vec::new();
        for entry in self.entries() {
            let Ok(joined) = entry.properties.merge(request) else {
                continue;
            };
            let candidate = Candidate::new(joined, entry.source);
            let score = candidate.score();
            // bounded insertion keeps at most `limit` candidates alive
            let position = top.partition_point(|c| c.score() >= score);
            if position < limit {
                top.insert(position, candidate);
                top.truncate(limit);
            }
        }
        top
    }

    /// Checks the reference graph and reports structural problems: dangling
    /// references, sources unreachable from every root, and the absence of
    /// any root.
    pub fn validate(&self) -> Vec<LoadWarning> {
        let mut warnings = Vec::new();

        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for source in self.sources.values() {
            graph.add_node(source.id.as_str());
        }
        for source in self.sources.values() {
            for target in &source.refs {
                if self.sources.contains_key(target.as_str()) {
                    graph.add_edge(source.id.as_str(), target.as_str(), ());
                } else {
                    warnings.push(LoadWarning::DanglingReference {
                        source: source.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        let mut reachable: HashSet<&str> = HashSet::new();
        for root in self.roots() {
            let mut dfs = Dfs::new(&graph, root.id.as_str());
            while let Some(id) = dfs.next(&graph) {
                reachable.insert(id);
            }
        }

        if self.roots().next().is_none() {
            warnings.push(LoadWarning::NoRootSources);
        } else {
            for source in self.sources.values() {
                if !reachable.contains(source.id.as_str()) {
                    warnings.push(LoadWarning::UnreachableSource {
                        id: source.id.clone(),
                    });
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One streamed CIB entry: a fully merged property array plus the id of the
/// source it was expanded from.
#[derive(Debug, Clone, PartialEq)]
pub struct CibEntry {
    /// Id of the source whose expansion produced this entry.
    pub source: String,
    /// The merged properties along one reference path.
    pub properties: PropertyArray,
}

/// Lazy iterator over expanded CIB entries.
///
/// For each reference path an odometer walks the Cartesian product of the
/// per-source expansions; only one combination is alive at a time.
#[derive(Debug)]
pub struct Entries<'a> {
    cib: &'a Cib,
    walks: Vec<(String, Vec<String>)>,
    next_walk: usize,
    current: Option<WalkProducts>,
}

#[derive(Debug)]
struct WalkProducts {
    provenance: String,
    expansions: Vec<Vec<PropertyArray>>,
    odometer: Vec<usize>,
    done: bool,
}

impl WalkProducts {
    fn advance(&mut self) {
        for digit in (0..self.odometer.len()).rev() {
            self.odometer[digit] += 1;
            if self.odometer[digit] < self.expansions[digit].len() {
                return;
            }
            self.odometer[digit] = 0;
        }
        self.done = true;
    }
}

impl Iterator for Entries<'_> {
    type Item = CibEntry;

    fn next(&mut self) -> Option<CibEntry> {
        loop {
            let Some(state) = self.current.as_mut() else {
                if self.next_walk >= self.walks.len() {
                    return None;
                }
                let (provenance, path) = self.walks[self.next_walk].clone();
                self.next_walk += 1;
                let expansions: Vec<Vec<PropertyArray>> = path
                    .iter()
                    .filter_map(|id| self.cib.get(id))
                    .map(|source| source.properties.expand())
                    .collect();
                self.current = Some(WalkProducts {
                    provenance,
                    odometer: vec![0; expansions.len()],
                    expansions,
                    done: false,
                });
                continue;
            };

            if state.done {
                self.current = None;
                continue;
            }

            let mut merged = PropertyArray::new();
            let mut conflicted = false;
            for (expanded, &index) in state.expansions.iter().zip(&state.odometer) {
                match merged.merge(&expanded[index]) {
                    Ok(next) => merged = next,
                    Err(_) => {
                        conflicted = true;
                        break;
                    }
                }
            }
            let provenance = state.provenance.clone();
            state.advance();

            if conflicted {
                continue;
            }
            return Some(CibEntry {
                source: provenance,
                properties: merged,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use crate::property::{Precedence, Property};
    use crate::value::Value;

    use super::*;

    fn requested(key: &str, value: impl Into<Value>) -> Property {
        Property::new(key, value).with_score(1.0)
    }

    fn multi(properties: Vec<Property>) -> PropertyMultiArray {
        properties.into_iter().collect()
    }

    fn request(properties: Vec<Property>) -> PropertyArray {
        PropertyArray::from_properties(properties).expect("no conflicts")
    }

    /// Root `A` -> `B` -> `C` with ascending priorities, per-source markers.
    fn chain_cib() -> Cib {
        let mut cib = Cib::new();
        cib.register(
            CibSource::new("A")
                .with_root(true)
                .with_priority(0)
                .with_properties(multi(vec![
                    requested("origin", "A"),
                    requested("transport", "TCP"),
                ]))
                .with_refs(["B"]),
        );
        cib.register(
            CibSource::new("B")
                .with_priority(1)
                .with_properties(multi(vec![requested("origin", "B")]))
                .with_refs(["C"]),
        );
        cib.register(
            CibSource::new("C")
                .with_priority(2)
                .with_properties(multi(vec![requested("origin", "C")])),
        );
        cib
    }

    #[test]
    fn resolve_refs_orders_by_priority() {
        let cib = chain_cib();
        assert_eq!(cib.resolve_refs("A"), vec![vec!["A", "B", "C"]]);
    }

    #[test]
    fn resolve_refs_sorts_a_high_priority_start_to_the_back() {
        let mut cib = chain_cib();
        // bump A's priority above C's: the walk still starts at A but the
        // merged path must put A last
        if let Some(a) = cib.sources.get_mut("A") {
            a.priority = 9;
        }
        assert_eq!(cib.resolve_refs("A"), vec![vec!["B", "C", "A"]]);
    }

    #[test]
    fn resolve_refs_survives_reference_cycles() {
        let mut cib = Cib::new();
        cib.register(CibSource::new("A").with_root(true).with_refs(["B"]));
        cib.register(CibSource::new("B").with_refs(["A"]));
        assert_eq!(cib.resolve_refs("A"), vec![vec!["A", "B"]]);
    }

    #[test]
    fn resolve_refs_skips_unknown_targets() {
        let mut cib = Cib::new();
        cib.register(CibSource::new("A").with_root(true).with_refs(["ghost"]));
        assert_eq!(cib.resolve_refs("A"), vec![vec!["A"]]);
    }

    #[test]
    fn resolve_refs_branches_into_separate_paths() {
        let mut cib = Cib::new();
        cib.register(CibSource::new("A").with_root(true).with_refs(["B", "C"]));
        cib.register(CibSource::new("B").with_priority(1));
        cib.register(CibSource::new("C").with_priority(2).with_refs(["B"]));
        let paths = cib.resolve_refs("A");
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&vec!["A".to_owned(), "B".to_owned()]));
        assert!(paths.contains(&vec![
            "A".to_owned(),
            "B".to_owned(),
            "C".to_owned()
        ]));
    }

    #[test]
    fn higher_priority_source_overrides_along_the_path() {
        let cib = chain_cib();
        let entries: Vec<CibEntry> = cib.entries().collect();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.source, "A");
        assert_eq!(
            *entry.properties.get("origin").expect("present").value(),
            Value::Text("C".to_owned())
        );
        assert_eq!(
            *entry.properties.get("transport").expect("present").value(),
            Value::Text("TCP".to_owned())
        );
    }

    #[test]
    fn entries_cross_multi_valued_properties() {
        let mut cib = Cib::new();
        cib.register(
            CibSource::new("wlan0")
                .with_root(true)
                .with_properties(multi(vec![
                    requested("MTU", Value::range(100.0, 1000.0).expect("range")),
                    requested("MTU", Value::range(1000.0, 9000.0).expect("range")),
                    requested("transport", "TCP"),
                ])),
        );
        let entries: Vec<CibEntry> = cib.entries().collect();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn entries_drop_immutable_conflicts_inside_a_path() {
        let mut cib = Cib::new();
        cib.register(
            CibSource::new("A")
                .with_root(true)
                .with_properties(multi(vec![
                    requested("transport", "TCP").with_precedence(Precedence::Immutable),
                ]))
                .with_refs(["B"]),
        );
        cib.register(
            CibSource::new("B")
                .with_priority(1)
                .with_properties(multi(vec![
                    requested("transport", "UDP").with_precedence(Precedence::Immutable),
                ])),
        );
        assert_eq!(cib.entries().count(), 0);
    }

    #[test]
    fn lookup_joins_request_and_ranks() {
        let mut cib = Cib::new();
        cib.register(
            CibSource::new("eth0")
                .with_root(true)
                .with_properties(multi(vec![
                    requested("MTU", Value::range(1000.0, 9000.0).expect("range")),
                    requested("transport", "TCP"),
                ])),
        );
        cib.register(
            CibSource::new("wlan0")
                .with_root(true)
                .with_properties(multi(vec![
                    requested("MTU", Value::range(100.0, 1500.0).expect("range")),
                    requested("transport", "UDP"),
                ])),
        );

        let req = request(vec![
            requested("MTU", Value::range(1500.0, f64::INFINITY).expect("range")),
            requested("transport", "TCP"),
        ]);
        let candidates = cib.lookup(&req, DEFAULT_CANDIDATES);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].source, "eth0");
        assert!(candidates[0].score() > candidates[1].score());
        assert_eq!(
            *candidates[0]
                .properties
                .get("MTU")
                .expect("present")
                .value(),
            Value::range(1500.0, 9000.0).expect("range")
        );
    }

    #[test]
    fn lookup_skips_entries_with_immutable_conflicts() {
        let mut cib = Cib::new();
        cib.register(
            CibSource::new("wlan0")
                .with_root(true)
                .with_properties(multi(vec![
                    requested("transport", "UDP").with_precedence(Precedence::Immutable),
                ])),
        );
        let req = request(vec![
            requested("transport", "TCP").with_precedence(Precedence::Immutable),
        ]);
        assert!(cib.lookup(&req, DEFAULT_CANDIDATES).is_empty());
    }

    #[test]
    fn lookup_truncates_to_the_limit() {
        let mut cib = Cib::new();
        for i in 0..8 {
            cib.register(
                CibSource::new(format!("if{i}"))
                    .with_root(true)
                    .with_properties(multi(vec![requested("transport", "TCP")])),
            );
        }
        let req = request(vec![requested("transport", "TCP")]);
        assert_eq!(cib.lookup(&req, 3).len(), 3);
    }

    #[test]
    fn validate_reports_graph_problems() {
        let mut cib = Cib::new();
        cib.register(CibSource::new("A").with_root(true).with_refs(["ghost"]));
        cib.register(CibSource::new("orphan"));
        let warnings = cib.validate();
        assert!(warnings.contains(&LoadWarning::DanglingReference {
            source: "A".to_owned(),
            target: "ghost".to_owned(),
        }));
        assert!(warnings.contains(&LoadWarning::UnreachableSource {
            id: "orphan".to_owned(),
        }));
    }

    #[test]
    fn validate_reports_missing_roots() {
        let mut cib = Cib::new();
        cib.register(CibSource::new("A"));
        assert!(cib.validate().contains(&LoadWarning::NoRootSources));
    }
}
