//! Human-readable dump of the loaded repositories.
//!
//! Properties render in the bracketed notation (`[key|val]` immutable,
//! `(key|val)` requested, `<key|val>` informational), one expanded CIB
//! entry per line, prefixed by the id of the source it was expanded from.
use cpm_core::{CibEntry, Engine, Pib};

/// Renders every expanded CIB entry and every registered profile and
/// policy. With `all`, non-root CIB sources are expanded as well.
pub fn dump(engine: &Engine, all: bool) -> String {
    let mut out = String::new();

    out.push_str("=== CIB ===\n");
    if all {
        for source in engine.cib.sources() {
            for entry in engine.cib.expand_source(&source.id) {
                render_entry(&mut out, &entry);
            }
        }
    } else {
        for entry in engine.cib.entries() {
            render_entry(&mut out, &entry);
        }
    }

    render_pib(&mut out, "profiles", &engine.profiles);
    render_pib(&mut out, "policies", &engine.policies);
    out
}

fn render_entry(out: &mut String, entry: &CibEntry) {
    out.push_str(&format!("{}: {}\n", entry.source, entry.properties));
}

fn render_pib(out: &mut String, title: &str, pib: &Pib) {
    out.push_str(&format!("=== {title} ===\n"));
    for policy in pib.policies() {
        out.push_str(&format!("{policy}\n"));
    }
}
