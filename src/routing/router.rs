//! Route lookup.
//!
//! # Responsibilities
//! - Walk the request-path cascade against the frozen table
//! - Gate repeated method-path encounters on their `cascade` annotation
//! - Enforce public visibility and apply the caller's filter
//! - Return the ordered candidate list
//!
//! # Design Decisions
//! - The first encounter of a method path (always at its most specific
//!   level) is always included; later encounters at more general lookup
//!   paths run only when the handler opted into cascading
//! - Visibility is checked independently of the filter: a filter can narrow
//!   the candidate list but never resurrect a non-public handler
//! - Candidates capture everything needed to invoke the handler, so lookup
//!   borrows nothing from the table after it returns

use std::collections::HashMap;

use crate::engine::state::RouterState;
use crate::handler::annotations::{keys, AnnotationSet, AnnotationStore};
use crate::handler::{HandlerCall, HandlerFuture, HandlerId, Params};

use super::cascade::path_cascade;
use super::table::{RouteEntry, RouteTable};

/// Extra predicate over (handler id, annotations); returning false drops
/// the entry.
pub type CandidateFilter<'a> = dyn Fn(HandlerId, &AnnotationSet) -> bool + 'a;

/// One surviving entry, ready to invoke.
#[derive(Clone)]
pub struct Candidate {
    entry: RouteEntry,
}

impl Candidate {
    pub fn id(&self) -> HandlerId {
        self.entry.id
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn method_path(&self) -> &str {
        &self.entry.method_path
    }

    pub fn component_name(&self) -> &str {
        &self.entry.component_name
    }

    pub fn component_path(&self) -> &str {
        &self.entry.component_path
    }

    pub fn dependencies(&self) -> &[crate::handler::Dependency] {
        &self.entry.dependencies
    }

    /// Stamp the active component onto the state, then invoke the handler
    /// inside its composed scope view.
    pub fn invoke(&self, state: RouterState, params: Params) -> HandlerFuture {
        state.set_active(&self.entry.component_name, &self.entry.component_path);
        (self.entry.func)(HandlerCall {
            state,
            scope: self.entry.scope.clone(),
            params,
        })
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("name", &self.entry.name)
            .field("method_path", &self.entry.method_path)
            .finish_non_exhaustive()
    }
}

/// Resolve a request path to its ordered candidate list.
pub fn get_methods(
    table: &RouteTable,
    store: &AnnotationStore,
    path: &str,
    filter: Option<&CandidateFilter<'_>>,
) -> Vec<Candidate> {
    debug_assert!(table.is_frozen(), "route table must be finalized before lookup");

    // method path → (cascade flag at first encounter, first lookup path)
    let mut cascade_seen: HashMap<String, (bool, String)> = HashMap::new();
    let mut candidates = Vec::new();

    for lookup in path_cascade(path) {
        let Some(bucket) = table.bucket(&lookup) else {
            continue;
        };
        for entry in bucket {
            let public = store
                .get(entry.id, keys::VISIBILITY)
                .and_then(|v| v.as_str())
                == Some("public");
            if !public {
                continue;
            }

            match cascade_seen.get(&entry.method_path) {
                None => {
                    let cascades = store
                        .get(entry.id, keys::CASCADE)
                        .map(|v| v.truthy())
                        .unwrap_or(false);
                    cascade_seen
                        .insert(entry.method_path.clone(), (cascades, lookup.clone()));
                }
                Some((_, first_lookup)) if *first_lookup == lookup => {
                    // A sibling at the same lookup path, not a repeat at a
                    // more general one.
                }
                Some((cascades, _)) => {
                    if !cascades {
                        continue;
                    }
                }
            }

            if let Some(filter) = filter {
                let annotations = store.get_all(entry.id);
                let empty = AnnotationSet::new();
                if !filter(entry.id, annotations.unwrap_or(&empty)) {
                    continue;
                }
            }

            candidates.push(Candidate {
                entry: entry.clone(),
            });
        }
    }

    candidates
}
