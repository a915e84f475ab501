//! Route table construction.
//!
//! # Responsibilities
//! - Derive every handler's method path from its component, group, and name
//! - Collapse trailing `/index` segments into shorter registrations
//! - Assign priority (cascade index plus declared bias) and tiebreak
//! - Sort and freeze the table before the first request
//!
//! # Design Decisions
//! - The tiebreak counts earlier same-origin entries in the bucket, so
//!   collapsed routes from sibling handlers keep their registration order
//! - Private handlers are skipped entirely, at every cascade level
//! - Insertion after finalization is a programming error, not a runtime
//!   feature

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::component::tree::{ComponentId, ComponentTree};
use crate::handler::annotations::{keys, AnnotationStore};
use crate::handler::{Dependency, HandlerFn, HandlerId, Scope, Visibility};

/// One dispatchable registration.
#[derive(Clone)]
pub struct RouteEntry {
    pub id: HandlerId,
    pub name: String,
    pub func: HandlerFn,
    pub scope: Arc<Scope>,
    pub dependencies: Vec<Dependency>,
    pub component_name: String,
    pub component_path: String,
    /// The original, uncollapsed method path.
    pub method_path: String,
    pub priority: i64,
    pub tiebreak: u32,
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("name", &self.name)
            .field("method_path", &self.method_path)
            .field("priority", &self.priority)
            .field("tiebreak", &self.tiebreak)
            .finish_non_exhaustive()
    }
}

/// Path-keyed dispatch table. Built once, sorted once, then immutable.
#[derive(Debug, Default)]
pub struct RouteTable {
    buckets: HashMap<String, Vec<RouteEntry>>,
    frozen: bool,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, path: &str, entry: RouteEntry) {
        assert!(!self.frozen, "route table is frozen");
        self.buckets.entry(path.to_string()).or_default().push(entry);
    }

    pub fn bucket(&self, path: &str) -> Option<&[RouteEntry]> {
        self.buckets.get(path).map(Vec::as_slice)
    }

    /// Sort every bucket by `(priority, tiebreak)` ascending and freeze the
    /// table. Runs exactly once, before the first request is served.
    pub fn finalize(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.sort_by_key(|entry| (entry.priority, entry.tiebreak));
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Count of entries in `path`'s bucket sharing an original method path.
    fn same_origin_count(&self, path: &str, method_path: &str) -> u32 {
        self.buckets
            .get(path)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|entry| entry.method_path == method_path)
                    .count() as u32
            })
            .unwrap_or(0)
    }
}

/// Composed scope views, one per (component, group) pair.
pub type ScopeMap = HashMap<(ComponentId, String), Arc<Scope>>;

/// Strip trailing `/index` segments, most specific first, until stripping
/// no longer changes the string. A fully collapsed path registers at `/`.
pub fn index_collapse(method_path: &str) -> Vec<String> {
    let mut out = vec![method_path.to_string()];
    loop {
        let current = out.last().expect("collapse list is never empty");
        let Some(stripped) = current.strip_suffix("/index") else {
            break;
        };
        let next = if stripped.is_empty() { "/" } else { stripped };
        if next == current.as_str() {
            break;
        }
        let next = next.to_string();
        let done = next == "/";
        out.push(next);
        if done {
            break;
        }
    }
    out
}

/// Build the table from the frozen component tree. Annotations must already
/// carry each handler's visibility and priority; `scopes` must hold the view
/// for every (component, group) pair that has registrations.
pub fn build_table(
    tree: &ComponentTree,
    store: &AnnotationStore,
    scopes: &ScopeMap,
) -> RouteTable {
    let mut table = RouteTable::new();

    for component in tree.ids() {
        let component_name = tree.name(component).to_string();
        let component_path = tree.path(component).to_string();

        for (group, sets) in tree.handler_groups(component) {
            let scope = scopes
                .get(&(component, group.clone()))
                .expect("scope views are built before the route table")
                .clone();

            for set in sets {
                for entry in set.entries() {
                    let visibility = store
                        .get(entry.id(), keys::VISIBILITY)
                        .and_then(|v| v.as_str())
                        .and_then(Visibility::parse)
                        .unwrap_or_default();
                    if !visibility.routable() {
                        continue;
                    }

                    let method_path =
                        format!("{component_path}/{group}/{name}", name = entry.name);
                    let bias = store
                        .get(entry.id(), keys::PRIORITY)
                        .and_then(|v| v.as_int())
                        .unwrap_or(0);

                    for (cascade_index, path) in index_collapse(&method_path).into_iter().enumerate()
                    {
                        let tiebreak = table.same_origin_count(&path, &method_path);
                        table.insert(
                            &path,
                            RouteEntry {
                                id: entry.id(),
                                name: entry.name.clone(),
                                func: entry.func.clone(),
                                scope: scope.clone(),
                                dependencies: entry.meta.dependencies.clone(),
                                component_name: component_name.clone(),
                                component_path: component_path.clone(),
                                method_path: method_path.clone(),
                                priority: cascade_index as i64 + bias,
                                tiebreak,
                            },
                        );
                    }
                }
            }
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_strips_each_trailing_index() {
        assert_eq!(index_collapse("/x/y/index"), ["/x/y/index", "/x/y"]);
        assert_eq!(
            index_collapse("/x/index/index"),
            ["/x/index/index", "/x/index", "/x"]
        );
        assert_eq!(index_collapse("/x/y"), ["/x/y"]);
        // Interior `index` segments are untouched.
        assert_eq!(index_collapse("/index/y"), ["/index/y"]);
    }

    #[test]
    fn fully_collapsed_path_registers_at_root() {
        assert_eq!(index_collapse("/index"), ["/index", "/"]);
        assert_eq!(
            index_collapse("/index/index"),
            ["/index/index", "/index", "/"]
        );
    }

    #[test]
    fn finalize_sorts_by_priority_then_tiebreak() {
        use crate::handler::{handler_fn, Flow, HandlerMeta, HandlerSet};

        let noop = handler_fn(|_| async { Ok(Flow::Continue) });
        let scope = Arc::new(Scope::new(vec![Arc::new(
            HandlerSet::new().handler("h", HandlerMeta::new(), noop.clone()),
        )]));
        let entry = |priority: i64, tiebreak: u32, tag: &str| RouteEntry {
            id: HandlerId(1),
            name: tag.to_string(),
            func: noop.clone(),
            scope: scope.clone(),
            dependencies: Vec::new(),
            component_name: String::new(),
            component_path: String::new(),
            method_path: format!("/m/{tag}"),
            priority,
            tiebreak,
        };

        let mut table = RouteTable::new();
        table.insert("/p", entry(1, 1, "c"));
        table.insert("/p", entry(0, 1, "b"));
        table.insert("/p", entry(0, 0, "a"));
        table.finalize();

        let order: Vec<&str> = table
            .bucket("/p")
            .unwrap()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(order, ["a", "b", "c"]);
        assert!(table.is_frozen());
    }
}
