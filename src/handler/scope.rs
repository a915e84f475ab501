//! Composed read-only view over sibling handler sets.
//!
//! # Responsibilities
//! - Present the union of the sibling sets registered under one
//!   (component, group) pair, first registrant wins
//! - Reject every mutation with a distinguishable error
//!
//! # Design Decisions
//! - Explicit ordered list + first-owner lookup instead of prototype
//!   chains; the siblings are independently registered, frozen sets
//! - Read-only is enforced by the type (no `&mut` surface); `set`/`remove`
//!   exist only to report the violation, they can never succeed
//! - One view is allocated per (component, group) pair at boot and shared
//!   by every request

use std::sync::Arc;

use super::{HandlerCall, HandlerEntry, HandlerFuture, HandlerSet};

/// Failure modes of a scope view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("member `{0}` is not defined by any sibling in this scope")]
    NotFound(String),
    #[error("scope views are read-only")]
    ReadOnly,
}

/// The composed view. Lookup walks the siblings in registration order and
/// returns the first owner; reads allocate nothing and have no side effects.
#[derive(Debug)]
pub struct Scope {
    siblings: Vec<Arc<HandlerSet>>,
}

impl Scope {
    pub fn new(siblings: Vec<Arc<HandlerSet>>) -> Self {
        Self { siblings }
    }

    /// Resolve a member by name against the cascade.
    pub fn get(&self, key: &str) -> Result<&HandlerEntry, ScopeError> {
        self.siblings
            .iter()
            .find_map(|set| set.get(key))
            .ok_or_else(|| ScopeError::NotFound(key.to_string()))
    }

    /// Whether any sibling owns `key`. Mirrors the same search as [`get`].
    ///
    /// [`get`]: Scope::get
    pub fn has(&self, key: &str) -> bool {
        self.siblings.iter().any(|set| set.owns(key))
    }

    /// Invoke a member by name. The call runs against the first owning
    /// sibling, so an overlay handler body transparently reaches members
    /// defined by any other sibling.
    pub fn invoke(&self, key: &str, call: HandlerCall) -> Result<HandlerFuture, ScopeError> {
        let entry = self.get(key)?;
        Ok((entry.func)(call))
    }

    /// Mutation is rejected, never silently dropped.
    pub fn set(&self, _key: &str, _value: super::HandlerFn) -> Result<(), ScopeError> {
        Err(ScopeError::ReadOnly)
    }

    /// Removal is rejected, never silently dropped.
    pub fn remove(&self, _key: &str) -> Result<(), ScopeError> {
        Err(ScopeError::ReadOnly)
    }

    /// A scope view can never grow new members.
    pub fn is_extensible(&self) -> bool {
        false
    }

    pub fn sibling_count(&self) -> usize {
        self.siblings.len()
    }

    /// Member names across all siblings, cascade order, duplicates included.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.siblings
            .iter()
            .flat_map(|set| set.entries().iter().map(|entry| entry.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, Flow, HandlerMeta, HandlerSet};

    fn noop() -> crate::handler::HandlerFn {
        handler_fn(|_call| async { Ok(Flow::Continue) })
    }

    fn scope_of_two() -> Scope {
        let a = HandlerSet::new().handler("foo", HandlerMeta::new(), noop());
        let b = HandlerSet::new().handler("bar", HandlerMeta::new(), noop());
        Scope::new(vec![Arc::new(a), Arc::new(b)])
    }

    #[test]
    fn first_registrant_wins() {
        let first = HandlerSet::new().handler("shared", HandlerMeta::new().priority(1), noop());
        let second = HandlerSet::new().handler("shared", HandlerMeta::new().priority(2), noop());
        let scope = Scope::new(vec![Arc::new(first), Arc::new(second)]);

        let entry = scope.get("shared").unwrap();
        assert_eq!(entry.meta.priority, 1);
    }

    #[test]
    fn members_resolve_across_siblings() {
        let scope = scope_of_two();
        assert!(scope.has("foo"));
        assert!(scope.has("bar"));
        assert!(scope.get("foo").is_ok());
        assert_eq!(
            scope.get("baz").unwrap_err(),
            ScopeError::NotFound("baz".to_string())
        );
    }

    #[test]
    fn mutation_reports_failure_and_view_is_unchanged() {
        let scope = scope_of_two();

        assert_eq!(scope.set("x", noop()).unwrap_err(), ScopeError::ReadOnly);
        assert!(!scope.has("x"));

        assert_eq!(scope.remove("foo").unwrap_err(), ScopeError::ReadOnly);
        assert!(scope.has("foo"), "foo must remain resolvable after a rejected delete");

        assert!(!scope.is_extensible());
    }
}
