//! Identity-keyed annotation side table.
//!
//! # Responsibilities
//! - Hold the ordered, typed metadata attached to every registered handler
//! - Assign handler ids during the boot phase
//!
//! # Design Decisions
//! - Values are typed at registration (bool, int, string, string set) and
//!   never re-parsed at dispatch time
//! - Association is by [`HandlerId`], not by mutating the handler, so a
//!   handler function carries metadata without widening its own surface
//! - Sets preserve insertion order; admission iterates keys in that order

use std::collections::{BTreeSet, HashMap};

use super::HandlerId;

/// Annotation keys recognized by the dispatch core.
pub mod keys {
    pub const COMPONENT_NAME: &str = "componentName";
    pub const COMPONENT_PATH: &str = "componentPath";
    pub const METHOD_PATH: &str = "methodPath";
    pub const VISIBILITY: &str = "visibility";
    pub const CASCADE: &str = "cascade";
    pub const PRIORITY: &str = "priority";
    pub const ACCEPT_ERRORS: &str = "accept-errors";
    pub const METHODS: &str = "methods";
    pub const AUTHENTICATED: &str = "authenticated";
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const ACCEPTED_FIELDS: &str = "accepted-fields";
    pub const REQUIRED_FIELDS: &str = "required-fields";
    pub const ACCEPTS_CONTENT: &str = "accepts-content";
    pub const ACCEPTS_CONNECT: &str = "accepts-connect";
    pub const SCHEMA: &str = "schema";
}

/// A typed annotation value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Str(String),
    StrSet(BTreeSet<String>),
}

impl AnnotationValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AnnotationValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            AnnotationValue::StrSet(s) => Some(s),
            _ => None,
        }
    }

    /// Loose truthiness, used by `accept-errors` style flags.
    pub fn truthy(&self) -> bool {
        match self {
            AnnotationValue::Bool(b) => *b,
            AnnotationValue::Int(i) => *i != 0,
            AnnotationValue::Str(s) => !s.is_empty(),
            AnnotationValue::StrSet(s) => !s.is_empty(),
        }
    }
}

/// Ordered mapping from annotation key to typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    entries: Vec<(String, AnnotationValue)>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Insert or replace. Replacement keeps the key's original position.
    pub fn set(&mut self, key: impl Into<String>, value: AnnotationValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnnotationValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The side table: handler id → annotation set.
///
/// Written only during the single-writer boot phase; read-only while
/// serving.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    sets: HashMap<HandlerId, AnnotationSet>,
    next_id: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh handler id. Ids are never reused.
    pub fn allocate(&mut self) -> HandlerId {
        self.next_id += 1;
        HandlerId(self.next_id)
    }

    pub fn get(&self, id: HandlerId, key: &str) -> Option<&AnnotationValue> {
        self.sets.get(&id).and_then(|set| set.get(key))
    }

    pub fn get_all(&self, id: HandlerId) -> Option<&AnnotationSet> {
        self.sets.get(&id)
    }

    pub fn set(&mut self, id: HandlerId, key: impl Into<String>, value: AnnotationValue) {
        self.sets.entry(id).or_default().set(key, value);
    }

    pub fn set_from<I, K>(&mut self, id: HandlerId, pairs: I)
    where
        I: IntoIterator<Item = (K, AnnotationValue)>,
        K: Into<String>,
    {
        let set = self.sets.entry(id).or_default();
        for (key, value) in pairs {
            set.set(key, value);
        }
    }

    pub fn has(&self, id: HandlerId, key: &str) -> bool {
        self.get(id, key).is_some()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
