//! Name-keyed parameter resolution.
//!
//! # Responsibilities
//! - Map each declared dependency to a resolver producing the injected value
//! - Fall back to the app's named resource connections for unknown names
//!
//! # Design Decisions
//! - Resolvers run before the handler is invoked; the values they hand out
//!   are shared cells, so `document`/`body`/`query`/`session` mutations made
//!   by one handler are observed by the next one in the chain
//! - A name with neither a resolver nor a resource yields `Absent`, never an
//!   error

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::state::{DoneSignal, RouterState, SharedDoc, SharedResponse, Slot};
use crate::http::request::RequestInfo;

use super::{Dependency, HandlerId};

/// Named resource connections held by the app (database handles and the
/// like), injected by name.
pub type ResourceMap = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// A value produced by the injector.
#[derive(Clone)]
pub enum ParamValue {
    /// A shared JSON structure (`document`, `body`, `query`, `session`,
    /// `params`).
    Doc(SharedDoc),
    /// The immutable request context.
    Request(Arc<RequestInfo>),
    /// The shared response plan.
    Response(SharedResponse),
    /// The chain-completion flag.
    Done(DoneSignal),
    /// A named app resource.
    Resource(Arc<dyn Any + Send + Sync>),
    /// Nothing resolved for this name.
    Absent,
}

impl ParamValue {
    pub fn doc(&self) -> Option<&SharedDoc> {
        match self {
            ParamValue::Doc(doc) => Some(doc),
            _ => None,
        }
    }

    /// Snapshot of a doc value, for read-only consumers.
    pub fn json(&self) -> Option<Value> {
        self.doc()
            .map(|doc| doc.lock().expect("doc mutex poisoned").clone())
    }

    pub fn resource<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            ParamValue::Resource(res) => res.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ParamValue::Absent)
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Doc(_) => f.write_str("Doc(..)"),
            ParamValue::Request(req) => write!(f, "Request({} {})", req.method, req.path),
            ParamValue::Response(_) => f.write_str("Response(..)"),
            ParamValue::Done(_) => f.write_str("Done(..)"),
            ParamValue::Resource(_) => f.write_str("Resource(..)"),
            ParamValue::Absent => f.write_str("Absent"),
        }
    }
}

/// The resolved arguments for one invocation, in declaration order.
#[derive(Debug, Default)]
pub struct Params {
    values: Vec<(Dependency, ParamValue)>,
}

impl Params {
    pub fn get(&self, dependency: &Dependency) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(dep, _)| dep == dependency)
            .map(|(_, value)| value)
    }

    pub fn by_name(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(dep, _)| dep.name() == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Dependency, &ParamValue)> {
        self.values.iter().map(|(dep, value)| (dep, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a resolver may consult.
pub struct ResolveCx<'a> {
    pub state: &'a RouterState,
    /// Extra parameters supplied by the dispatch variant (socket events,
    /// error paths); surfaces as the `params` document.
    pub extra: Option<&'a Value>,
    pub handler: HandlerId,
    pub resources: &'a ResourceMap,
}

type ResolverFn = fn(&ResolveCx<'_>) -> ParamValue;

/// The resolver registry.
pub struct Injector {
    resolvers: HashMap<String, ResolverFn>,
}

impl Injector {
    /// Registry with the recognized resolvers installed. `db`, `view`, and
    /// `display` deliberately have none: they resolve through the resource
    /// map.
    pub fn new() -> Self {
        let mut injector = Self {
            resolvers: HashMap::new(),
        };
        injector.register("request", |cx| ParamValue::Request(cx.state.request.clone()));
        injector.register("response", |cx| ParamValue::Response(cx.state.response.clone()));
        injector.register("done", |cx| ParamValue::Done(cx.state.done_signal()));
        injector.register("document", |cx| ParamValue::Doc(cx.state.doc_slot(Slot::Document)));
        injector.register("body", |cx| ParamValue::Doc(cx.state.doc_slot(Slot::Body)));
        injector.register("query", |cx| ParamValue::Doc(cx.state.doc_slot(Slot::Query)));
        injector.register("session", |cx| ParamValue::Doc(cx.state.doc_slot(Slot::Session)));
        injector.register("params", |cx| {
            let extra = cx.extra.cloned();
            ParamValue::Doc(cx.state.doc_slot_seeded(Slot::Params, || {
                extra.unwrap_or_else(|| Value::Object(serde_json::Map::new()))
            }))
        });
        injector
    }

    pub fn register(&mut self, name: impl Into<String>, resolver: ResolverFn) {
        self.resolvers.insert(name.into(), resolver);
    }

    /// Resolve a handler's declared dependency list.
    pub fn resolve(&self, dependencies: &[Dependency], cx: &ResolveCx<'_>) -> Params {
        let values = dependencies
            .iter()
            .map(|dep| {
                let value = match self.resolvers.get(dep.name()) {
                    Some(resolver) => resolver(cx),
                    None => match cx.resources.get(dep.name()) {
                        Some(resource) => ParamValue::Resource(resource.clone()),
                        None => ParamValue::Absent,
                    },
                };
                (dep.clone(), value)
            })
            .collect();
        Params { values }
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RequestInfo;

    fn cx_fixture<'a>(
        state: &'a RouterState,
        resources: &'a ResourceMap,
    ) -> ResolveCx<'a> {
        ResolveCx {
            state,
            extra: None,
            handler: HandlerId(1),
            resources,
        }
    }

    #[test]
    fn document_resolution_is_stateful_idempotent() {
        let state = RouterState::new(Arc::new(RequestInfo::new("get", "/")));
        let resources = ResourceMap::new();
        let injector = Injector::new();
        let deps = [Dependency::Document];

        let first = injector.resolve(&deps, &cx_fixture(&state, &resources));
        first
            .get(&Dependency::Document)
            .unwrap()
            .doc()
            .unwrap()
            .lock()
            .unwrap()
            .as_object_mut()
            .unwrap()
            .insert("seen".into(), Value::Bool(true));

        let second = injector.resolve(&deps, &cx_fixture(&state, &resources));
        let doc = second.get(&Dependency::Document).unwrap().json().unwrap();
        assert_eq!(doc["seen"], Value::Bool(true));
    }

    #[test]
    fn unknown_names_fall_back_to_resources_then_absent() {
        let state = RouterState::new(Arc::new(RequestInfo::new("get", "/")));
        let mut resources = ResourceMap::new();
        resources.insert(
            "db".to_string(),
            Arc::new("connection".to_string()) as Arc<dyn Any + Send + Sync>,
        );
        let injector = Injector::new();

        let params = injector.resolve(
            &[Dependency::Db, Dependency::View],
            &cx_fixture(&state, &resources),
        );

        let db: Option<Arc<String>> = params.get(&Dependency::Db).unwrap().resource();
        assert_eq!(db.as_deref(), Some(&"connection".to_string()));
        assert!(params.get(&Dependency::View).unwrap().is_absent());
    }

    #[test]
    fn params_doc_seeds_from_extra() {
        let state = RouterState::new(Arc::new(RequestInfo::new("get", "/")));
        let resources = ResourceMap::new();
        let injector = Injector::new();
        let extra = serde_json::json!({"id": "42"});

        let cx = ResolveCx {
            state: &state,
            extra: Some(&extra),
            handler: HandlerId(1),
            resources: &resources,
        };
        let params = injector.resolve(&[Dependency::Params], &cx);
        let doc = params.get(&Dependency::Params).unwrap().json().unwrap();
        assert_eq!(doc["id"], Value::String("42".into()));
    }
}
