//! Annotation-driven admission predicates.
//!
//! # Responsibilities
//! - Keep the named predicate table (`methods`, `authenticated`, ...)
//! - Decide admission: every annotation with a matching test must pass
//!
//! # Design Decisions
//! - Tests receive the typed annotation value and a request snapshot; they
//!   hold no state, so admission is idempotent
//! - Keys without a registered test are ignored by the gate (they may still
//!   drive routing, like `visibility` and `cascade`)

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::handler::annotations::{AnnotationSet, AnnotationValue};
use crate::http::request::{RequestInfo, Transport};

use super::schema::SchemaRegistry;

/// Snapshot of the request facts the predicates consult.
pub struct GateContext<'a> {
    /// Lower-cased HTTP method (or socket event name).
    pub method: &'a str,
    pub authenticated: bool,
    /// Parsed request body, when there is one.
    pub body: Option<&'a Map<String, Value>>,
    /// Content types the client accepts, lower-cased, in header order.
    pub accept: &'a [String],
    pub transport: Transport,
    /// Response status at dispatch time; 200 on the normal path.
    pub status: u16,
    pub schemas: &'a SchemaRegistry,
}

impl<'a> GateContext<'a> {
    pub fn from_request(
        request: &'a RequestInfo,
        status: u16,
        schemas: &'a SchemaRegistry,
    ) -> Self {
        Self {
            method: &request.method,
            authenticated: request.authenticated,
            body: request.body.as_ref().and_then(Value::as_object),
            accept: &request.accept,
            transport: request.transport,
            status,
            schemas,
        }
    }
}

type PredicateFn = fn(&AnnotationValue, &GateContext<'_>) -> bool;

/// The named predicate table.
pub struct SecurityGate {
    tests: HashMap<&'static str, PredicateFn>,
}

impl SecurityGate {
    pub fn new() -> Self {
        let mut gate = Self {
            tests: HashMap::new(),
        };
        gate.register("methods", test_methods);
        gate.register("authenticated", test_authenticated);
        gate.register("unauthenticated", test_unauthenticated);
        gate.register("accepted-fields", test_accepted_fields);
        gate.register("required-fields", test_required_fields);
        gate.register("accepts-content", test_accepts_content);
        gate.register("accept-errors", test_accept_errors);
        gate.register("accepts-connect", test_accepts_connect);
        gate.register("schema", test_schema);
        gate
    }

    pub fn register(&mut self, key: &'static str, test: PredicateFn) {
        self.tests.insert(key, test);
    }

    /// True iff every annotation that has a corresponding test passes.
    /// Absent annotations impose no constraint.
    pub fn admit(&self, annotations: &AnnotationSet, cx: &GateContext<'_>) -> bool {
        annotations.iter().all(|(key, value)| {
            self.tests
                .get(key)
                .map(|test| test(value, cx))
                .unwrap_or(true)
        })
    }
}

impl Default for SecurityGate {
    fn default() -> Self {
        Self::new()
    }
}

fn test_methods(value: &AnnotationValue, cx: &GateContext<'_>) -> bool {
    value
        .as_set()
        .map(|set| set.contains(cx.method))
        .unwrap_or(false)
}

fn test_authenticated(value: &AnnotationValue, cx: &GateContext<'_>) -> bool {
    cx.authenticated == value.truthy()
}

fn test_unauthenticated(value: &AnnotationValue, cx: &GateContext<'_>) -> bool {
    (!cx.authenticated) == value.truthy()
}

/// Every body key must be in the declared set; extra keys are forbidden.
fn test_accepted_fields(value: &AnnotationValue, cx: &GateContext<'_>) -> bool {
    let Some(allowed) = value.as_set() else {
        return false;
    };
    cx.body
        .map(|body| body.keys().all(|key| allowed.contains(key)))
        .unwrap_or(true)
}

/// Every declared key must be present in the body.
fn test_required_fields(value: &AnnotationValue, cx: &GateContext<'_>) -> bool {
    let Some(required) = value.as_set() else {
        return false;
    };
    match cx.body {
        Some(body) => required.iter().all(|key| body.contains_key(key)),
        None => required.is_empty(),
    }
}

/// At least one declared content type must satisfy the client's accept
/// list. A client with no accept header accepts anything.
fn test_accepts_content(value: &AnnotationValue, cx: &GateContext<'_>) -> bool {
    let Some(declared) = value.as_set() else {
        return false;
    };
    if cx.accept.is_empty() {
        return !declared.is_empty();
    }
    declared
        .iter()
        .any(|offered| cx.accept.iter().any(|accepted| accept_matches(accepted, offered)))
}

fn accept_matches(accepted: &str, offered: &str) -> bool {
    if accepted == "*/*" || accepted == offered {
        return true;
    }
    match (accepted.split_once('/'), offered.split_once('/')) {
        (Some((atype, "*")), Some((otype, _))) => atype == otype,
        _ => false,
    }
}

/// Only meaningful on the error path: with status >= 400 the declared value
/// must be truthy, otherwise the handler stays out of error dispatch.
fn test_accept_errors(value: &AnnotationValue, cx: &GateContext<'_>) -> bool {
    if cx.status < 400 {
        return true;
    }
    value.truthy()
}

fn test_accepts_connect(value: &AnnotationValue, cx: &GateContext<'_>) -> bool {
    value
        .as_set()
        .map(|set| set.contains(cx.transport.as_str()))
        .unwrap_or(false)
}

fn test_schema(value: &AnnotationValue, cx: &GateContext<'_>) -> bool {
    value
        .as_str()
        .map(|name| cx.schemas.validate(name, cx.body))
        .unwrap_or(false)
}
