//! Handler sets and registration-time metadata.
//!
//! # Responsibilities
//! - Define the handler function type and its invocation context
//! - Carry declarative per-handler metadata (the annotation surface)
//! - Group handler functions into named sets, one per overlay origin
//!
//! # Design Decisions
//! - Metadata is supplied as a typed struct at registration, never scraped
//!   from source text; values are typed once and never re-parsed at dispatch
//! - Handler identity is an opaque id stamped at registration; annotations
//!   live in a side table keyed by that id
//! - Dependencies are declared as an explicit ordered enum list, resolved by
//!   the parameter injector

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::engine::state::RouterState;

pub mod annotations;
pub mod params;
pub mod scope;

pub use annotations::{AnnotationSet, AnnotationStore, AnnotationValue};
pub use params::Params;
pub use scope::Scope;

/// Opaque identity assigned to every handler at registration time.
///
/// Annotations are associated with this id in a side table rather than with
/// the handler function itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) u64);

/// Explicit result of one handler invocation.
///
/// `Continue` hands the request to the next candidate, `Done` asks the
/// engine to finalize the response, `Redirect` issues a redirect. Handlers
/// may equivalently set the shared done/redirect fields on the router state;
/// the engine honors both signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
    Redirect(String),
}

pub type HandlerResult = Result<Flow, HandlerError>;

/// Error raised inside a handler body.
///
/// Caught by the execution engine, logged, and turned into a fallthrough;
/// never propagated to the connection task.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Everything a handler receives for one invocation.
pub struct HandlerCall {
    /// Shared per-request state. Cloning shares the same underlying cells.
    pub state: RouterState,
    /// Composed read-only view over the sibling handler sets.
    pub scope: Arc<Scope>,
    /// Values resolved by the parameter injector, in declaration order.
    pub params: Params,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Type-erased handler function.
pub type HandlerFn = Arc<dyn Fn(HandlerCall) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure into a [`HandlerFn`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HandlerCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |call| Box::pin(f(call)))
}

/// Route visibility. Only `Public` handlers are dispatchable from incoming
/// requests; `ViewOnly` and `Protected` handlers are registered in the route
/// table for internal invocation, `Private` handlers are never registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    ViewOnly,
    Protected,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::ViewOnly => "viewOnly",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Visibility::Public),
            "viewOnly" => Some(Visibility::ViewOnly),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }

    /// Whether the route table registers this handler at all.
    pub fn routable(&self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

/// Dependency a handler can declare. Names without a dedicated resolver fall
/// back to the app's named resource map; still-unresolved names yield
/// [`params::ParamValue::Absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Request,
    Response,
    Document,
    Session,
    Query,
    Body,
    Db,
    View,
    Display,
    Done,
    Params,
    Named(String),
}

impl Dependency {
    pub fn name(&self) -> &str {
        match self {
            Dependency::Request => "request",
            Dependency::Response => "response",
            Dependency::Document => "document",
            Dependency::Session => "session",
            Dependency::Query => "query",
            Dependency::Body => "body",
            Dependency::Db => "db",
            Dependency::View => "view",
            Dependency::Display => "display",
            Dependency::Done => "done",
            Dependency::Params => "params",
            Dependency::Named(name) => name,
        }
    }
}

/// Declarative metadata for one handler, supplied at registration.
///
/// Every field maps onto an annotation key; `None` gate fields impose no
/// admission constraint.
#[derive(Debug, Clone, Default)]
pub struct HandlerMeta {
    pub visibility: Visibility,
    pub cascade: bool,
    pub priority: i64,
    pub accept_errors: bool,
    pub methods: Option<BTreeSet<String>>,
    pub authenticated: Option<bool>,
    pub unauthenticated: Option<bool>,
    pub accepted_fields: Option<BTreeSet<String>>,
    pub required_fields: Option<BTreeSet<String>>,
    pub accepts_content: Option<BTreeSet<String>>,
    pub accepts_connect: Option<BTreeSet<String>>,
    pub schema: Option<String>,
    pub dependencies: Vec<Dependency>,
}

impl HandlerMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn accept_errors(mut self) -> Self {
        self.accept_errors = true;
        self
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = Some(methods.into_iter().map(|m| m.into().to_lowercase()).collect());
        self
    }

    pub fn authenticated(mut self, required: bool) -> Self {
        self.authenticated = Some(required);
        self
    }

    pub fn unauthenticated(mut self, required: bool) -> Self {
        self.unauthenticated = Some(required);
        self
    }

    pub fn accepted_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn accepts_content<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepts_content = Some(types.into_iter().map(|t| t.into().to_lowercase()).collect());
        self
    }

    pub fn accepts_connect<I, S>(mut self, transports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepts_connect = Some(transports.into_iter().map(|t| t.into().to_lowercase()).collect());
        self
    }

    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.schema = Some(name.into());
        self
    }

    pub fn dependencies<I>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = Dependency>,
    {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    /// Emit the annotation pairs this metadata stands for, in a stable order.
    /// Gate keys are emitted only when declared.
    pub(crate) fn to_annotations(&self) -> Vec<(String, AnnotationValue)> {
        use annotations::keys;

        let mut out = vec![
            (keys::VISIBILITY.to_string(), AnnotationValue::Str(self.visibility.as_str().to_string())),
            (keys::CASCADE.to_string(), AnnotationValue::Bool(self.cascade)),
            (keys::PRIORITY.to_string(), AnnotationValue::Int(self.priority)),
            (keys::ACCEPT_ERRORS.to_string(), AnnotationValue::Bool(self.accept_errors)),
        ];
        if let Some(methods) = &self.methods {
            out.push((keys::METHODS.to_string(), AnnotationValue::StrSet(methods.clone())));
        }
        if let Some(required) = self.authenticated {
            out.push((keys::AUTHENTICATED.to_string(), AnnotationValue::Bool(required)));
        }
        if let Some(required) = self.unauthenticated {
            out.push((keys::UNAUTHENTICATED.to_string(), AnnotationValue::Bool(required)));
        }
        if let Some(fields) = &self.accepted_fields {
            out.push((keys::ACCEPTED_FIELDS.to_string(), AnnotationValue::StrSet(fields.clone())));
        }
        if let Some(fields) = &self.required_fields {
            out.push((keys::REQUIRED_FIELDS.to_string(), AnnotationValue::StrSet(fields.clone())));
        }
        if let Some(types) = &self.accepts_content {
            out.push((keys::ACCEPTS_CONTENT.to_string(), AnnotationValue::StrSet(types.clone())));
        }
        if let Some(transports) = &self.accepts_connect {
            out.push((keys::ACCEPTS_CONNECT.to_string(), AnnotationValue::StrSet(transports.clone())));
        }
        if let Some(schema) = &self.schema {
            out.push((keys::SCHEMA.to_string(), AnnotationValue::Str(schema.clone())));
        }
        out
    }
}

/// One named handler inside a set.
pub struct HandlerEntry {
    pub name: String,
    pub meta: HandlerMeta,
    pub func: HandlerFn,
    pub(crate) id: HandlerId,
}

impl HandlerEntry {
    pub fn id(&self) -> HandlerId {
        self.id
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("visibility", &self.meta.visibility)
            .finish_non_exhaustive()
    }
}

/// A named collection of handler functions registered as one unit.
///
/// Multiple sets may share the same (component, group) identity when they
/// come from overlapping overlay roots; registration order is the cascade
/// order the scope resolver composes.
#[derive(Debug, Default)]
pub struct HandlerSet {
    entries: Vec<HandlerEntry>,
    source: Option<PathBuf>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set attributed to one overlay root. The root is merged into the
    /// owning component's source paths at registration.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self {
            entries: Vec::new(),
            source: Some(root.into()),
        }
    }

    /// Add a handler to the set. Duplicate names are rejected at
    /// registration, not here.
    pub fn handler(
        mut self,
        name: impl Into<String>,
        meta: HandlerMeta,
        func: HandlerFn,
    ) -> Self {
        self.entries.push(HandlerEntry {
            name: name.into(),
            meta,
            func,
            id: HandlerId(0),
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&HandlerEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn owns(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn entries(&self) -> &[HandlerEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [HandlerEntry] {
        &mut self.entries
    }

    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_round_trip() {
        for v in [Visibility::Public, Visibility::ViewOnly, Visibility::Protected, Visibility::Private] {
            assert_eq!(Visibility::parse(v.as_str()), Some(v));
        }
        assert_eq!(Visibility::parse("hidden"), None);
        assert!(!Visibility::Private.routable());
        assert!(Visibility::ViewOnly.routable());
    }

    #[test]
    fn meta_emits_declared_gate_keys_only() {
        let meta = HandlerMeta::new()
            .methods(["POST"])
            .authenticated(true);
        let pairs = meta.to_annotations();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();

        assert!(keys.contains(&"methods"));
        assert!(keys.contains(&"authenticated"));
        assert!(!keys.contains(&"required-fields"));
        // Defaults always present.
        assert!(keys.contains(&"visibility"));
        assert!(keys.contains(&"cascade"));

        let methods = pairs.iter().find(|(k, _)| k == "methods").unwrap();
        assert_eq!(
            methods.1,
            AnnotationValue::StrSet(std::iter::once("post".to_string()).collect()),
        );
    }
}
