//! Application boot and the frozen dispatch products.
//!
//! # Data Flow
//! ```text
//! ServerConfig
//!     → AppBuilder (single writer)
//!         scan overlay roots → component tree
//!         register handler sets → annotations, handler groups
//!         register schemas / resources
//!     → build(): scope views, route table, finalize, freeze
//!     → Arc<App> shared read-only by every request
//! ```
//!
//! # Design Decisions
//! - Everything mutable lives on the builder; `App` has no post-boot write
//!   path, so requests share it without locks
//! - Duplicate registration is fatal at boot, never a runtime surprise
//! - Annotations (component name/path, method path, metadata) are written
//!   at registration so the table builder and router only read

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::component::scanner::{scan_roots, ScanError};
use crate::component::tree::{ComponentId, ComponentTree};
use crate::config::schema::ServerConfig;
use crate::handler::annotations::{keys, AnnotationStore, AnnotationValue};
use crate::handler::params::{Injector, ResourceMap};
use crate::handler::{HandlerSet, Scope};
use crate::http::request::RequestInfo;
use crate::http::session::SessionStore;
use crate::routing::router::{get_methods, Candidate, CandidateFilter};
use crate::routing::table::{build_table, RouteTable, ScopeMap};
use crate::security::gate::SecurityGate;
use crate::security::schema::{SchemaDef, SchemaRegistry};

/// Fatal boot-time errors.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("handler group `{group}` on component `{component}` is already registered from `{origin}`")]
    DuplicateRegistration {
        component: String,
        group: String,
        origin: String,
    },
    #[error("duplicate handler `{name}` in group `{group}` on component `{component}`")]
    DuplicateHandler {
        component: String,
        group: String,
        name: String,
    },
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// The frozen application: every field is read-only once built.
pub struct App {
    pub config: ServerConfig,
    pub tree: ComponentTree,
    pub annotations: AnnotationStore,
    pub table: RouteTable,
    pub gate: SecurityGate,
    pub injector: Injector,
    pub schemas: SchemaRegistry,
    pub resources: ResourceMap,
    pub sessions: SessionStore,
}

impl App {
    pub fn builder(config: ServerConfig) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// Ordered candidates for a request path; see the routing subsystem for
    /// cascade and visibility semantics.
    pub fn get_methods(
        &self,
        request: &RequestInfo,
        filter: Option<&CandidateFilter<'_>>,
    ) -> Vec<Candidate> {
        get_methods(&self.table, &self.annotations, &request.path, filter)
    }
}

/// Single-writer boot phase.
pub struct AppBuilder {
    config: ServerConfig,
    tree: ComponentTree,
    annotations: AnnotationStore,
    injector: Injector,
    gate: SecurityGate,
    schemas: SchemaRegistry,
    resources: ResourceMap,
}

impl AppBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            tree: ComponentTree::new(),
            annotations: AnnotationStore::new(),
            injector: Injector::new(),
            gate: SecurityGate::new(),
            schemas: SchemaRegistry::new(),
            resources: ResourceMap::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Walk the configured overlay roots into the component tree.
    pub fn scan_components(&mut self) -> Result<usize, BootError> {
        let roots: Vec<PathBuf> = self
            .config
            .components
            .roots
            .iter()
            .map(PathBuf::from)
            .collect();
        let visited = scan_roots(&mut self.tree, &roots)?;
        info!(roots = roots.len(), components = visited, "component roots scanned");
        Ok(visited)
    }

    /// Create (or fetch) a component by path.
    pub fn component(&mut self, path: &str, source: &Path) -> ComponentId {
        self.tree.ensure_path(path, source)
    }

    /// Attach a handler set to `(component_path, group)`. Sibling sets from
    /// different overlay roots are legal and compose in registration order;
    /// a second set from the same source, or a duplicate handler name
    /// within one set, aborts boot.
    pub fn register_handlers(
        &mut self,
        component_path: &str,
        group: &str,
        mut set: HandlerSet,
    ) -> Result<(), BootError> {
        let mut names = HashSet::new();
        for entry in set.entries() {
            if !names.insert(entry.name.clone()) {
                return Err(BootError::DuplicateHandler {
                    component: component_path.to_string(),
                    group: group.to_string(),
                    name: entry.name.clone(),
                });
            }
        }

        let source = set.source().cloned();
        let component = self.tree.ensure_path(
            component_path,
            source.as_deref().unwrap_or_else(|| Path::new("")),
        );

        if let Some(siblings) = self.tree.handler_groups(component).get(group) {
            if siblings.iter().any(|existing| existing.source() == set.source()) {
                return Err(BootError::DuplicateRegistration {
                    component: component_path.to_string(),
                    group: group.to_string(),
                    origin: source
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "<unattributed>".to_string()),
                });
            }
        }

        let component_name = self.tree.name(component).to_string();
        let component_path = self.tree.path(component).to_string();

        for entry in set.entries_mut() {
            let id = self.annotations.allocate();
            entry.id = id;
            let method_path = format!("{component_path}/{group}/{name}", name = entry.name);
            self.annotations.set(
                id,
                keys::COMPONENT_NAME,
                AnnotationValue::Str(component_name.clone()),
            );
            self.annotations.set(
                id,
                keys::COMPONENT_PATH,
                AnnotationValue::Str(component_path.clone()),
            );
            self.annotations
                .set(id, keys::METHOD_PATH, AnnotationValue::Str(method_path));
            self.annotations.set_from(id, entry.meta.to_annotations());
        }

        self.tree.add_handler_set(component, group, Arc::new(set));
        Ok(())
    }

    /// Register a named body schema for the `schema` predicate.
    pub fn schema(&mut self, name: impl Into<String>, schema: SchemaDef) -> &mut Self {
        self.schemas.register(name, schema);
        self
    }

    /// Register a named resource connection, injectable by name.
    pub fn resource(
        &mut self,
        name: impl Into<String>,
        value: Arc<dyn std::any::Any + Send + Sync>,
    ) -> &mut Self {
        self.resources.insert(name.into(), value);
        self
    }

    pub fn injector_mut(&mut self) -> &mut Injector {
        &mut self.injector
    }

    pub fn gate_mut(&mut self) -> &mut SecurityGate {
        &mut self.gate
    }

    /// Build scope views, compile and freeze the route table, and hand out
    /// the immutable app.
    pub fn build(self) -> App {
        let mut scopes = ScopeMap::new();
        for component in self.tree.ids() {
            for (group, sets) in self.tree.handler_groups(component) {
                scopes.insert(
                    (component, group.clone()),
                    Arc::new(Scope::new(sets.clone())),
                );
            }
        }

        let mut table = build_table(&self.tree, &self.annotations, &scopes);
        table.finalize();

        info!(
            components = self.tree.len(),
            routes = table.len(),
            handlers = self.annotations.len(),
            "dispatch table frozen"
        );

        let sessions = SessionStore::new(Duration::from_secs(self.config.session.ttl_secs));

        App {
            config: self.config,
            tree: self.tree,
            annotations: self.annotations,
            table,
            gate: self.gate,
            injector: self.injector,
            schemas: self.schemas,
            resources: self.resources,
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, Flow, HandlerMeta};

    fn noop() -> crate::handler::HandlerFn {
        handler_fn(|_| async { Ok(Flow::Continue) })
    }

    #[test]
    fn duplicate_handler_name_in_one_set_is_fatal() {
        let mut builder = AppBuilder::new(ServerConfig::default());
        let err = builder
            .register_handlers(
                "/x",
                "g",
                HandlerSet::new()
                    .handler("a", HandlerMeta::new(), noop())
                    .handler("a", HandlerMeta::new(), noop()),
            )
            .unwrap_err();
        assert!(matches!(err, BootError::DuplicateHandler { .. }));
    }

    #[test]
    fn re_registering_the_same_source_is_fatal() {
        let mut builder = AppBuilder::new(ServerConfig::default());
        builder
            .register_handlers(
                "/x",
                "g",
                HandlerSet::from_root("/srv/base").handler("a", HandlerMeta::new(), noop()),
            )
            .unwrap();
        let err = builder
            .register_handlers(
                "/x",
                "g",
                HandlerSet::from_root("/srv/base").handler("b", HandlerMeta::new(), noop()),
            )
            .unwrap_err();
        assert!(matches!(err, BootError::DuplicateRegistration { .. }));
    }

    #[test]
    fn overlay_sets_compose_one_scope_in_registration_order() {
        let mut builder = AppBuilder::new(ServerConfig::default());
        builder
            .register_handlers(
                "/x",
                "g",
                HandlerSet::from_root("/srv/base")
                    .handler("shared", HandlerMeta::new().priority(1), noop())
                    .handler("foo", HandlerMeta::new(), noop()),
            )
            .unwrap();
        builder
            .register_handlers(
                "/x",
                "g",
                HandlerSet::from_root("/srv/theme")
                    .handler("shared", HandlerMeta::new().priority(2), noop())
                    .handler("bar", HandlerMeta::new(), noop()),
            )
            .unwrap();
        let app = builder.build();

        let bucket = app.table.bucket("/x/g/foo").unwrap();
        let scope = &bucket[0].scope;
        assert_eq!(scope.sibling_count(), 2);
        assert!(scope.has("foo"));
        assert!(scope.has("bar"));
        // First registrant wins for the shared member.
        assert_eq!(scope.get("shared").unwrap().meta.priority, 1);
    }

    #[test]
    fn registration_writes_identity_annotations() {
        let mut builder = AppBuilder::new(ServerConfig::default());
        builder
            .register_handlers(
                "/blog/posts",
                "api",
                HandlerSet::new().handler("list", HandlerMeta::new(), noop()),
            )
            .unwrap();
        let app = builder.build();

        let entry = &app.table.bucket("/blog/posts/api/list").unwrap()[0];
        let annotations = app.annotations.get_all(entry.id).unwrap();
        assert_eq!(
            annotations.get(keys::METHOD_PATH).and_then(|v| v.as_str()),
            Some("/blog/posts/api/list")
        );
        assert_eq!(
            annotations.get(keys::COMPONENT_NAME).and_then(|v| v.as_str()),
            Some("posts")
        );
        assert_eq!(
            annotations.get(keys::COMPONENT_PATH).and_then(|v| v.as_str()),
            Some("/blog/posts")
        );
        assert_eq!(
            annotations.get(keys::VISIBILITY).and_then(|v| v.as_str()),
            Some("public")
        );
    }
}
