//! Hierarchical registry of named, path-addressed composition units.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::handler::HandlerSet;

/// Index of a component in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

#[derive(Debug)]
pub struct ComponentNode {
    name: String,
    parent: Option<ComponentId>,
    /// Root-to-node join, computed once at creation. The root contributes
    /// no segment, so the root path is `""` and its child `a` is `/a`.
    path: String,
    source_paths: BTreeSet<PathBuf>,
    children: BTreeMap<String, ComponentId>,
    handler_groups: BTreeMap<String, Vec<Arc<HandlerSet>>>,
}

/// The component tree. Single writer during boot, read-only afterwards.
#[derive(Debug)]
pub struct ComponentTree {
    nodes: Vec<ComponentNode>,
}

impl ComponentTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![ComponentNode {
                name: String::new(),
                parent: None,
                path: String::new(),
                source_paths: BTreeSet::new(),
                children: BTreeMap::new(),
                handler_groups: BTreeMap::new(),
            }],
        }
    }

    pub fn root(&self) -> ComponentId {
        ComponentId(0)
    }

    /// Fetch or create the child `name` under `parent`. An existing child
    /// absorbs the new source path; its computed path never changes.
    pub fn get_or_create(
        &mut self,
        parent: ComponentId,
        name: &str,
        source: &Path,
    ) -> ComponentId {
        // Registrations without a filesystem origin contribute no source.
        let attributed = !source.as_os_str().is_empty();

        if let Some(&existing) = self.node(parent).children.get(name) {
            if attributed {
                self.nodes[existing.0].source_paths.insert(source.to_path_buf());
            }
            return existing;
        }

        let path = format!("{}/{}", self.node(parent).path, name);
        let id = ComponentId(self.nodes.len());
        let mut source_paths = BTreeSet::new();
        if attributed {
            source_paths.insert(source.to_path_buf());
        }
        self.nodes.push(ComponentNode {
            name: name.to_string(),
            parent: Some(parent),
            path,
            source_paths,
            children: BTreeMap::new(),
            handler_groups: BTreeMap::new(),
        });
        self.nodes[parent.0].children.insert(name.to_string(), id);
        id
    }

    /// Walk `path` (`/a/b`) from the root, creating missing components.
    pub fn ensure_path(&mut self, path: &str, source: &Path) -> ComponentId {
        let mut current = self.root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self.get_or_create(current, segment, source);
        }
        current
    }

    /// Resolve a component path without creating anything.
    pub fn find(&self, path: &str) -> Option<ComponentId> {
        let mut current = self.root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = *self.node(current).children.get(segment)?;
        }
        Some(current)
    }

    pub fn path(&self, id: ComponentId) -> &str {
        &self.node(id).path
    }

    pub fn name(&self, id: ComponentId) -> &str {
        &self.node(id).name
    }

    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.node(id).parent
    }

    /// Walk parent links until the app root.
    pub fn root_of(&self, id: ComponentId) -> ComponentId {
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            current = parent;
        }
        current
    }

    pub fn source_paths(&self, id: ComponentId) -> &BTreeSet<PathBuf> {
        &self.node(id).source_paths
    }

    pub fn children(&self, id: ComponentId) -> impl Iterator<Item = ComponentId> + '_ {
        self.node(id).children.values().copied()
    }

    pub(crate) fn add_handler_set(&mut self, id: ComponentId, group: &str, set: Arc<HandlerSet>) {
        self.nodes[id.0]
            .handler_groups
            .entry(group.to_string())
            .or_default()
            .push(set);
    }

    /// Group name → sibling sets in registration (cascade) order.
    pub fn handler_groups(
        &self,
        id: ComponentId,
    ) -> &BTreeMap<String, Vec<Arc<HandlerSet>>> {
        &self.node(id).handler_groups
    }

    pub fn ids(&self) -> impl Iterator<Item = ComponentId> {
        (0..self.nodes.len()).map(ComponentId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root always exists.
        false
    }

    fn node(&self, id: ComponentId) -> &ComponentNode {
        &self.nodes[id.0]
    }
}

impl Default for ComponentTree {
    fn default() -> Self {
        Self::new()
    }
}
