//! The context store: every node in memory, mirrored one record per node on disk.
//!
//! The in-memory index is the source of truth for the running process. A
//! failed write is logged and remembered; `flush` retries it and reports
//! anything still unsaved.

mod saving;
mod selection;
mod tree;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::model::{
    ContentInput, ContextNode, ContextType, Metadata, NodeSummary, Project,
};
use crate::storage::FileBackend;

pub use saving::SaveMode;
pub use selection::NO_SELECTION;

/// Dirty-set key for the persisted selection (never a valid node id).
const SELECTION_KEY: &str = "<selection>";

/// Arguments for `ContextStore::create`.
#[derive(Debug, Clone)]
pub struct NewContext {
    pub name: String,
    pub context_type: ContextType,
    pub content: ContentInput,
    pub project_id: Option<String>,
    pub metadata: Option<Metadata>,
    pub parent_id: Option<String>,
}

impl NewContext {
    pub fn new(
        name: impl Into<String>,
        context_type: ContextType,
        content: impl Into<ContentInput>,
    ) -> Self {
        Self {
            name: name.into(),
            context_type,
            content: content.into(),
            project_id: None,
            metadata: None,
            parent_id: None,
        }
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Which nodes `list` returns relative to the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParentFilter {
    /// Every matching node at any depth.
    #[default]
    Any,
    /// Only nodes without a parent.
    Root,
    /// Only direct children of this id.
    Child(String),
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Defaults to the store's current project.
    pub project_id: Option<String>,
    pub context_type: Option<ContextType>,
    pub parent: ParentFilter,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreStats {
    pub total: usize,
    pub selected: usize,
    pub by_type: BTreeMap<ContextType, usize>,
    pub unsaved: usize,
}

#[derive(Debug)]
pub struct ContextStore {
    backend: FileBackend,
    config: StoreConfig,
    nodes: BTreeMap<String, ContextNode>,
    selection: Vec<String>,
    dirty: BTreeSet<String>,
}

impl ContextStore {
    /// Open the store in `dir` using its `config.json` (or defaults).
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let config = StoreConfig::load(dir)?;
        Self::open_with_config(dir, config)
    }

    /// Open the store in `dir`, loading every record and repairing the tree.
    pub fn open_with_config(dir: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        let backend = FileBackend::open(dir)?;
        let nodes = backend
            .read_all()?
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();

        let mut store = Self {
            backend,
            config,
            nodes,
            selection: Vec::new(),
            dirty: BTreeSet::new(),
        };

        for id in store.rebuild_children() {
            tracing::debug!("Repaired children list of context {id}");
            store.persist(&id);
        }

        let persisted = store.backend.read_selection();
        let before = persisted.len();
        store.selection = store.known_unique(persisted);
        if store.selection.len() != before {
            store.persist_selection();
        }

        tracing::info!(
            "Opened context store at {} ({} contexts, {} selected)",
            dir.display(),
            store.nodes.len(),
            store.selection.len()
        );
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        self.backend.root()
    }

    pub fn current_project(&self) -> &str {
        &self.config.current_project
    }

    // -- persistence --

    /// Write one node's record (or remove it if the node is gone).
    /// Failures are logged and kept for `flush`.
    fn persist(&mut self, id: &str) {
        let result = match self.nodes.get(id) {
            Some(node) => self.backend.write(node),
            None => self.backend.delete(id).map(|_| ()),
        };
        match result {
            Ok(()) => {
                self.dirty.remove(id);
            }
            Err(e) => {
                tracing::warn!("Failed to persist context {id}: {e}");
                self.dirty.insert(id.to_string());
            }
        }
    }

    fn persist_selection(&mut self) {
        match self.backend.write_selection(&self.selection) {
            Ok(()) => {
                self.dirty.remove(SELECTION_KEY);
            }
            Err(e) => {
                tracing::warn!("Failed to persist selection: {e}");
                self.dirty.insert(SELECTION_KEY.to_string());
            }
        }
    }

    /// Ids (or the selection) whose last write failed.
    pub fn unsaved(&self) -> Vec<String> {
        self.dirty.iter().cloned().collect()
    }

    /// Retry every failed write. Errors if anything is still unsaved.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let pending: Vec<String> = self.dirty.iter().cloned().collect();
        for id in pending {
            if id == SELECTION_KEY {
                self.persist_selection();
            } else {
                self.persist(&id);
            }
        }
        if self.dirty.is_empty() {
            return Ok(());
        }
        Err(StoreError::Persistence {
            id: self.unsaved().join(", "),
            source: std::io::Error::other(format!(
                "{} record(s) could not be written to {}",
                self.dirty.len(),
                self.backend.root().display()
            )),
        })
    }

    // -- lookups --

    pub fn get(&self, id: &str) -> Option<&ContextNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut ContextNode, StoreError> {
        self.nodes.get_mut(id).ok_or_else(|| StoreError::not_found(id))
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> Vec<&ContextNode> {
        let mut nodes: Vec<&ContextNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        nodes
    }

    pub fn nodes_by_type(&self, context_type: ContextType) -> Vec<&ContextNode> {
        self.nodes()
            .into_iter()
            .filter(|n| n.context_type == context_type)
            .collect()
    }

    fn first_of_type(&self, context_type: ContextType, project_id: &str) -> Option<String> {
        self.nodes()
            .into_iter()
            .find(|n| n.context_type == context_type && n.project_id == project_id)
            .map(|n| n.id.clone())
    }

    /// Summaries of the nodes matching `filter`, in creation order.
    pub fn list(&self, filter: &ListFilter) -> Vec<NodeSummary> {
        let project = filter
            .project_id
            .as_deref()
            .unwrap_or(&self.config.current_project);

        self.nodes()
            .into_iter()
            .filter(|n| n.project_id == project)
            .filter(|n| filter.context_type.map_or(true, |t| n.context_type == t))
            .filter(|n| match &filter.parent {
                ParentFilter::Any => true,
                ParentFilter::Root => n.parent_id.is_none(),
                ParentFilter::Child(parent) => n.parent_id.as_deref() == Some(parent.as_str()),
            })
            .map(|n| NodeSummary::of(n, self.is_selected(&n.id)))
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let mut by_type = BTreeMap::new();
        for node in self.nodes.values() {
            *by_type.entry(node.context_type).or_insert(0) += 1;
        }
        StoreStats {
            total: self.nodes.len(),
            selected: self.selection.len(),
            by_type,
            unsaved: self.dirty.len(),
        }
    }

    // -- mutations --

    /// Create a node and return its id.
    ///
    /// A `parent_id` naming an existing node links the new node under it; one
    /// naming nothing is kept as a dangling reference.
    pub fn create(&mut self, new: NewContext) -> String {
        let mut id = ContextNode::generate_id();
        while self.nodes.contains_key(&id) {
            id = ContextNode::generate_id();
        }
        let project_id = new
            .project_id
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.config.current_project.clone());
        let parent_id = new.parent_id.filter(|p| !p.is_empty());

        let node = ContextNode::new(
            id.clone(),
            new.name,
            new.context_type,
            new.content,
            project_id,
            new.metadata,
            parent_id.clone(),
        );
        self.nodes.insert(id.clone(), node);
        self.persist(&id);

        if let Some(parent_id) = parent_id {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.add_child(&id);
                self.persist(&parent_id);
            }
        }

        if self.config.auto_select_created {
            self.selection.push(id.clone());
            self.persist_selection();
        }

        tracing::debug!("Created context {id}");
        id
    }

    /// Replace a node's content (see `ContextNode::update`) and persist it.
    pub fn update(
        &mut self,
        id: &str,
        content: ContentInput,
        metadata: Option<Metadata>,
    ) -> Result<(), StoreError> {
        self.node_mut(id)?.update(content, metadata);
        self.persist(id);
        Ok(())
    }

    /// Rename a node.
    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), StoreError> {
        let node = self.node_mut(id)?;
        node.name = name.to_string();
        node.updated_at = chrono::Utc::now();
        self.persist(id);
        Ok(())
    }

    /// Remove a node, its record and its selection membership.
    ///
    /// Children are not deleted: they keep `parent_id` pointing at the removed
    /// node and surface as roots in `tree`.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(node) = self.nodes.remove(id) else {
            return false;
        };

        if self.selection.iter().any(|s| s == id) {
            self.selection.retain(|s| s != id);
            self.persist_selection();
        }

        if let Some(parent_id) = &node.parent_id {
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                if parent.remove_child(id) {
                    self.persist(parent_id);
                }
            }
        }

        self.persist(id);
        tracing::debug!(
            "Deleted context {id} ({} orphaned children)",
            node.children.len()
        );
        true
    }

    // -- projects --

    /// Record a project and make it the current one.
    pub fn create_project(&mut self, id: &str, name: &str) -> Result<(), StoreError> {
        self.backend.write_project(&Project::new(id, name))?;
        self.set_current_project(id)
    }

    pub fn set_current_project(&mut self, id: &str) -> Result<(), StoreError> {
        self.config.current_project = id.to_string();
        self.config.save(self.backend.root())
    }

    pub fn projects(&self) -> Result<Vec<Project>, StoreError> {
        self.backend.read_projects()
    }

    /// Deduplicate `ids`, keeping first occurrences of ids that exist.
    fn known_unique(&self, ids: Vec<String>) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            if !self.nodes.contains_key(&id) {
                tracing::warn!("Context not found, skipping: {id}");
                continue;
            }
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use tempfile::TempDir;

    pub fn open_temp() -> (TempDir, ContextStore) {
        let tmp = TempDir::new().unwrap();
        let store = ContextStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    /// Snapshot of every record on disk, for "nothing changed" assertions.
    pub fn disk_snapshot(dir: &Path) -> BTreeMap<String, String> {
        std::fs::read_dir(dir.join("contexts"))
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| {
                (
                    e.file_name().to_string_lossy().to_string(),
                    std::fs::read_to_string(e.path()).unwrap(),
                )
            })
            .collect()
    }

    /// Every node's `children` equals the inverse of all `parent_id`s.
    pub fn assert_tree_consistent(store: &ContextStore) {
        for node in store.nodes() {
            let mut expected: Vec<&str> = store
                .nodes()
                .into_iter()
                .filter(|c| c.parent_id.as_deref() == Some(node.id.as_str()))
                .map(|c| c.id.as_str())
                .collect();
            let mut actual: Vec<&str> = node.children.iter().map(String::as_str).collect();
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected, "children of {} out of sync", node.id);
        }
    }
}
