use std::collections::{BTreeMap, HashSet};

use super::ContextStore;
use crate::error::StoreError;
use crate::model::{PathSegment, TreeNode};

impl ContextStore {
    /// Reparent `id` under `new_parent` (or make it a root).
    ///
    /// Rejected without touching any state when `id` is unknown, the new
    /// parent is unknown, the new parent is `id` itself, or the new parent
    /// is a descendant of `id`.
    pub fn try_move(&mut self, id: &str, new_parent: Option<&str>) -> Result<(), StoreError> {
        let old_parent = match self.nodes.get(id) {
            Some(node) => node.parent_id.clone(),
            None => return Err(StoreError::not_found(id)),
        };
        let new_parent = new_parent.filter(|p| !p.is_empty());

        if let Some(parent) = new_parent {
            if parent == id {
                return Err(StoreError::Validation(format!(
                    "Cannot move context {id} under itself"
                )));
            }
            if !self.nodes.contains_key(parent) {
                return Err(StoreError::not_found(parent));
            }
            if self.is_ancestor(id, parent) {
                return Err(StoreError::Validation(format!(
                    "Cannot move context {id} under its descendant {parent}"
                )));
            }
        }

        if old_parent.as_deref() == new_parent {
            return Ok(());
        }

        if let Some(old) = old_parent.as_deref() {
            if let Some(node) = self.nodes.get_mut(old) {
                if node.remove_child(id) {
                    self.persist(old);
                }
            }
        }

        if let Some(parent) = new_parent {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.add_child(id);
            }
            self.persist(parent);
        }

        let node = self.node_mut(id)?;
        node.parent_id = new_parent.map(String::from);
        node.updated_at = chrono::Utc::now();
        self.persist(id);

        tracing::debug!(
            "Moved context {id} from {} to {}",
            old_parent.as_deref().unwrap_or("<root>"),
            new_parent.unwrap_or("<root>")
        );
        Ok(())
    }

    /// `try_move` reporting only whether the move happened.
    pub fn move_node(&mut self, id: &str, new_parent: Option<&str>) -> bool {
        match self.try_move(id, new_parent) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Move rejected: {e}");
                false
            }
        }
    }

    /// Whether `ancestor` appears on the parent chain starting at `node`.
    fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        let mut seen = HashSet::new();
        let mut cursor = self.nodes.get(node).and_then(|n| n.parent_id.as_deref());
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            cursor = self.nodes.get(id).and_then(|n| n.parent_id.as_deref());
        }
        false
    }

    /// Root-to-node path. Stops early at a dangling parent or a repeated id.
    /// Empty when `id` is unknown.
    pub fn path(&self, id: &str) -> Vec<PathSegment> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(id);

        while let Some(current) = cursor {
            if !seen.insert(current) {
                tracing::warn!("Parent cycle detected at context {current}");
                break;
            }
            let Some(node) = self.nodes.get(current) else {
                break;
            };
            path.push(PathSegment {
                id: node.id.clone(),
                name: node.name.clone(),
                context_type: node.context_type,
            });
            cursor = node.parent_id.as_deref();
        }

        path.reverse();
        path
    }

    /// Nested view of the tree.
    ///
    /// With a root id the result holds that one subtree (or nothing if the id
    /// is unknown). Otherwise every node without a live parent starts a tree,
    /// and nodes caught in a parent cycle start one after those.
    pub fn tree(&self, root: Option<&str>) -> Vec<TreeNode> {
        let mut seen = HashSet::new();
        let Some(root) = root else {
            return self.forest(&mut seen);
        };
        self.expand(root, &mut seen).into_iter().collect()
    }

    fn forest<'a>(&'a self, seen: &mut HashSet<&'a str>) -> Vec<TreeNode> {
        let ordered = self.nodes();
        let mut trees: Vec<TreeNode> = ordered
            .iter()
            .copied()
            .filter(|n| {
                n.parent_id
                    .as_deref()
                    .map_or(true, |p| !self.nodes.contains_key(p))
            })
            .filter_map(|n| self.expand(&n.id, seen))
            .collect();

        for node in ordered {
            if seen.contains(node.id.as_str()) {
                continue;
            }
            tracing::warn!("Context {} is not reachable from any root", node.id);
            trees.extend(self.expand(&node.id, seen));
        }
        trees
    }

    fn expand<'a>(&'a self, id: &'a str, seen: &mut HashSet<&'a str>) -> Option<TreeNode> {
        if !seen.insert(id) {
            return None;
        }
        let node = self.nodes.get(id)?;
        let children = node
            .children
            .iter()
            .filter_map(|child| self.expand(child, seen))
            .collect();
        Some(TreeNode {
            id: node.id.clone(),
            name: node.name.clone(),
            context_type: node.context_type,
            content: node.content.clone(),
            project_id: node.project_id.clone(),
            parent_id: node.parent_id.clone(),
            has_children: !node.children.is_empty(),
            is_selected: self.is_selected(&node.id),
            created_at: node.created_at,
            updated_at: node.updated_at,
            children,
        })
    }

    /// Make every `children` list the inverse of the `parent_id` links.
    ///
    /// Existing order is kept for valid entries, stale ids are dropped and
    /// missing children are appended in creation order. Returns the ids whose
    /// list changed.
    pub(super) fn rebuild_children(&mut self) -> Vec<String> {
        let mut expected: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for node in self.nodes() {
            if let Some(parent) = &node.parent_id {
                if self.nodes.contains_key(parent) && parent != &node.id {
                    expected
                        .entry(parent.clone())
                        .or_default()
                        .push(node.id.clone());
                }
            }
        }

        let mut changed = Vec::new();
        for (id, node) in self.nodes.iter_mut() {
            let wanted = expected.remove(id).unwrap_or_default();
            let mut rebuilt: Vec<String> = Vec::with_capacity(wanted.len());
            for child in &node.children {
                if wanted.contains(child) && !rebuilt.contains(child) {
                    rebuilt.push(child.clone());
                }
            }
            for child in wanted {
                if !rebuilt.contains(&child) {
                    rebuilt.push(child);
                }
            }
            if rebuilt != node.children {
                node.children = rebuilt;
                changed.push(id.clone());
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::NewContext;
    use super::*;
    use crate::model::ContextType;

    fn chain(store: &mut ContextStore) -> (String, String, String) {
        let a = store.create(NewContext::new("a", ContextType::Outline, "A"));
        let b = store.create(NewContext::new("b", ContextType::Events, "B").parent(&a));
        let c = store.create(NewContext::new("c", ContextType::Events, "C").parent(&b));
        (a, b, c)
    }

    #[test]
    fn test_move_reparents_and_persists() {
        let (tmp, mut store) = open_temp();
        let (a, b, c) = chain(&mut store);

        assert!(store.move_node(&c, Some(&a)));
        assert_eq!(store.get(&c).unwrap().parent_id.as_deref(), Some(a.as_str()));
        assert_eq!(store.get(&a).unwrap().children, vec![b.clone(), c.clone()]);
        assert!(store.get(&b).unwrap().children.is_empty());
        assert_tree_consistent(&store);

        let reopened = ContextStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.get(&a).unwrap().children, vec![b, c]);
    }

    #[test]
    fn test_move_to_root() {
        let (_tmp, mut store) = open_temp();
        let (a, b, _c) = chain(&mut store);
        assert!(store.move_node(&b, None));
        assert_eq!(store.get(&b).unwrap().parent_id, None);
        assert!(store.get(&a).unwrap().children.is_empty());
        assert_eq!(store.tree(None).len(), 2);
        assert_tree_consistent(&store);
    }

    #[test]
    fn test_move_rejections_leave_state_identical() {
        let (tmp, mut store) = open_temp();
        let (a, b, c) = chain(&mut store);

        let before_nodes: Vec<_> = store.nodes().into_iter().cloned().collect();
        let before_disk = disk_snapshot(tmp.path());

        assert!(!store.move_node(&a, Some(&a)));
        assert!(!store.move_node(&a, Some(&b)));
        assert!(!store.move_node(&a, Some(&c)));
        assert!(!store.move_node(&a, Some("ghost")));
        assert!(!store.move_node("ghost", Some(&a)));

        let after_nodes: Vec<_> = store.nodes().into_iter().cloned().collect();
        assert_eq!(before_nodes, after_nodes);
        assert_eq!(before_disk, disk_snapshot(tmp.path()));
    }

    #[test]
    fn test_try_move_error_kinds() {
        let (_tmp, mut store) = open_temp();
        let (a, _b, c) = chain(&mut store);
        assert!(matches!(
            store.try_move(&a, Some(&c)),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.try_move("ghost", None),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_path_stops_on_dangling_parent_and_cycles() {
        let (_tmp, mut store) = open_temp();
        let (a, b, c) = chain(&mut store);
        assert_eq!(store.path(&c).len(), 3);
        assert!(store.path("ghost").is_empty());

        store.delete(&a);
        let ids: Vec<String> = store.path(&c).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b.clone(), c.clone()]);

        // A cycle that predates move validation.
        store.nodes.get_mut(&b).unwrap().parent_id = Some(c.clone());
        assert_eq!(store.path(&c).len(), 2);
        let _ = store.tree(Some(&b));
    }

    #[test]
    fn test_move_to_current_parent_is_a_no_op() {
        let (tmp, mut store) = open_temp();
        let a = store.create(NewContext::new("a", ContextType::Outline, ""));
        let b = store.create(NewContext::new("b", ContextType::Events, "").parent(&a));
        let c = store.create(NewContext::new("c", ContextType::Events, "").parent(&a));
        let before_disk = disk_snapshot(tmp.path());

        assert!(store.move_node(&b, Some(&a)));
        assert_eq!(store.get(&a).unwrap().children, vec![b.clone(), c.clone()]);
        assert_eq!(before_disk, disk_snapshot(tmp.path()));

        store.move_node(&b, None);
        let before_disk = disk_snapshot(tmp.path());
        assert!(store.move_node(&b, None));
        assert_eq!(before_disk, disk_snapshot(tmp.path()));
    }

    #[test]
    fn test_tree_keeps_cycled_nodes_visible() {
        let (_tmp, mut store) = open_temp();
        let (a, b, c) = chain(&mut store);
        let lone = store.create(NewContext::new("lone", ContextType::Custom, ""));

        // Loaded records can carry links that a move would have refused.
        store.nodes.get_mut(&a).unwrap().parent_id = Some(c.clone());
        store.nodes.get_mut(&lone).unwrap().parent_id = Some(lone.clone());
        store.rebuild_children();

        let forest = store.tree(None);
        let mut ids: Vec<&str> = forest.iter().flat_map(|t| t.ids()).collect();
        ids.sort_unstable();
        let mut expected = vec![a.as_str(), b.as_str(), c.as_str(), lone.as_str()];
        expected.sort_unstable();
        assert_eq!(ids, expected);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].ids(), vec![a.as_str(), b.as_str(), c.as_str()]);
        assert_eq!(forest[1].id, lone);
    }

    #[test]
    fn test_tree_shapes() {
        let (_tmp, mut store) = open_temp();
        let (a, b, c) = chain(&mut store);
        let other = store.create(NewContext::new("d", ContextType::World, ""));

        let forest = store.tree(None);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].ids(), vec![a.as_str(), b.as_str(), c.as_str()]);
        assert_eq!(forest[1].id, other);
        assert!(forest[0].has_children);
        assert!(forest[0].is_selected);

        let sub = store.tree(Some(&b));
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].ids(), vec![b.as_str(), c.as_str()]);
        assert!(store.tree(Some("ghost")).is_empty());
    }

    #[test]
    fn test_rebuild_children_keeps_order_and_fixes_drift() {
        let (_tmp, mut store) = open_temp();
        let a = store.create(NewContext::new("a", ContextType::Outline, ""));
        let b = store.create(NewContext::new("b", ContextType::Events, "").parent(&a));
        let c = store.create(NewContext::new("c", ContextType::Events, "").parent(&a));
        assert!(store.rebuild_children().is_empty());

        let node = store.nodes.get_mut(&a).unwrap();
        node.children = vec![c.clone(), "stale".into(), c.clone()];
        assert_eq!(store.rebuild_children(), vec![a.clone()]);
        assert_eq!(store.get(&a).unwrap().children, vec![c, b]);
    }
}
