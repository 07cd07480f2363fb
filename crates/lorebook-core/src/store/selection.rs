use super::ContextStore;
use crate::error::StoreError;
use crate::model::Entry;

/// Assembled text when no context is selected.
pub const NO_SELECTION: &str = "【未选择任何上下文】";

impl ContextStore {
    /// Replace the selection with `ids`, in the order given.
    /// Unknown ids are dropped with a warning; repeats keep their first position.
    pub fn select<S: AsRef<str>>(&mut self, ids: &[S]) {
        let ids = ids.iter().map(|s| s.as_ref().to_string()).collect();
        self.selection = self.known_unique(ids);
        self.persist_selection();
    }

    pub fn deselect<S: AsRef<str>>(&mut self, ids: &[S]) {
        let before = self.selection.len();
        self.selection
            .retain(|s| !ids.iter().any(|id| id.as_ref() == s));
        if self.selection.len() != before {
            self.persist_selection();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.persist_selection();
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selection
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.iter().any(|s| s == id)
    }

    /// Render the selected nodes as one text, in selection order:
    /// a `=== <type>: <name> ===` header over each node's selected entries,
    /// blocks separated by a blank line.
    pub fn selected_content(&self) -> String {
        let blocks: Vec<String> = self
            .selection
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| {
                format!(
                    "=== {}: {} ===\n{}",
                    node.context_type.label(),
                    node.name,
                    node.selected_items_content()
                )
            })
            .collect();

        if blocks.is_empty() {
            return NO_SELECTION.to_string();
        }
        blocks.join("\n\n")
    }

    // -- entry level --

    pub fn items(&self, id: &str) -> Result<&[Entry], StoreError> {
        self.nodes
            .get(id)
            .map(|n| n.items())
            .ok_or_else(|| StoreError::not_found(id))
    }

    pub fn get_item(&self, id: &str, item_id: &str) -> Result<&Entry, StoreError> {
        let node = self.nodes.get(id).ok_or_else(|| StoreError::not_found(id))?;
        node.get_item(item_id).ok_or_else(|| StoreError::ItemNotFound {
            context_id: id.to_string(),
            item_id: item_id.to_string(),
        })
    }

    /// Append an entry to a node and return the entry id.
    pub fn add_item(
        &mut self,
        id: &str,
        text: &str,
        item_id: Option<&str>,
    ) -> Result<String, StoreError> {
        let item_id = self.node_mut(id)?.add_item(text, item_id)?;
        self.persist(id);
        Ok(item_id)
    }

    /// Returns false when the node has no such entry.
    pub fn update_item(&mut self, id: &str, item_id: &str, text: &str) -> Result<bool, StoreError> {
        let updated = self.node_mut(id)?.update_item(item_id, text);
        if updated {
            self.persist(id);
        }
        Ok(updated)
    }

    pub fn delete_item(&mut self, id: &str, item_id: &str) -> Result<bool, StoreError> {
        let deleted = self.node_mut(id)?.delete_item(item_id);
        if deleted {
            self.persist(id);
        }
        Ok(deleted)
    }

    pub fn select_items<S: AsRef<str>>(&mut self, id: &str, item_ids: &[S]) -> Result<(), StoreError> {
        self.node_mut(id)?.select_items(item_ids);
        self.persist(id);
        Ok(())
    }

    pub fn deselect_items<S: AsRef<str>>(
        &mut self,
        id: &str,
        item_ids: &[S],
    ) -> Result<(), StoreError> {
        self.node_mut(id)?.deselect_items(item_ids);
        self.persist(id);
        Ok(())
    }

    pub fn clear_item_selection(&mut self, id: &str) -> Result<(), StoreError> {
        self.node_mut(id)?.clear_item_selection();
        self.persist(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::NewContext;
    use super::*;
    use crate::model::ContextType;

    #[test]
    fn test_empty_selection_sentinel() {
        let (_tmp, mut store) = open_temp();
        assert_eq!(store.selected_content(), NO_SELECTION);

        for i in 0..5 {
            store.create(NewContext::new(format!("n{i}"), ContextType::Custom, "x"));
        }
        store.clear_selection();
        assert_eq!(store.selected_content(), "【未选择任何上下文】");
    }

    #[test]
    fn test_select_replaces_and_keeps_order() {
        let (_tmp, mut store) = open_temp();
        let a = store.create(NewContext::new("主角", ContextType::Character, "年轻侠客"));
        let b = store.create(NewContext::new("江湖", ContextType::World, "刀光剑影"));

        store.select(&[b.clone(), "ghost".to_string(), a.clone(), b.clone()]);
        assert_eq!(store.selected_ids(), &[b.clone(), a.clone()]);
        assert_eq!(
            store.selected_content(),
            "=== 世界设定: 江湖 ===\n刀光剑影\n\n=== 人物设定: 主角 ===\n年轻侠客"
        );

        store.select(&[a.clone()]);
        assert!(!store.is_selected(&b));
        assert_eq!(store.selected_content(), "=== 人物设定: 主角 ===\n年轻侠客");
    }

    #[test]
    fn test_select_is_idempotent() {
        let (_tmp, mut store) = open_temp();
        let a = store.create(NewContext::new("a", ContextType::Outline, "one"));
        let b = store.create(NewContext::new("b", ContextType::Events, "two"));
        let ids = [b, a];

        store.select(&ids);
        let first = store.selected_content();
        store.select(&ids);
        assert_eq!(store.selected_content(), first);
    }

    #[test]
    fn test_deselect_and_persisted_selection() {
        let (tmp, mut store) = open_temp();
        let a = store.create(NewContext::new("a", ContextType::Outline, "one"));
        let b = store.create(NewContext::new("b", ContextType::Events, "two"));
        store.deselect(&[a.clone()]);
        assert_eq!(store.selected_ids(), &[b.clone()]);

        let reopened = ContextStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.selected_ids(), &[b.clone()]);

        // Selected node removed behind the store's back.
        std::fs::remove_file(tmp.path().join("contexts").join(format!("{b}.json"))).unwrap();
        let reopened = ContextStore::open(tmp.path()).unwrap();
        assert!(reopened.selected_ids().is_empty());
        assert_eq!(reopened.selected_content(), NO_SELECTION);
    }

    #[test]
    fn test_item_level_selection_in_assembly() {
        let (_tmp, mut store) = open_temp();
        let id = store.create(NewContext::new("大纲", ContextType::Outline, "第一卷"));
        store.add_item(&id, "第二卷", None).unwrap();
        store.add_item(&id, "第三卷", None).unwrap();
        store.select(&[id.clone()]);

        assert_eq!(
            store.selected_content(),
            "=== 作品大纲: 大纲 ===\n第一卷\n第二卷\n第三卷"
        );

        store.select_items(&id, &["item_3", "item_1"]).unwrap();
        assert_eq!(store.selected_content(), "=== 作品大纲: 大纲 ===\n第一卷\n第三卷");

        store.deselect_items(&id, &["item_1"]).unwrap();
        assert_eq!(store.selected_content(), "=== 作品大纲: 大纲 ===\n第三卷");

        store.clear_item_selection(&id).unwrap();
        assert_eq!(
            store.selected_content(),
            "=== 作品大纲: 大纲 ===\n第一卷\n第二卷\n第三卷"
        );
    }

    #[test]
    fn test_item_wrappers_report_missing() {
        let (_tmp, mut store) = open_temp();
        let id = store.create(NewContext::new("a", ContextType::Custom, "one"));

        assert!(matches!(store.items("ghost"), Err(StoreError::NotFound { .. })));
        assert!(matches!(
            store.add_item("ghost", "x", None),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.get_item(&id, "item_9"),
            Err(StoreError::ItemNotFound { .. })
        ));
        assert!(!store.update_item(&id, "item_9", "x").unwrap());
        assert!(!store.delete_item(&id, "item_9").unwrap());

        assert!(store.update_item(&id, "item_1", "uno").unwrap());
        assert_eq!(store.get_item(&id, "item_1").unwrap().content, "uno");
        assert!(store.delete_item(&id, "item_1").unwrap());
        assert!(store.items(&id).unwrap().is_empty());
    }
}
