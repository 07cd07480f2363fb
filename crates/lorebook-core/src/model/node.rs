use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context_type::ContextType;
use super::entry::{entries_from_value, ContentInput, Entry};
use super::timestamp;
use crate::error::StoreError;

/// Project tag given to nodes created without one.
pub const DEFAULT_PROJECT: &str = "default";

pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A typed, named container of content entries, linked into the context tree.
///
/// `children` is a cache of the inverse of every node's `parent_id`; the store
/// rebuilds it after loading and keeps it in step on structural edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "NodeRecord")]
pub struct ContextNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub context_type: ContextType,
    pub content: Vec<Entry>,
    pub project_id: String,
    pub metadata: Metadata,
    pub parent_id: Option<String>,
    pub children: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub selected_items: BTreeSet<String>,
}

/// On-disk shape, tolerant of every field the older writers left out.
#[derive(Deserialize)]
struct NodeRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    context_type: ContextType,
    #[serde(default)]
    content: serde_json::Value,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    children: Option<Vec<String>>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::lenient")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::lenient")]
    updated_at: DateTime<Utc>,
    #[serde(default)]
    selected_items: Option<Vec<String>>,
}

impl From<NodeRecord> for ContextNode {
    fn from(r: NodeRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            context_type: r.context_type,
            content: entries_from_value(r.content),
            project_id: r
                .project_id
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            metadata: r.metadata.unwrap_or_default(),
            parent_id: r.parent_id.filter(|p| !p.is_empty()),
            children: r.children.unwrap_or_default(),
            created_at: r.created_at,
            updated_at: r.updated_at,
            selected_items: r.selected_items.unwrap_or_default().into_iter().collect(),
        }
    }
}

impl ContextNode {
    /// Short random id (8 hex chars). The store retries on the rare collision.
    pub fn generate_id() -> String {
        Uuid::new_v4().as_simple().to_string()[..8].to_string()
    }

    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        context_type: ContextType,
        content: ContentInput,
        project_id: impl Into<String>,
        metadata: Option<Metadata>,
        parent_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            context_type,
            content: content.into_entries(),
            project_id: project_id.into(),
            metadata: metadata.unwrap_or_default(),
            parent_id,
            children: Vec::new(),
            created_at: now,
            updated_at: now,
            selected_items: BTreeSet::new(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Replace content. Text edits the primary (first) entry, creating it if
    /// the node is empty; an entry list replaces the whole sequence.
    /// Metadata, when given, is merged key by key.
    pub fn update(&mut self, content: ContentInput, metadata: Option<Metadata>) {
        match content {
            ContentInput::Entries(entries) => self.content = entries,
            ContentInput::Text(text) => match self.content.first_mut() {
                Some(first) => first.set_content(text),
                None => self.content = ContentInput::Text(text).into_entries(),
            },
        }
        if let Some(metadata) = metadata {
            self.metadata.extend(metadata);
        }
        self.touch();
    }

    /// Append text to the primary entry, separated by a blank line.
    /// An empty primary entry is filled rather than padded.
    pub fn append_text(&mut self, text: &str) {
        match self.content.first_mut() {
            Some(first) if first.content.is_empty() => first.set_content(text),
            Some(first) => {
                let joined = format!("{}\n\n{text}", first.content);
                first.set_content(joined);
            }
            None => self.content = ContentInput::from(text).into_entries(),
        }
        self.touch();
    }

    /// Append a new entry and return its id.
    ///
    /// Without an explicit id, `item_<n+1>` is used (skipping forward past
    /// ids still in use after deletions). An explicit id that already exists
    /// in this node is rejected.
    pub fn add_item(&mut self, text: &str, item_id: Option<&str>) -> Result<String, StoreError> {
        let id = match item_id {
            Some(id) if self.get_item(id).is_some() => {
                return Err(StoreError::Validation(format!(
                    "Item id '{id}' already exists in context {}",
                    self.id
                )));
            }
            Some(id) => id.to_string(),
            None => {
                let mut n = self.content.len() + 1;
                while self.get_item(&format!("item_{n}")).is_some() {
                    n += 1;
                }
                format!("item_{n}")
            }
        };
        self.content.push(Entry::new(id.clone(), text));
        self.touch();
        Ok(id)
    }

    pub fn update_item(&mut self, item_id: &str, text: &str) -> bool {
        match self.content.iter_mut().find(|e| e.id == item_id) {
            Some(entry) => {
                entry.set_content(text);
                self.touch();
                true
            }
            None => false,
        }
    }

    pub fn delete_item(&mut self, item_id: &str) -> bool {
        let Some(pos) = self.content.iter().position(|e| e.id == item_id) else {
            return false;
        };
        self.content.remove(pos);
        self.selected_items.remove(item_id);
        self.touch();
        true
    }

    pub fn get_item(&self, item_id: &str) -> Option<&Entry> {
        self.content.iter().find(|e| e.id == item_id)
    }

    pub fn items(&self) -> &[Entry] {
        &self.content
    }

    /// Add entries to the item selection. Ids that match no entry are ignored.
    pub fn select_items<S: AsRef<str>>(&mut self, item_ids: &[S]) {
        for id in item_ids {
            let id = id.as_ref();
            if self.get_item(id).is_some() {
                self.selected_items.insert(id.to_string());
            }
        }
        self.touch();
    }

    pub fn deselect_items<S: AsRef<str>>(&mut self, item_ids: &[S]) {
        for id in item_ids {
            self.selected_items.remove(id.as_ref());
        }
        self.touch();
    }

    pub fn clear_item_selection(&mut self) {
        self.selected_items.clear();
        self.touch();
    }

    /// Text this node contributes to assembly.
    ///
    /// With no selected entries every entry is included; otherwise only the
    /// selected ones, in content order. Stale selected ids contribute nothing.
    pub fn selected_items_content(&self) -> String {
        if self.selected_items.is_empty() {
            return self.all_content();
        }
        self.content
            .iter()
            .filter(|e| self.selected_items.contains(&e.id))
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn all_content(&self) -> String {
        self.content
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of selected ids that still name an entry.
    pub fn live_selected_count(&self) -> usize {
        self.content
            .iter()
            .filter(|e| self.selected_items.contains(&e.id))
            .count()
    }

    /// First entry's text cut to `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> String {
        let first = self.content.first().map(|e| e.content.as_str()).unwrap_or("");
        truncate_chars(first, max_chars)
    }

    pub(crate) fn add_child(&mut self, child_id: &str) -> bool {
        if self.children.iter().any(|c| c == child_id) {
            return false;
        }
        self.children.push(child_id.to_string());
        true
    }

    pub(crate) fn remove_child(&mut self, child_id: &str) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c != child_id);
        self.children.len() != before
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
