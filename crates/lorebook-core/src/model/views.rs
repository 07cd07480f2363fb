use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ContextNode, ContextType, Entry};

const SUMMARY_PREVIEW_CHARS: usize = 50;

/// One row of `ContextStore::list`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NodeSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub context_type: ContextType,
    pub project_id: String,
    pub parent_id: Option<String>,
    pub has_children: bool,
    pub is_selected: bool,
    pub item_count: usize,
    pub selected_item_count: usize,
    pub preview: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NodeSummary {
    pub fn of(node: &ContextNode, is_selected: bool) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            context_type: node.context_type,
            project_id: node.project_id.clone(),
            parent_id: node.parent_id.clone(),
            has_children: !node.children.is_empty(),
            is_selected,
            item_count: node.content.len(),
            selected_item_count: node.live_selected_count(),
            preview: node.preview(SUMMARY_PREVIEW_CHARS),
            created_at: node.created_at,
            updated_at: node.updated_at,
        }
    }
}

/// One step of a root-to-node path.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PathSegment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub context_type: ContextType,
}

/// A node with its subtree expanded, as returned by `ContextStore::tree`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub context_type: ContextType,
    pub content: Vec<Entry>,
    pub project_id: String,
    pub parent_id: Option<String>,
    pub has_children: bool,
    pub is_selected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Ids of this node and every descendant, depth first.
    pub fn ids(&self) -> Vec<&str> {
        let mut out = vec![self.id.as_str()];
        for child in &self.children {
            out.extend(child.ids());
        }
        out
    }
}
