use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// One independently selectable piece of text inside a context node.
/// `id` is unique within its owning node only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::lenient")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::lenient")]
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.updated_at = Utc::now();
    }
}

/// Content as supplied by a caller: either "the primary text" or a full entry list.
///
/// Nodes normalise this to an entry list as soon as they receive it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContentInput {
    Text(String),
    Entries(Vec<Entry>),
}

impl ContentInput {
    /// Id given to the synthetic entry wrapping plain-text content.
    pub const PRIMARY_ID: &'static str = "item_1";

    pub fn into_entries(self) -> Vec<Entry> {
        match self {
            Self::Text(text) => vec![Entry::new(Self::PRIMARY_ID, text)],
            Self::Entries(entries) => entries,
        }
    }
}

impl From<&str> for ContentInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ContentInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Entry>> for ContentInput {
    fn from(entries: Vec<Entry>) -> Self {
        Self::Entries(entries)
    }
}

/// Normalise a persisted `content` value of any historical shape into entries.
///
/// Strings become the primary entry, arrays are read element by element
/// (objects as entries, bare strings as auto-numbered entries), and any other
/// JSON value is kept as its compact text.
pub(crate) fn entries_from_value(value: serde_json::Value) -> Vec<Entry> {
    use serde_json::Value;

    match value {
        Value::Null => Vec::new(),
        Value::String(text) => ContentInput::Text(text).into_entries(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                Value::String(text) => Some(Entry::new(format!("item_{}", i + 1), text)),
                Value::Object(_) => match serde_json::from_value::<Entry>(item) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!("Dropping unreadable entry #{}: {e}", i + 1);
                        None
                    }
                },
                other => Some(Entry::new(format!("item_{}", i + 1), other.to_string())),
            })
            .collect(),
        other => ContentInput::Text(other.to_string()).into_entries(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_wraps_as_primary_entry() {
        let entries = ContentInput::from("年轻侠客").into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "item_1");
        assert_eq!(entries[0].content, "年轻侠客");
    }

    #[test]
    fn test_content_input_untagged() {
        let text: ContentInput = serde_json::from_value(json!("plain")).unwrap();
        assert_eq!(text, ContentInput::Text("plain".into()));

        let list: ContentInput =
            serde_json::from_value(json!([{"id": "a", "content": "x"}])).unwrap();
        match list {
            ContentInput::Entries(entries) => {
                assert_eq!(entries[0].id, "a");
                assert_eq!(entries[0].content, "x");
            }
            other => panic!("expected entries, got {other:?}"),
        }
    }

    #[test]
    fn test_entries_from_legacy_values() {
        assert!(entries_from_value(json!(null)).is_empty());

        let mixed = entries_from_value(json!([
            {"id": "item_1", "content": "one", "created_at": "2024-01-02T03:04:05.000001"},
            "two",
            {"content": "missing id"},
        ]));
        assert_eq!(mixed.len(), 2);
        assert_eq!(mixed[0].content, "one");
        assert_eq!(mixed[1].id, "item_2");

        let object = entries_from_value(json!({"title": "书名"}));
        assert_eq!(object.len(), 1);
        assert!(object[0].content.contains("书名"));
    }
}
