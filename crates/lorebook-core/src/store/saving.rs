use super::{ContextStore, NewContext};
use crate::error::StoreError;
use crate::model::{ContentInput, ContextType, Metadata};
use crate::novel::NovelRecord;

/// How `save_to_context` writes text into a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Replace the primary entry.
    #[default]
    Replace,
    /// Append to the primary entry after a blank line.
    Append,
    /// Add the text as a new entry.
    NewItem,
}

impl SaveMode {
    /// `as_new_item` wins over `append` when both are set.
    pub fn from_flags(append: bool, as_new_item: bool) -> Self {
        match (append, as_new_item) {
            (_, true) => Self::NewItem,
            (true, false) => Self::Append,
            (false, false) => Self::Replace,
        }
    }
}

impl ContextStore {
    /// Write model output (or any text) into an existing node.
    ///
    /// Returns the new entry id in `NewItem` mode. Metadata is merged in every mode.
    pub fn save_to_context(
        &mut self,
        id: &str,
        text: &str,
        mode: SaveMode,
        metadata: Option<Metadata>,
    ) -> Result<Option<String>, StoreError> {
        let node = self.node_mut(id)?;
        let item_id = match mode {
            SaveMode::NewItem => Some(node.add_item(text, None)?),
            SaveMode::Append => {
                node.append_text(text);
                None
            }
            SaveMode::Replace => {
                node.update(ContentInput::from(text), None);
                None
            }
        };
        if let Some(metadata) = metadata {
            node.metadata.extend(metadata);
        }
        self.persist(id);
        Ok(item_id)
    }

    /// Append a timestamped question/answer pair to the project's history
    /// node, creating `<project>_对话历史` on first use. Returns its id.
    pub fn save_to_history(&mut self, question: &str, answer: &str, project_id: Option<&str>) -> String {
        let project = project_id
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.config.current_project)
            .to_string();

        let id = match self.first_of_type(ContextType::History, &project) {
            Some(id) => id,
            None => {
                let mut metadata = Metadata::new();
                metadata.insert("is_history".into(), serde_json::Value::Bool(true));
                self.create(
                    NewContext::new(format!("{project}_对话历史"), ContextType::History, "")
                        .project(project.clone())
                        .metadata(metadata),
                )
            }
        };

        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let record = format!("[{stamp}] 用户: {question}\n[{stamp}] AI: {answer}\n");

        if let Some(node) = self.nodes.get_mut(&id) {
            let current = node.content.first().map(|e| e.content.as_str()).unwrap_or("");
            let body = if current.is_empty() {
                record
            } else {
                format!("{current}\n{record}")
            };
            node.update(ContentInput::Text(body), None);
        }
        self.persist(&id);
        id
    }

    /// Append text to the first node of a type, or create `新建<label>` holding it.
    /// The current project is searched before the others. Returns the node id.
    pub fn save_to_type(&mut self, context_type: ContextType, text: &str) -> String {
        let existing = self
            .first_of_type(context_type, &self.config.current_project)
            .or_else(|| self.nodes_by_type(context_type).first().map(|n| n.id.clone()));

        match existing {
            Some(id) => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.append_text(text);
                }
                self.persist(&id);
                id
            }
            None => self.create(NewContext::new(
                format!("新建{}", context_type.label()),
                context_type,
                text,
            )),
        }
    }

    /// Store a scraped novel record as a NOVEL node. Returns the node id.
    ///
    /// An existing `context_id` has its content replaced; an unknown one gets a
    /// new `小说: <title>` node. Without an id the first NOVEL node of the
    /// current project is replaced, or a new one created.
    pub fn save_novel(
        &mut self,
        record: &NovelRecord,
        context_id: Option<&str>,
    ) -> Result<String, StoreError> {
        let target = match context_id.filter(|id| !id.is_empty()) {
            Some(id) if self.contains(id) => Some(id.to_string()),
            Some(_) => None,
            None => self.first_of_type(ContextType::Novel, &self.config.current_project),
        };

        let mut metadata = Metadata::new();
        metadata.insert("title".into(), serde_json::Value::String(record.title.clone()));
        if !record.original_url.is_empty() {
            metadata.insert(
                "source_url".into(),
                serde_json::Value::String(record.original_url.clone()),
            );
        }
        let content = ContentInput::Entries(ContentInput::from(record.render()).into_entries());

        match target {
            Some(id) => {
                self.update(&id, content, Some(metadata))?;
                Ok(id)
            }
            None => Ok(self.create(
                NewContext::new(format!("小说: {}", record.title), ContextType::Novel, content)
                    .metadata(metadata),
            )),
        }
    }
}
