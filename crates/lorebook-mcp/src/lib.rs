use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    tool, tool_handler, tool_router, ServerHandler,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use lorebook_core::prompt::PromptRequest;
use lorebook_core::{
    ContentInput, ContextStore, ContextType, ListFilter, Metadata, NewContext, ParentFilter,
    SaveMode,
};

/// MCP server exposing the context store to AI agents.
///
/// The store is a single in-memory index, so every tool call goes through one
/// mutex. Mutating tools flush failed writes before answering.
#[derive(Debug, Clone)]
pub struct LorebookMcpServer {
    store: Arc<Mutex<ContextStore>>,
    tool_router: ToolRouter<Self>,
}

impl LorebookMcpServer {
    pub fn new(store: ContextStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            tool_router: Self::tool_router(),
        }
    }

    /// Open the store in `data_dir` and wrap it in a server.
    pub fn open(data_dir: PathBuf) -> Result<Self, String> {
        let store = ContextStore::open(&data_dir)
            .map_err(|e| format!("Failed to open context store: {e}"))?;
        Ok(Self::new(store))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ContextStore>, String> {
        self.store
            .lock()
            .map_err(|_| failure("Context store lock poisoned"))
    }
}

// -- Response envelope --

/// `{"status":"success","message":..,"data":..}`
fn success(message: impl Into<String>, data: impl Serialize) -> Result<String, String> {
    let data = serde_json::to_value(data).map_err(|e| failure(format!("Encoding failed: {e}")))?;
    let body = json!({"status": "success", "message": message.into(), "data": data});
    Ok(body.to_string())
}

/// `{"status":"error","message":..}`
fn failure(message: impl Into<String>) -> String {
    json!({"status": "error", "message": message.into()}).to_string()
}

/// Retry failed writes and note anything still unsaved in the message.
fn flushed(store: &mut ContextStore, message: String) -> String {
    match store.flush() {
        Ok(()) => message,
        Err(e) => {
            tracing::warn!("{e}");
            format!("{message} (warning: not fully persisted: {e})")
        }
    }
}

fn parse_type(value: &str) -> Result<ContextType, String> {
    value.parse().map_err(|e| failure(format!("{e}")))
}

fn parse_content(value: Option<Value>) -> Result<ContentInput, String> {
    match value {
        None | Some(Value::Null) => Ok(ContentInput::from("")),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| failure(format!("content must be a string or a list of entries: {e}"))),
    }
}

// -- Tool parameter structs --

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListParams {
    /// Project to list (default: the current project)
    pub project_id: Option<String>,
    /// Only this type, by label (e.g. 人物设定) or name (e.g. CHARACTER)
    pub context_type: Option<String>,
    /// Only direct children of this context
    pub parent_id: Option<String>,
    /// Only contexts without a parent
    #[serde(default)]
    pub root_only: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IdParams {
    /// Context ID
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateParams {
    /// Display name
    pub name: String,
    /// Type label (人物设定, 世界设定, 作品大纲, 事件细纲, 会话历史, 小说数据, 自定义) or name
    pub context_type: String,
    /// Text, or a list of {id, content} entries
    pub content: Option<Value>,
    /// Project (default: the current project)
    pub project_id: Option<String>,
    /// Free-form metadata
    pub metadata: Option<Metadata>,
    /// Parent context ID
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateParams {
    /// Context ID
    pub id: String,
    /// Text replaces the first entry; a list of entries replaces all of them
    pub content: Value,
    /// Metadata merged into the existing keys
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveParams {
    /// Context to move
    pub id: String,
    /// New parent (omit to make the context a root)
    pub new_parent_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TreeParams {
    /// Root of the subtree (omit for the whole forest)
    pub root_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ContextIdParams {
    /// Context ID
    pub context_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ItemAddParams {
    /// Context ID
    pub context_id: String,
    /// Entry text
    pub content: String,
    /// Entry ID (default: item_<n>)
    pub item_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ItemUpdateParams {
    /// Context ID
    pub context_id: String,
    /// Entry ID
    pub item_id: String,
    /// New entry text
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ItemParams {
    /// Context ID
    pub context_id: String,
    /// Entry ID
    pub item_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ItemSelectionParams {
    /// Context ID
    pub context_id: String,
    /// Entry IDs
    pub item_ids: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SelectParams {
    /// Context IDs, in the order they should be assembled. Replaces the current selection.
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveParams {
    /// Context ID
    pub context_id: String,
    /// Text to save
    pub content: String,
    /// Append to the first entry instead of replacing it
    #[serde(default)]
    pub append: bool,
    /// Add as a new entry (wins over append)
    #[serde(default)]
    pub as_new_item: bool,
    /// Metadata merged into the existing keys
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HistoryParams {
    /// The user's question
    pub question: String,
    /// The assistant's answer
    pub answer: String,
    /// Project (default: the current project)
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PromptParams {
    /// The user's question
    pub question: String,
    /// Name of a tool whose output should follow the question
    pub tool_name: Option<String>,
    /// That tool's output
    pub tool_result: Option<String>,
}

// -- Tool implementations --

#[tool_router]
impl LorebookMcpServer {
    #[tool(
        description = "List contexts of a project (default: current). Filter by type, by parent, or to roots only."
    )]
    fn context_list(&self, Parameters(params): Parameters<ListParams>) -> Result<String, String> {
        let context_type = params.context_type.as_deref().map(parse_type).transpose()?;
        let parent = match (params.parent_id, params.root_only) {
            (Some(id), _) => ParentFilter::Child(id),
            (None, true) => ParentFilter::Root,
            (None, false) => ParentFilter::Any,
        };
        let store = self.lock()?;
        let rows = store.list(&ListFilter {
            project_id: params.project_id,
            context_type,
            parent,
        });
        success(format!("{} context(s)", rows.len()), rows)
    }

    #[tool(description = "Get one context with all of its entries and selection state.")]
    fn context_get(&self, Parameters(params): Parameters<IdParams>) -> Result<String, String> {
        let store = self.lock()?;
        let node = store
            .get(&params.id)
            .ok_or_else(|| failure(format!("Context not found: {}", params.id)))?;
        let mut data = serde_json::to_value(node).map_err(|e| failure(e.to_string()))?;
        data["is_selected"] = Value::Bool(store.is_selected(&params.id));
        success(node.name.clone(), data)
    }

    #[tool(description = "Create a context, optionally under a parent. Returns the new ID.")]
    fn context_create(&self, Parameters(params): Parameters<CreateParams>) -> Result<String, String> {
        let context_type = parse_type(&params.context_type)?;
        let content = parse_content(params.content)?;
        let mut store = self.lock()?;
        let id = store.create(NewContext {
            name: params.name,
            context_type,
            content,
            project_id: params.project_id,
            metadata: params.metadata,
            parent_id: params.parent_id,
        });
        let message = flushed(&mut store, format!("Created context {id}"));
        success(message, json!({"id": id}))
    }

    #[tool(
        description = "Update a context. Text replaces the first entry; a list of entries replaces all entries. Metadata is merged."
    )]
    fn context_update(&self, Parameters(params): Parameters<UpdateParams>) -> Result<String, String> {
        let content = parse_content(Some(params.content))?;
        let mut store = self.lock()?;
        store
            .update(&params.id, content, params.metadata)
            .map_err(|e| failure(e.to_string()))?;
        let message = flushed(&mut store, format!("Updated context {}", params.id));
        success(message, json!({"id": params.id}))
    }

    #[tool(description = "Delete a context. Its children are kept and become roots.")]
    fn context_delete(&self, Parameters(params): Parameters<IdParams>) -> Result<String, String> {
        let mut store = self.lock()?;
        if !store.delete(&params.id) {
            return Err(failure(format!("Context not found: {}", params.id)));
        }
        let message = flushed(&mut store, format!("Deleted context {}", params.id));
        success(message, json!({"id": params.id}))
    }

    #[tool(
        description = "Move a context under a new parent, or to the root when no parent is given. Moves that would create a cycle are rejected."
    )]
    fn context_move(&self, Parameters(params): Parameters<MoveParams>) -> Result<String, String> {
        let mut store = self.lock()?;
        store
            .try_move(&params.id, params.new_parent_id.as_deref())
            .map_err(|e| failure(e.to_string()))?;
        let target = params.new_parent_id.as_deref().unwrap_or("root");
        let message = flushed(&mut store, format!("Moved {} to {target}", params.id));
        success(message, json!({"id": params.id, "parent_id": params.new_parent_id}))
    }

    #[tool(description = "Root-to-context path as a list of {id, name, type}.")]
    fn context_path(&self, Parameters(params): Parameters<IdParams>) -> Result<String, String> {
        let store = self.lock()?;
        let path = store.path(&params.id);
        if path.is_empty() {
            return Err(failure(format!("Context not found: {}", params.id)));
        }
        let rendered = path
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" / ");
        success(rendered, path)
    }

    #[tool(description = "Nested context tree, from one root or for every root.")]
    fn context_tree(&self, Parameters(params): Parameters<TreeParams>) -> Result<String, String> {
        let store = self.lock()?;
        let tree = store.tree(params.root_id.as_deref());
        if tree.is_empty() {
            if let Some(root) = params.root_id {
                return Err(failure(format!("Context not found: {root}")));
            }
        }
        success(format!("{} root(s)", tree.len()), tree)
    }

    #[tool(description = "List the entries of a context with their selection state.")]
    fn item_list(&self, Parameters(params): Parameters<ContextIdParams>) -> Result<String, String> {
        let store = self.lock()?;
        let node = store
            .get(&params.context_id)
            .ok_or_else(|| failure(format!("Context not found: {}", params.context_id)))?;
        let items: Vec<Value> = node
            .items()
            .iter()
            .map(|e| {
                json!({
                    "id": e.id,
                    "content": e.content,
                    "selected": node.selected_items.contains(&e.id),
                    "created_at": e.created_at,
                    "updated_at": e.updated_at,
                })
            })
            .collect();
        success(format!("{} item(s)", items.len()), items)
    }

    #[tool(description = "Add an entry to a context. Returns the entry ID.")]
    fn item_add(&self, Parameters(params): Parameters<ItemAddParams>) -> Result<String, String> {
        let mut store = self.lock()?;
        let item_id = store
            .add_item(&params.context_id, &params.content, params.item_id.as_deref())
            .map_err(|e| failure(e.to_string()))?;
        let message = flushed(&mut store, format!("Added item {item_id}"));
        success(message, json!({"context_id": params.context_id, "item_id": item_id}))
    }

    #[tool(description = "Replace the text of one entry.")]
    fn item_update(&self, Parameters(params): Parameters<ItemUpdateParams>) -> Result<String, String> {
        let mut store = self.lock()?;
        let updated = store
            .update_item(&params.context_id, &params.item_id, &params.content)
            .map_err(|e| failure(e.to_string()))?;
        if !updated {
            return Err(failure(format!(
                "Item {} not found in context {}",
                params.item_id, params.context_id
            )));
        }
        let message = flushed(&mut store, format!("Updated item {}", params.item_id));
        success(message, json!({"context_id": params.context_id, "item_id": params.item_id}))
    }

    #[tool(description = "Delete one entry from a context.")]
    fn item_delete(&self, Parameters(params): Parameters<ItemParams>) -> Result<String, String> {
        let mut store = self.lock()?;
        let deleted = store
            .delete_item(&params.context_id, &params.item_id)
            .map_err(|e| failure(e.to_string()))?;
        if !deleted {
            return Err(failure(format!(
                "Item {} not found in context {}",
                params.item_id, params.context_id
            )));
        }
        let message = flushed(&mut store, format!("Deleted item {}", params.item_id));
        success(message, json!({"context_id": params.context_id, "item_id": params.item_id}))
    }

    #[tool(
        description = "Select entries of a context. Once any entry is selected only selected entries are assembled. Unknown IDs are ignored."
    )]
    fn item_select(&self, Parameters(params): Parameters<ItemSelectionParams>) -> Result<String, String> {
        let mut store = self.lock()?;
        store
            .select_items(&params.context_id, &params.item_ids)
            .map_err(|e| failure(e.to_string()))?;
        self.item_selection_reply(&mut store, &params.context_id)
    }

    #[tool(description = "Deselect entries of a context.")]
    fn item_deselect(
        &self,
        Parameters(params): Parameters<ItemSelectionParams>,
    ) -> Result<String, String> {
        let mut store = self.lock()?;
        store
            .deselect_items(&params.context_id, &params.item_ids)
            .map_err(|e| failure(e.to_string()))?;
        self.item_selection_reply(&mut store, &params.context_id)
    }

    #[tool(description = "Clear the entry selection of a context so every entry is assembled again.")]
    fn item_clear(&self, Parameters(params): Parameters<ContextIdParams>) -> Result<String, String> {
        let mut store = self.lock()?;
        store
            .clear_item_selection(&params.context_id)
            .map_err(|e| failure(e.to_string()))?;
        self.item_selection_reply(&mut store, &params.context_id)
    }

    #[tool(
        description = "Replace the set of selected contexts. Selected contexts are assembled in the given order; unknown IDs are dropped."
    )]
    fn context_select(&self, Parameters(params): Parameters<SelectParams>) -> Result<String, String> {
        let mut store = self.lock()?;
        store.select(&params.ids);
        let selected = store.selected_ids().to_vec();
        let message = flushed(&mut store, format!("{} context(s) selected", selected.len()));
        success(message, json!({"selected": selected}))
    }

    #[tool(description = "The assembled text of every selected context.")]
    fn context_selected_content(&self) -> Result<String, String> {
        let store = self.lock()?;
        let content = store.selected_content();
        success(
            format!("{} context(s) selected", store.selected_ids().len()),
            json!({"content": content}),
        )
    }

    #[tool(
        description = "Save text into a context: replace the first entry (default), append to it, or add it as a new entry."
    )]
    fn context_save(&self, Parameters(params): Parameters<SaveParams>) -> Result<String, String> {
        let mode = SaveMode::from_flags(params.append, params.as_new_item);
        let mut store = self.lock()?;
        let item_id = store
            .save_to_context(&params.context_id, &params.content, mode, params.metadata)
            .map_err(|e| failure(e.to_string()))?;
        let message = flushed(&mut store, format!("Saved to context {}", params.context_id));
        success(message, json!({"context_id": params.context_id, "item_id": item_id}))
    }

    #[tool(description = "Append a question and answer to the project's conversation history.")]
    fn history_save(&self, Parameters(params): Parameters<HistoryParams>) -> Result<String, String> {
        let mut store = self.lock()?;
        let id = store.save_to_history(
            &params.question,
            &params.answer,
            params.project_id.as_deref(),
        );
        let message = flushed(&mut store, format!("Saved to history {id}"));
        success(message, json!({"id": id}))
    }

    #[tool(
        description = "Build the model prompt for a question: system instructions with the selected context, the question, and an optional tool result."
    )]
    fn prompt_build(&self, Parameters(params): Parameters<PromptParams>) -> Result<String, String> {
        let store = self.lock()?;
        let mut request = PromptRequest::build(&store.selected_content(), &params.question);
        if let (Some(name), Some(result)) = (&params.tool_name, &params.tool_result) {
            request = request.with_tool_result(name, result);
        }
        success(
            format!("{} message(s)", request.messages.len()),
            json!({"messages": request.messages, "rendered": request.render()}),
        )
    }
}

impl LorebookMcpServer {
    fn item_selection_reply(&self, store: &mut ContextStore, context_id: &str) -> Result<String, String> {
        let selected: Vec<String> = store
            .get(context_id)
            .map(|n| n.selected_items.iter().cloned().collect())
            .unwrap_or_default();
        let message = flushed(store, format!("{} item(s) selected", selected.len()));
        success(message, json!({"context_id": context_id, "selected_items": selected}))
    }
}

#[tool_handler]
impl ServerHandler for LorebookMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Lorebook MCP Server - Manage the background material of a novel. \
                 Organise contexts in a tree, choose which contexts and entries are selected, \
                 and build prompts from the selection."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Start the MCP server on stdio transport.
pub async fn run_stdio(data_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    use rmcp::transport::stdio;
    use rmcp::ServiceExt;

    let server = LorebookMcpServer::open(data_dir)?;
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn server() -> (TempDir, LorebookMcpServer) {
        let tmp = TempDir::new().unwrap();
        let server = LorebookMcpServer::open(tmp.path().to_path_buf()).unwrap();
        (tmp, server)
    }

    fn body(reply: Result<String, String>) -> Value {
        let text = match reply {
            Ok(text) | Err(text) => text,
        };
        serde_json::from_str(&text).unwrap()
    }

    fn create(server: &LorebookMcpServer, name: &str, kind: &str, parent: Option<&str>) -> String {
        let reply = body(server.context_create(Parameters(CreateParams {
            name: name.into(),
            context_type: kind.into(),
            content: Some(json!("内容")),
            project_id: None,
            metadata: None,
            parent_id: parent.map(String::from),
        })));
        assert_eq!(reply["status"], "success");
        reply["data"]["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_create_path_and_tree() {
        let (_tmp, server) = server();
        let a = create(&server, "主角", "人物设定", None);
        let b = create(&server, "江湖", "WORLD", Some(&a));

        let path = body(server.context_path(Parameters(IdParams { id: b.clone() })));
        assert_eq!(path["message"], "主角 / 江湖");
        assert_eq!(path["data"][1]["type"], "世界设定");

        let tree = body(server.context_tree(Parameters(TreeParams { root_id: None })));
        assert_eq!(tree["data"][0]["children"][0]["id"], b.as_str());
    }

    #[test]
    fn test_errors_use_envelope() {
        let (_tmp, server) = server();
        let reply = server.context_get(Parameters(IdParams { id: "ghost".into() }));
        assert!(reply.is_err());
        let reply = body(reply);
        assert_eq!(reply["status"], "error");
        assert!(reply["message"].as_str().unwrap().contains("ghost"));

        let bad_type = body(server.context_create(Parameters(CreateParams {
            name: "x".into(),
            context_type: "villain".into(),
            content: None,
            project_id: None,
            metadata: None,
            parent_id: None,
        })));
        assert_eq!(bad_type["status"], "error");
    }

    #[test]
    fn test_cycle_move_rejected() {
        let (_tmp, server) = server();
        let a = create(&server, "a", "OUTLINE", None);
        let b = create(&server, "b", "EVENTS", Some(&a));
        let reply = server.context_move(Parameters(MoveParams {
            id: a.clone(),
            new_parent_id: Some(b),
        }));
        assert_eq!(body(reply)["status"], "error");
    }

    #[test]
    fn test_selection_flow() {
        let (_tmp, server) = server();
        let a = create(&server, "主角", "CHARACTER", None);
        server
            .item_add(Parameters(ItemAddParams {
                context_id: a.clone(),
                content: "第二条".into(),
                item_id: None,
            }))
            .unwrap();
        server
            .item_select(Parameters(ItemSelectionParams {
                context_id: a.clone(),
                item_ids: vec!["item_2".into()],
            }))
            .unwrap();
        server
            .context_select(Parameters(SelectParams { ids: vec![a] }))
            .unwrap();

        let content = body(server.context_selected_content());
        assert_eq!(content["data"]["content"], "=== 人物设定: 主角 ===\n第二条");

        let prompt = body(server.prompt_build(Parameters(PromptParams {
            question: "他是谁？".into(),
            tool_name: None,
            tool_result: None,
        })));
        assert_eq!(prompt["data"]["messages"].as_array().unwrap().len(), 2);
        assert!(prompt["data"]["rendered"]
            .as_str()
            .unwrap()
            .contains("第二条"));
    }
}
