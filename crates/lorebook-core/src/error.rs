use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Context not found: {id}")]
    NotFound { id: String },

    #[error("Item {item_id} not found in context {context_id}")]
    ItemNotFound { context_id: String, item_id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to persist {id}: {source}")]
    Persistence {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}
