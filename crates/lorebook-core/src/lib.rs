pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod novel;
pub mod prompt;
pub mod storage;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use model::{ContentInput, ContextNode, ContextType, Entry, Metadata};
pub use store::{ContextStore, ListFilter, NewContext, ParentFilter, SaveMode, NO_SELECTION};
