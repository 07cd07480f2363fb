pub mod file_backend;

pub use file_backend::FileBackend;
pub(crate) use file_backend::{read_json, write_json_atomic};
