use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::model::{ContextNode, Project};

const CONTEXTS_DIR: &str = "contexts";
const PROJECTS_DIR: &str = "projects";
const SELECTION_FILE: &str = "selection.json";
const RECORD_EXT: &str = "json";
const LOCK_FILE: &str = ".lock";

/// One JSON file per context node under `<root>/contexts/`, keyed by node id.
///
/// Every write goes to a sibling `.tmp` file first and is renamed over the
/// real record, so a crash mid-write never exposes a partial record.
/// Concurrent writers take turns on the directory's `.lock` file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a data directory.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root.join(CONTEXTS_DIR))?;
        fs::create_dir_all(root.join(PROJECTS_DIR))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root
            .join(CONTEXTS_DIR)
            .join(format!("{id}.{RECORD_EXT}"))
    }

    /// Persist a node, replacing any previous record for its id.
    pub fn write(&self, node: &ContextNode) -> Result<(), StoreError> {
        check_key(&node.id)?;
        write_json_atomic(&self.record_path(&node.id), node).map_err(|source| {
            StoreError::Persistence {
                id: node.id.clone(),
                source,
            }
        })
    }

    /// Load every readable record, sorted by creation time then id.
    ///
    /// A record that fails to read or parse is skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<ContextNode>, StoreError> {
        let dir = self.root.join(CONTEXTS_DIR);
        let mut nodes = Vec::new();

        for dir_entry in fs::read_dir(&dir)? {
            let path = match dir_entry {
                Ok(e) => e.path(),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {e}", dir.display());
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            match read_json::<ContextNode>(&path) {
                Ok(node) => nodes.push(node),
                Err(e) => {
                    tracing::warn!("Skipping unreadable context {}: {e}", path.display());
                }
            }
        }

        nodes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(nodes)
    }

    /// Remove a node's record. Returns whether a record existed.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        check_key(id)?;
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Persistence {
                id: id.to_string(),
                source,
            }),
        }
    }

    /// Persist the ordered store-wide selection.
    pub fn write_selection(&self, ids: &[String]) -> Result<(), StoreError> {
        write_json_atomic(&self.root.join(SELECTION_FILE), &ids).map_err(|source| {
            StoreError::Persistence {
                id: SELECTION_FILE.to_string(),
                source,
            }
        })
    }

    /// Read the persisted selection. Missing or unreadable files mean "nothing selected".
    pub fn read_selection(&self) -> Vec<String> {
        let path = self.root.join(SELECTION_FILE);
        if !path.exists() {
            return Vec::new();
        }
        read_json(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable selection file {}: {e}", path.display());
            Vec::new()
        })
    }

    pub fn write_project(&self, project: &Project) -> Result<(), StoreError> {
        check_key(&project.id)?;
        let path = self
            .root
            .join(PROJECTS_DIR)
            .join(format!("{}.{RECORD_EXT}", project.id));
        write_json_atomic(&path, project).map_err(|source| StoreError::Persistence {
            id: project.id.clone(),
            source,
        })
    }

    pub fn read_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects = Vec::new();
        for dir_entry in fs::read_dir(self.root.join(PROJECTS_DIR))? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            match read_json::<Project>(&path) {
                Ok(p) => projects.push(p),
                Err(e) => tracing::warn!("Skipping unreadable project {}: {e}", path.display()),
            }
        }
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(projects)
    }
}

/// Ids become file names, so they must not be able to escape the directory.
fn check_key(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
        return Err(StoreError::Validation(format!(
            "'{id}' cannot be used as a record key"
        )));
    }
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// Writers in one directory are serialized on its `.lock` file, held from
/// creating the temp file until the rename, so the shared `.tmp` name is
/// never written by two writers at once.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let lock = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path.with_file_name(LOCK_FILE))?;
    fs2::FileExt::lock_exclusive(&lock)?;

    let result = replace_with(&tmp_path, path, &json);
    fs2::FileExt::unlock(&lock)?;
    result
}

fn replace_with(tmp_path: &Path, path: &Path, json: &[u8]) -> std::io::Result<()> {
    let written = fs::File::create(tmp_path).and_then(|mut file| {
        file.write_all(json)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(tmp_path, path)) {
        let _ = fs::remove_file(tmp_path);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentInput, ContextType, DEFAULT_PROJECT};
    use tempfile::TempDir;

    fn make_node(id: &str, parent: Option<&str>) -> ContextNode {
        ContextNode::new(
            id,
            format!("node {id}"),
            ContextType::World,
            ContentInput::from("江湖"),
            DEFAULT_PROJECT,
            None,
            parent.map(String::from),
        )
    }

    #[test]
    fn test_write_read_delete() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::open(tmp.path()).unwrap();

        let mut node = make_node("aaaa1111", None);
        node.add_item("second", None).unwrap();
        node.select_items(&["item_2"]);
        backend.write(&node).unwrap();

        let loaded = backend.read_all().unwrap();
        assert_eq!(loaded, vec![node.clone()]);

        // No temp file left behind
        let leftovers: Vec<_> = fs::read_dir(tmp.path().join(CONTEXTS_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        assert!(backend.delete("aaaa1111").unwrap());
        assert!(!backend.delete("aaaa1111").unwrap());
        assert!(backend.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_write_overwrites_previous_record() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::open(tmp.path()).unwrap();

        let mut node = make_node("aaaa1111", None);
        backend.write(&node).unwrap();
        node.name = "renamed".into();
        backend.write(&node).unwrap();

        let loaded = backend.read_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "renamed");
    }

    #[test]
    fn test_concurrent_writers_keep_records_whole() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::open(tmp.path()).unwrap();

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let backend = backend.clone();
                std::thread::spawn(move || {
                    let mut node = make_node("aaaa1111", None);
                    for i in 0..25 {
                        node.name = format!("writer {t} pass {i}");
                        node.add_item(&"x".repeat(t * 1000 + i), None).unwrap();
                        backend.write(&node).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let loaded = backend.read_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].name.starts_with("writer "));
        assert_eq!(loaded[0].content.len(), 26);

        let leftovers: Vec<_> = fs::read_dir(tmp.path().join(CONTEXTS_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupt_record_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::open(tmp.path()).unwrap();
        backend.write(&make_node("good0001", None)).unwrap();

        let contexts = tmp.path().join(CONTEXTS_DIR);
        fs::write(contexts.join("broken01.json"), "{ not json").unwrap();
        fs::write(contexts.join("badtype1.json"), r#"{"id":"x","name":"y","type":"villain"}"#)
            .unwrap();
        fs::write(contexts.join("stale.json.tmp"), "partial").unwrap();

        let loaded = backend.read_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "good0001");
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::open(tmp.path()).unwrap();
        let node = make_node("../escape", None);
        assert!(matches!(
            backend.write(&node),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_selection_and_projects() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::open(tmp.path()).unwrap();
        assert!(backend.read_selection().is_empty());

        backend
            .write_selection(&["b".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(backend.read_selection(), vec!["b", "a"]);

        backend.write_project(&Project::new("wuxia", "武侠")).unwrap();
        let projects = backend.read_projects().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "武侠");
    }
}
