use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::DEFAULT_PROJECT;
use crate::storage::{read_json, write_json_atomic};

pub const CONFIG_FILE: &str = "config.json";
pub const ENV_PROJECT: &str = "LOREBOOK_PROJECT";
pub const ENV_LLM_COMMAND: &str = "LOREBOOK_LLM_COMMAND";

/// Store settings, kept as `config.json` in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default = "default_project")]
    pub current_project: String,
    /// Newly created nodes join the store-wide selection.
    #[serde(default = "default_true")]
    pub auto_select_created: bool,
    /// Shell command standing in for the language model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_command: Option<String>,
    /// Append every answered question to the project's history node.
    #[serde(default = "default_true")]
    pub history_enabled: bool,
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            current_project: default_project(),
            auto_select_created: true,
            llm_command: None,
            history_enabled: true,
        }
    }
}

impl StoreConfig {
    /// Read `config.json` from `dir`, or defaults when there is none.
    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        read_json(&path).map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
        write_json_atomic(&dir.join(CONFIG_FILE), self).map_err(|source| {
            StoreError::Persistence {
                id: CONFIG_FILE.to_string(),
                source,
            }
        })
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(CONFIG_FILE).exists()
    }

    /// Apply `LOREBOOK_PROJECT` / `LOREBOOK_LLM_COMMAND` overrides.
    pub fn apply_env(mut self) -> Self {
        self.apply_overrides(
            std::env::var(ENV_PROJECT).ok(),
            std::env::var(ENV_LLM_COMMAND).ok(),
        );
        self
    }

    fn apply_overrides(&mut self, project: Option<String>, llm_command: Option<String>) {
        if let Some(project) = project.filter(|p| !p.trim().is_empty()) {
            self.current_project = project;
        }
        if let Some(cmd) = llm_command.filter(|c| !c.trim().is_empty()) {
            self.llm_command = Some(cmd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = StoreConfig::load(tmp.path()).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert!(!StoreConfig::exists(tmp.path()));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let config = StoreConfig {
            current_project: "wuxia".into(),
            auto_select_created: false,
            llm_command: Some("my-llm --stream".into()),
            history_enabled: false,
        };
        config.save(tmp.path()).unwrap();
        assert_eq!(StoreConfig::load(tmp.path()).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), r#"{"current_project":"x"}"#).unwrap();
        let config = StoreConfig::load(tmp.path()).unwrap();
        assert_eq!(config.current_project, "x");
        assert!(config.auto_select_created);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "nope").unwrap();
        assert!(matches!(
            StoreConfig::load(tmp.path()),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let mut config = StoreConfig::default();
        config.apply_overrides(Some("  ".into()), Some("llm".into()));
        assert_eq!(config.current_project, DEFAULT_PROJECT);
        assert_eq!(config.llm_command.as_deref(), Some("llm"));
    }
}
