//! Configuration file handling
//!
//! Reads and writes `.conductor/config.yaml` for per-workspace settings.
//! Everything has a sensible default, so a missing file is not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Tunables for one conductor instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConductorConfig {
    /// Maximum concurrently dispatched tasks
    pub max_workers: usize,
    /// Upper bound on a single executor dispatch
    pub task_timeout_secs: u64,
    /// Upper bound on the advisory post-drain test run
    pub test_timeout_secs: u64,
    /// Author identity for consolidation commits
    pub commit_author_name: String,
    pub commit_author_email: String,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            task_timeout_secs: 900,
            test_timeout_secs: 60,
            commit_author_name: "Conductor".to_string(),
            commit_author_email: "conductor@localhost".to_string(),
        }
    }
}

/// Configuration file manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager for a workspace
    pub fn new(workspace: &Path) -> Self {
        Self {
            config_path: workspace.join(".conductor").join("config.yaml"),
        }
    }

    /// Check if the config file exists
    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Read config from file, returning defaults if not found
    pub fn read(&self) -> Result<ConductorConfig, String> {
        if !self.config_path.exists() {
            return Ok(ConductorConfig::default());
        }

        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        serde_yaml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Write config to file
    pub fn write(&self, config: &ConductorConfig) -> Result<(), String> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_yaml::to_string(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| format!("Failed to write config file: {}", e))
    }

    /// Initialize config with defaults if it doesn't exist
    pub fn initialize(&self) -> Result<ConductorConfig, String> {
        if self.exists() {
            return self.read();
        }

        let config = ConductorConfig::default();
        self.write(&config)?;
        Ok(config)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path());
        assert!(!manager.exists());
        assert_eq!(manager.read().unwrap(), ConductorConfig::default());
    }

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path());

        let mut config = ConductorConfig::default();
        config.max_workers = 3;
        config.commit_author_name = "Bot".to_string();
        manager.write(&config).unwrap();

        assert_eq!(manager.read().unwrap(), config);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path());
        std::fs::create_dir_all(manager.path().parent().unwrap()).unwrap();
        std::fs::write(manager.path(), "max_workers: 2\n").unwrap();

        let config = manager.read().unwrap();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.task_timeout_secs, 900);
    }
}
