//! Shared application configuration (§9 "Configuration").
//!
//! A single TOML document loaded once at startup. Mirrors
//! `retro-junk-lib::settings`'s atomic-write pattern: writes go to a
//! `.tmp` sibling and are renamed into place so readers never observe a
//! half-written file.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Canonical path to the config file: `~/.config/vaultkeeper/config.toml`.
pub fn config_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("vaultkeeper").join("config.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub max_connections: usize,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            timeout_seconds: 60,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// provider image-type tag -> catalog field name
    pub image_type_mappings: BTreeMap<String, String>,
    /// ordered region tags, most preferred first
    pub region_priority: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaFieldConfig {
    pub target_extension: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub roms_root_directory: PathBuf,
    pub task_logs_directory: PathBuf,
    pub state_directory: PathBuf,
    #[serde(default = "default_max_tasks")]
    pub max_tasks_to_keep: usize,
    #[serde(default)]
    pub download: DownloadConfig,
    /// provider name -> provider config
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// media category -> catalog field name
    #[serde(default)]
    pub media_mappings: BTreeMap<String, String>,
    /// media category -> allowed extensions
    #[serde(default)]
    pub media_extensions: BTreeMap<String, Vec<String>>,
    /// catalog field -> conversion target
    #[serde(default)]
    pub media_fields: BTreeMap<String, MediaFieldConfig>,
}

fn default_max_tasks() -> usize {
    100
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            roms_root_directory: PathBuf::from("./roms"),
            task_logs_directory: PathBuf::from("./state/task_logs"),
            state_directory: PathBuf::from("./state"),
            max_tasks_to_keep: default_max_tasks(),
            download: DownloadConfig::default(),
            providers: BTreeMap::new(),
            media_mappings: BTreeMap::new(),
            media_extensions: BTreeMap::new(),
            media_fields: BTreeMap::new(),
        }
    }
}

impl VaultConfig {
    pub fn gamelist_path(&self, system: &str) -> PathBuf {
        self.state_directory.join("gamelists").join(system).join("gamelist.xml")
    }

    pub fn task_log_path(&self, task_id: uuid::Uuid) -> PathBuf {
        self.task_logs_directory.join(format!("{task_id}.log"))
    }

    pub fn rom_tree_system_dir(&self, system: &str) -> PathBuf {
        self.roms_root_directory.join(system)
    }

    /// Load from `path`, falling back to defaults if the file doesn't exist.
    pub fn load(path: &Path) -> io::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(io::Error::other),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Atomically write this config to `path` (temp file + rename).
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(io::Error::other)?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &serialized)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = VaultConfig::load(Path::new("/nonexistent/vaultkeeper.toml")).unwrap();
        assert_eq!(cfg.max_tasks_to_keep, 100);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = VaultConfig::default();
        cfg.max_tasks_to_keep = 42;
        cfg.save(&path).unwrap();
        let loaded = VaultConfig::load(&path).unwrap();
        assert_eq!(loaded.max_tasks_to_keep, 42);
    }
}
