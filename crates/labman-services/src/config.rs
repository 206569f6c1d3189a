//! Lab manager configuration: store root and the two seed templates.
//!
//! Persisted as YAML at `~/.config/labman.yaml`. Every value is runtime
//! data the user can correct; nothing here is compiled in except the
//! defaults.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LabError, LabResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabConfig {
    /// Store root holding one directory per lab.
    pub lab_dir: PathBuf,
    /// Notebook seed copied to `data/data.ipynb`.
    pub jupyter_template: PathBuf,
    /// Report seed copied to `report/<lab>.lyx`.
    pub lyx_template: PathBuf,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self::with_home(&home_dir())
    }
}

impl LabConfig {
    pub fn with_home(home: &Path) -> Self {
        Self {
            lab_dir: home.join("labs"),
            jupyter_template: home.join("Templates").join("lab-data.ipynb"),
            lyx_template: home.join("Templates").join("lab.lyx"),
        }
    }
}

pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    home_dir().join(".config").join("labman.yaml")
}

/// Loads, holds and writes back the configuration.
pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<LabConfig>,
}

impl ConfigStore {
    /// Create a store with explicit contents, without touching disk.
    pub fn new(path: PathBuf, config: LabConfig) -> Self {
        Self {
            path,
            config: RwLock::new(config),
        }
    }

    /// Load from `path`. A missing file is created from defaults; a file
    /// that does not parse is reported and ignored. Keys absent from the
    /// file keep their defaults.
    pub fn load(path: PathBuf) -> Self {
        info!("Reading config file: {}", path.display());
        let store = Self::new(path, LabConfig::default());
        match std::fs::read_to_string(&store.path) {
            Ok(content) => match serde_yaml::from_str::<LabConfig>(&content) {
                Ok(parsed) => *store.config.write() = parsed,
                Err(e) => warn!("Ignoring malformed config {}: {e}", store.path.display()),
            },
            Err(_) => {
                if let Err(e) = store.save() {
                    warn!("{e}");
                }
            }
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> LabConfig {
        self.config.read().clone()
    }

    /// Write the current configuration to disk.
    pub fn save(&self) -> LabResult<()> {
        write_config(&self.path, &self.config.read())
    }

    /// Apply `f` to a copy of the configuration, persist the copy, and only
    /// then make it current. A failed write leaves the old value in place.
    pub fn update(&self, f: impl FnOnce(&mut LabConfig)) -> LabResult<LabConfig> {
        let mut config = self.config.write();
        let mut next = config.clone();
        f(&mut next);
        write_config(&self.path, &next)?;
        *config = next.clone();
        Ok(next)
    }
}

fn write_config(path: &Path, config: &LabConfig) -> LabResult<()> {
    let yaml = serde_yaml::to_string(config).map_err(|e| LabError::Config(format!("serialize: {e}")))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LabError::io("create", parent, e))?;
    }
    std::fs::write(path, yaml).map_err(|e| LabError::io("write", path, e))?;
    info!("Config file written.");
    Ok(())
}
