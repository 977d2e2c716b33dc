//! Engine configuration
//!
//! An [`EngineConfig`] is built once from the configuration directory and
//! handed to [`SyncEngine`](crate::SyncEngine); nothing is read from process
//! globals.

use std::path::Path;

use confsync_fs::{ConfigPath, ConfigRoot, ConfigStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

/// Settings read from `.gitops/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSettings")]
pub struct Settings {
    /// Whether module/domain reconciliation runs at all
    pub yaml_modules_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            yaml_modules_enabled: true,
        }
    }
}

/// On-disk form; `merge_automations` is the older name of the switch.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    yaml_modules_enabled: Option<bool>,
    merge_automations: Option<bool>,
}

impl From<RawSettings> for Settings {
    fn from(raw: RawSettings) -> Self {
        Self {
            yaml_modules_enabled: raw
                .yaml_modules_enabled
                .or(raw.merge_automations)
                .unwrap_or(true),
        }
    }
}

/// Configuration directory plus settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    root: ConfigRoot,
    settings: Settings,
}

impl EngineConfig {
    pub fn new(root: ConfigRoot, settings: Settings) -> Self {
        Self { root, settings }
    }

    /// Open `config_dir` and load its settings file, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be parsed.
    pub fn load(config_dir: impl AsRef<Path>) -> Result<Self> {
        let root = ConfigRoot::new(config_dir)?;
        let path = root.resolve(ConfigPath::Settings.as_str())?;
        let settings: Settings = ConfigStore::new().load_or_default(&path)?;
        debug!(root = %root.path(), ?settings, "loaded engine configuration");
        Ok(Self { root, settings })
    }

    pub fn root(&self) -> &ConfigRoot {
        &self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
