//! Sync-state store
//!
//! `.gitops/sync-state.yaml` remembers, per target, the hash of the domain
//! side and of the module side as they were after the last cycle. Comparing
//! them with the current hashes tells which side changed since.

use std::collections::BTreeMap;

use confsync_fs::{ConfigPath, ConfigRoot, ConfigStore};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::Result;

pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Hashes recorded for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules_hash: Option<String>,
}

impl DomainState {
    pub fn is_recorded(&self) -> bool {
        self.domain_hash.is_some() || self.modules_hash.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub schema_version: u32,
    #[serde(default)]
    pub domains: BTreeMap<String, DomainState>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            domains: BTreeMap::new(),
        }
    }
}

impl SyncState {
    /// Load the state. Unparseable files warn and load as empty.
    pub fn load(root: &ConfigRoot, warnings: &mut Vec<String>) -> Result<Self> {
        let rel_path = ConfigPath::SyncState.as_str();
        let text = root.read(rel_path)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let data: Value = match serde_yaml::from_str(&text) {
            Ok(data) => data,
            Err(e) => {
                warnings.push(format!("{}: {}", rel_path, e));
                return Ok(Self::default());
            }
        };
        let mut state = Self::default();
        if let Some(Value::Mapping(domains)) = data.get("domains") {
            for (key, value) in domains {
                let (Some(key), Ok(entry)) = (
                    key.as_str(),
                    serde_yaml::from_value::<DomainState>(value.clone()),
                ) else {
                    continue;
                };
                state.domains.insert(key.to_string(), entry);
            }
        }
        Ok(state)
    }

    /// Persist the state. Returns `true` when the file changed.
    pub fn save(&self, root: &ConfigRoot) -> Result<bool> {
        let path = root.resolve(ConfigPath::SyncState.as_str())?;
        Ok(ConfigStore::new().save_if_changed(&path, self)?)
    }

    pub fn get(&self, key: &str) -> DomainState {
        self.domains.get(key).cloned().unwrap_or_default()
    }

    pub fn record(&mut self, key: &str, domain_hash: String, modules_hash: String) {
        self.domains.insert(
            key.to_string(),
            DomainState {
                domain_hash: Some(domain_hash),
                modules_hash: Some(modules_hash),
            },
        );
    }
}
