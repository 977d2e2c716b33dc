//! Identity mapping store
//!
//! `.gitops/mappings/<key>.yaml` records, for every item of a target, which
//! module file owns it. Loading is permissive: a missing, unreadable or
//! foreign file yields an empty mapping and malformed entries are dropped.

use confsync_fs::{ConfigPath, ConfigRoot, ConfigStore};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::Result;

pub const MAPPING_SCHEMA_VERSION: u32 = 1;

/// Ownership record for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub id: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl MappingEntry {
    /// Key unique within a target: `helper_type:id` for helpers.
    pub fn key(&self) -> String {
        match &self.helper_type {
            Some(helper_type) => format!("{}:{}", helper_type, self.id),
            None => self.id.clone(),
        }
    }
}

/// Persisted mapping of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingFile {
    pub schema_version: u32,
    pub domain: String,
    pub unassigned_path: String,
    #[serde(default)]
    pub entries: Vec<MappingEntry>,
}

impl MappingFile {
    pub fn new(domain: &str, unassigned_path: &str) -> Self {
        Self {
            schema_version: MAPPING_SCHEMA_VERSION,
            domain: domain.to_string(),
            unassigned_path: unassigned_path.to_string(),
            entries: Vec::new(),
        }
    }

    /// Root-relative path of a target's mapping file.
    pub fn path(domain: &str) -> String {
        format!("{}/{}.yaml", ConfigPath::MappingsDir, domain)
    }

    /// Load a target's mapping, appending a warning when the file is unparseable.
    pub fn load(
        root: &ConfigRoot,
        domain: &str,
        unassigned_path: &str,
        warnings: &mut Vec<String>,
    ) -> Result<Self> {
        let rel_path = Self::path(domain);
        let mut mapping = Self::new(domain, unassigned_path);
        let text = root.read(&rel_path)?;
        if text.trim().is_empty() {
            return Ok(mapping);
        }
        let data: Value = match serde_yaml::from_str(&text) {
            Ok(data) => data,
            Err(e) => {
                warnings.push(format!("{}: {}", rel_path, e));
                return Ok(mapping);
            }
        };
        let version = data.get("schema_version").and_then(Value::as_u64);
        if version.is_some_and(|v| v != u64::from(MAPPING_SCHEMA_VERSION)) {
            debug!(path = %rel_path, ?version, "ignoring mapping with unknown schema version");
            return Ok(mapping);
        }
        if let Some(Value::Sequence(entries)) = data.get("entries") {
            mapping.entries = entries
                .iter()
                .filter_map(|entry| serde_yaml::from_value(entry.clone()).ok())
                .collect();
        }
        Ok(mapping)
    }

    /// Persist the mapping. Returns `true` when the file changed.
    pub fn save(&self, root: &ConfigRoot) -> Result<bool> {
        let path = root.resolve(&Self::path(&self.domain))?;
        Ok(ConfigStore::new().save_if_changed(&path, self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsync_test_utils::ConfigTree;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_mapping_is_empty() {
        let tree = ConfigTree::new();
        let mut warnings = Vec::new();
        let mapping =
            MappingFile::load(tree.root(), "automation", "packages/unassigned/automation.yaml", &mut warnings)
                .unwrap();
        assert!(mapping.entries.is_empty());
        assert_eq!(mapping.unassigned_path, "packages/unassigned/automation.yaml");
        assert!(warnings.is_empty());
    }

    #[test]
    fn malformed_entries_are_dropped() {
        let tree = ConfigTree::new();
        tree.write(
            ".gitops/mappings/script.yaml",
            "schema_version: 1\ndomain: script\nunassigned_path: old.yaml\nentries:\n  - id: a\n    source: scripts/a.yaml\n  - source: no-id.yaml\n  - just text\n",
        );
        let mapping = MappingFile::load(tree.root(), "script", "packages/unassigned/script.yaml", &mut Vec::new())
            .unwrap();
        assert_eq!(mapping.entries.len(), 1);
        assert_eq!(mapping.entries[0].id, "a");
        assert_eq!(mapping.unassigned_path, "packages/unassigned/script.yaml");
    }

    #[test]
    fn unparseable_mapping_warns_and_starts_empty() {
        let tree = ConfigTree::new();
        tree.write(".gitops/mappings/scene.yaml", "entries: [\n");
        let mut warnings = Vec::new();
        let mapping = MappingFile::load(tree.root(), "scene", "u.yaml", &mut warnings).unwrap();
        assert!(mapping.entries.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with(".gitops/mappings/scene.yaml: "));
    }

    #[test]
    fn save_round_trips_and_skips_unchanged_writes() {
        let tree = ConfigTree::new();
        let mut mapping = MappingFile::new("helpers", "packages/unassigned/helpers.yaml");
        mapping.entries.push(MappingEntry {
            id: "porch".into(),
            source: "packages/porch/helpers.yaml".into(),
            helper_type: Some("input_boolean".into()),
            name: None,
            fingerprint: Some("0123456789ab".into()),
        });
        assert!(mapping.save(tree.root()).unwrap());
        assert!(!mapping.save(tree.root()).unwrap());

        let loaded =
            MappingFile::load(tree.root(), "helpers", "packages/unassigned/helpers.yaml", &mut Vec::new()).unwrap();
        assert_eq!(loaded, mapping);
        assert_eq!(loaded.entries[0].key(), "input_boolean:porch");
    }
}
