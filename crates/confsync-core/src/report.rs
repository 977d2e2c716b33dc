//! Reports returned by engine operations
//!
//! Every report serializes to the JSON shape printed by `--json` CLI output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::items::ItemSelector;

/// Outcome of a sync, build or update cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// `synced`, `built` or `updated`
    pub status: String,
    /// Files written or deleted, sorted and unique
    pub changed_files: Vec<String>,
    pub warnings: Vec<String>,
}

impl SyncReport {
    pub fn new(status: &str, mut changed_files: Vec<String>, warnings: Vec<String>) -> Self {
        changed_files.sort();
        changed_files.dedup();
        Self {
            status: status.to_string(),
            changed_files,
            warnings,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.changed_files.is_empty()
    }
}

/// Pending change to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    pub diff: String,
}

/// Diffs a sync would apply, split by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewReport {
    pub status: String,
    /// Changes to domain files
    pub build_diffs: Vec<FileDiff>,
    /// Changes to module files and template diffs
    pub update_diffs: Vec<FileDiff>,
    pub warnings: Vec<String>,
}

/// Dry-run result for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainReport {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub changed_files: Vec<String>,
}

/// Files a one-directional cycle would change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReport {
    pub count: usize,
    pub paths: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
}

/// Result of a validation dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// `ok` or `issues`
    pub status: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub domains: BTreeMap<String, DomainReport>,
    pub build: PlanReport,
    pub update: PlanReport,
    pub summary: Summary,
}

impl ValidationReport {
    pub fn has_issues(&self) -> bool {
        self.status == "issues"
    }
}

/// One identity rewritten by automation-ID reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledId {
    pub old_id: String,
    pub new_id: String,
    pub source: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// `skipped`, `reconciled` or `no_changes`
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub changed_files: Vec<String>,
    pub warnings: Vec<String>,
    pub reconciled_ids: Vec<ReconciledId>,
}

impl ReconcileReport {
    pub fn skipped(reason: &str, warnings: Vec<String>) -> Self {
        Self {
            status: "skipped".to_string(),
            reason: Some(reason.to_string()),
            changed_files: Vec::new(),
            warnings,
            reconciled_ids: Vec::new(),
        }
    }
}

/// An item as listed for a module file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub selector: ItemSelector,
    pub id: String,
    pub name: Option<String>,
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemList {
    pub path: String,
    /// `list`, `mapping`, `lovelace` or `helpers`
    pub file_kind: String,
    pub items: Vec<ItemSummary>,
    pub warnings: Vec<String>,
}

/// One item rendered as YAML text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemText {
    pub path: String,
    pub file_kind: String,
    pub selector: ItemSelector,
    pub yaml: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSaved {
    pub status: String,
    pub path: String,
    pub file_kind: String,
    pub selector: ItemSelector,
    pub fingerprint: String,
}

/// Outcome of a move, unassign or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReport {
    pub status: String,
    pub changed_files: Vec<String>,
    pub warnings: Vec<String>,
}

/// A group of module files shown together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// `package:<name>`, `one_offs:<dir>` or `unassigned:<dir>`
    pub id: String,
    pub name: String,
    /// `package`, `one_offs` or `unassigned`
    pub kind: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleIndex {
    pub modules: Vec<ModuleEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFile {
    pub path: String,
    pub content: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFileStatus {
    /// `saved` or `deleted`
    pub status: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_report_sorts_and_dedups_changed_files() {
        let report = SyncReport::new(
            "synced",
            vec!["scripts.yaml".into(), "automations.yaml".into(), "scripts.yaml".into()],
            Vec::new(),
        );
        assert_eq!(report.changed_files, vec!["automations.yaml", "scripts.yaml"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn skipped_reconcile_report_carries_a_reason() {
        let report = ReconcileReport::skipped("No automation module files found.", Vec::new());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "No automation module files found.");
        assert_eq!(json["reconciled_ids"], serde_json::json!([]));
    }
}
