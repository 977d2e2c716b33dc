//! Automation identity reconciliation
//!
//! Home Assistant assigns its own ids when automations are created in the UI.
//! Module copies whose content matches a domain automation one-to-one adopt
//! the domain id.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_yaml::Value;
use tracing::{debug, info};

use crate::Result;
use crate::engine::{SyncEngine, Writer};
use crate::item::ModuleItem;
use crate::parse::{explicit_ids_in, parse_list_file};
use crate::registry::spec_by_key;
use crate::report::{ReconcileReport, ReconciledId};

/// Items grouped by fingerprint, in first-seen order of fingerprints.
fn by_fingerprint<'a>(items: impl Iterator<Item = &'a ModuleItem>) -> Vec<(String, Vec<&'a ModuleItem>)> {
    let mut groups: Vec<(String, Vec<&ModuleItem>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for item in items.filter(|item| !item.fingerprint.is_empty()) {
        match positions.get(&item.fingerprint) {
            Some(&pos) => groups[pos].1.push(item),
            None => {
                positions.insert(item.fingerprint.clone(), groups.len());
                groups.push((item.fingerprint.clone(), vec![item]));
            }
        }
    }
    groups
}

impl SyncEngine {
    /// Rewrite module automation ids to the ids found in the domain file.
    pub fn reconcile_automation_ids(&self) -> Result<ReconcileReport> {
        let root = self.root();
        let mut warnings = Vec::new();
        let Some(spec) = spec_by_key("automation") else {
            return Ok(ReconcileReport::skipped("Automation domain is not registered.", warnings));
        };
        let Some(id_field) = spec.id_field else {
            return Ok(ReconcileReport::skipped("Automation domain has no id field.", warnings));
        };

        let module_files = spec.module_files(root)?;
        if module_files.is_empty() {
            return Ok(ReconcileReport::skipped("No automation module files found.", warnings));
        }
        let mut used_ids = explicit_ids_in(root, spec, &module_files)?;
        let mut files: BTreeMap<String, Vec<ModuleItem>> = BTreeMap::new();
        for rel_path in &module_files {
            if let Some(parsed) = parse_list_file(root, spec, rel_path, &mut used_ids, &mut warnings)? {
                files.insert(rel_path.clone(), parsed.items);
            }
        }

        let mut domain_ids = used_ids.clone();
        let Some(domain) = parse_list_file(root, spec, spec.domain_file, &mut domain_ids, &mut warnings)? else {
            let reason = format!("{} is invalid.", spec.domain_file);
            return Ok(ReconcileReport::skipped(&reason, warnings));
        };

        // (source, order) of each module item to relabel, with its new id
        let mut relabels: Vec<(String, usize, String)> = Vec::new();
        let mut reconciled_ids = Vec::new();
        let domain_groups: HashMap<String, Vec<&ModuleItem>> =
            by_fingerprint(domain.items.iter()).into_iter().collect();
        for (fingerprint, module_matches) in by_fingerprint(files.values().flatten()) {
            let domain_matches = domain_groups.get(&fingerprint).map(Vec::as_slice).unwrap_or_default();
            match (module_matches.as_slice(), domain_matches) {
                ([module_item], [domain_item]) => {
                    if module_item.id != domain_item.id {
                        relabels.push((module_item.source.clone(), module_item.order, domain_item.id.clone()));
                        reconciled_ids.push(ReconciledId {
                            old_id: module_item.id.clone(),
                            new_id: domain_item.id.clone(),
                            source: module_item.source.clone(),
                            name: module_item.name.clone().unwrap_or_default(),
                        });
                    }
                }
                (_, []) => {}
                _ => warnings.push(format!(
                    "Ambiguous automation ID reconciliation for fingerprint {}; skipping.",
                    fingerprint
                )),
            }
        }

        let touched: BTreeSet<&str> = relabels.iter().map(|(source, _, _)| source.as_str()).collect();
        let mut writer = Writer::new(root, false);
        let mut changed_files = Vec::new();
        for rel_path in touched {
            let Some(items) = files.get(rel_path) else {
                continue;
            };
            let entries = items
                .iter()
                .map(|item| {
                    let mut data = item.data.clone();
                    let new_id = relabels
                        .iter()
                        .find(|(source, order, _)| source == rel_path && *order == item.order)
                        .map(|(_, _, new_id)| new_id);
                    if let (Some(new_id), Value::Mapping(map)) = (new_id, &mut data) {
                        map.insert(Value::String(id_field.to_string()), Value::String(new_id.clone()));
                    }
                    data
                })
                .collect();
            if writer.write_yaml(rel_path, &Value::Sequence(entries))? {
                changed_files.push(rel_path.to_string());
            }
        }

        let status = if reconciled_ids.is_empty() {
            debug!("automation ids already aligned");
            "no_changes"
        } else {
            info!(count = reconciled_ids.len(), "reconciled automation ids");
            "reconciled"
        };
        Ok(ReconcileReport {
            status: status.to_string(),
            reason: None,
            changed_files,
            warnings,
            reconciled_ids,
        })
    }
}
