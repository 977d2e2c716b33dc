//! Dry runs: diff preview and validation
//!
//! Both run full cycles against a preview [`Writer`](crate::engine::Writer)
//! and never touch the disk.

use std::collections::{BTreeMap, HashSet};

use confsync_content::unified_diff;
use tracing::debug;

use crate::Result;
use crate::engine::{Cycle, SyncEngine};
use crate::preference::{Preference, WriteMode};
use crate::registry::{Target, domain_paths};
use crate::report::{DomainReport, FileDiff, PlanReport, PreviewReport, Summary, ValidationReport};
use crate::state::SyncState;

/// Whether a previewed write belongs in a diff listing.
fn is_preview_path(rel_path: &str) -> bool {
    if rel_path.starts_with(".gitops/") || rel_path.starts_with("system/") {
        return false;
    }
    [".yaml", ".yml", ".diff"]
        .iter()
        .any(|suffix| rel_path.ends_with(suffix))
}

fn dedupe(lines: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| seen.insert(line.clone()))
        .collect()
}

impl SyncEngine {
    /// Diffs a [`sync`](Self::sync) would apply, split into domain-file
    /// changes and module-side changes.
    pub fn preview(&self) -> Result<PreviewReport> {
        let root = self.root();
        let mut warnings = Vec::new();
        let mut state = SyncState::load(root, &mut warnings)?;
        let mut cycle = Cycle::new(root, &mut state, true);
        cycle.run_all(&mut warnings)?;
        let writes = cycle.into_preview();

        let domain_files = domain_paths();
        let mut build_diffs = Vec::new();
        let mut update_diffs = Vec::new();
        for (rel_path, content) in writes {
            if !is_preview_path(&rel_path) {
                continue;
            }
            let diff = unified_diff(&rel_path, &root.read(&rel_path)?, &content);
            if diff.trim().is_empty() {
                continue;
            }
            let entry = FileDiff { path: rel_path, diff };
            if domain_files.contains(&entry.path) {
                build_diffs.push(entry);
            } else {
                update_diffs.push(entry);
            }
        }
        debug!(build = build_diffs.len(), update = update_diffs.len(), "preview computed");
        Ok(PreviewReport {
            status: "preview".to_string(),
            build_diffs,
            update_diffs,
            warnings,
        })
    }

    /// Dry-run every target on its own, then the build and update plans.
    ///
    /// Failures of one target are reported as its errors and do not stop the
    /// others.
    pub fn validate(&self) -> Result<ValidationReport> {
        let root = self.root();
        let mut state_warnings = Vec::new();
        let mut state = SyncState::load(root, &mut state_warnings)?;
        let mut errors = Vec::new();
        let mut warnings: Vec<String> = state_warnings
            .into_iter()
            .map(|warning| format!("sync_state: {}", warning))
            .collect();

        let mut domains = BTreeMap::new();
        for target in Target::all() {
            let key = target.key();
            let mut report = DomainReport::default();
            let mut cycle = Cycle::new(root, &mut state, true);
            match cycle.run_target(target, &mut report.warnings) {
                Ok(mut changed) => {
                    changed.sort();
                    changed.dedup();
                    report.changed_files = changed;
                }
                Err(e) => report.errors.push(e.to_string()),
            }
            errors.extend(report.errors.iter().map(|error| format!("{}: {}", key, error)));
            warnings.extend(report.warnings.iter().map(|warning| format!("{}: {}", key, warning)));
            domains.insert(key.to_string(), report);
        }

        let build = self.plan_report(Preference::Modules, WriteMode::Domain)?;
        let update = self.plan_report(Preference::Domain, WriteMode::Modules)?;

        let errors = dedupe(errors);
        let warnings = dedupe(warnings);
        let summary = Summary {
            errors: errors.len(),
            warnings: warnings.len(),
        };
        let status = if errors.is_empty() && warnings.is_empty() {
            "ok"
        } else {
            "issues"
        };
        Ok(ValidationReport {
            status: status.to_string(),
            errors,
            warnings,
            domains,
            build,
            update,
            summary,
        })
    }

    /// Files a one-directional cycle would change.
    fn plan_report(&self, preference: Preference, mode: WriteMode) -> Result<PlanReport> {
        let root = self.root();
        let mut warnings = Vec::new();
        let mut state = SyncState::load(root, &mut warnings)?;
        let mut paths = Cycle::new(root, &mut state, true)
            .with_plan(Some(preference), mode)
            .run_all(&mut warnings)?;
        paths.sort();
        paths.dedup();
        Ok(PlanReport {
            count: paths.len(),
            paths,
            warnings,
        })
    }
}
