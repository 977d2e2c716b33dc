//! Shape-independent half of a target pass
//!
//! Every shape variant collects its items into [`Sides`]; from there the
//! mapping index, the preference, the per-item choice, the writes, the
//! mapping rebuild and the state update are shared.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use confsync_content::{ExpandOptions, contains_template_tags};
use confsync_fs::ConfigRoot;
use confsync_fs::checksum::{combined_checksum, file_checksum};
use serde_yaml::Value;
use tracing::debug;

use super::Cycle;
use crate::Result;
use crate::item::{Catalog, ModuleItem};
use crate::mapping::{MappingEntry, MappingFile};
use crate::parse::expand_item;
use crate::preference::Preference;
use crate::registry::{HELPER_TYPES, Target, helper_domain_file};
use crate::template_merge::{TemplateEdit, TemplateMerge, write_template_diffs};

/// Parsed items of both sides of a target.
#[derive(Debug, Default)]
pub(super) struct Sides {
    /// Every discovered module file, valid or not
    pub module_files: Vec<String>,
    pub valid_files: Vec<String>,
    pub invalid_files: HashSet<String>,
    pub modules: Catalog,
    pub modules_injected: bool,
    pub domain: Catalog,
    pub domain_valid: bool,
    pub domain_injected: bool,
}

impl Sides {
    pub fn new(module_files: Vec<String>) -> Self {
        Self {
            module_files,
            ..Self::default()
        }
    }

    /// Record a parsed module file, or mark it invalid when it did not parse.
    pub fn add_module_file(
        &mut self,
        target: Target,
        rel_path: &str,
        parsed: Option<(Vec<ModuleItem>, bool)>,
        warnings: &mut Vec<String>,
    ) {
        let Some((items, injected)) = parsed else {
            self.invalid_files.insert(rel_path.to_string());
            return;
        };
        self.valid_files.push(rel_path.to_string());
        self.modules_injected |= injected;
        for item in items {
            let key = item.key();
            if !self.modules.insert(item) {
                warnings.push(format!(
                    "Duplicate {} {} in {}; keeping first.",
                    target.duplicate_label(),
                    key,
                    rel_path
                ));
            }
        }
    }

    pub fn add_domain_items(
        &mut self,
        target: Target,
        rel_path: &str,
        items: Vec<ModuleItem>,
        warnings: &mut Vec<String>,
    ) {
        for item in items {
            let key = item.key();
            if !self.domain.insert(item) {
                warnings.push(format!(
                    "Duplicate {} {} in {}.",
                    target.duplicate_label(),
                    key,
                    rel_path
                ));
            }
        }
    }

    /// Whether there is nothing trustworthy to reconcile.
    pub fn nothing_to_do(&self) -> bool {
        !self.domain_valid && self.valid_files.is_empty()
    }
}

/// Mapping entries by item key, in first-seen order.
#[derive(Debug, Default)]
struct OwnerIndex {
    owners: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl OwnerIndex {
    fn set(&mut self, key: String, source: String) {
        match self.positions.get(&key) {
            Some(&pos) => self.owners[pos].1 = source,
            None => {
                self.positions.insert(key.clone(), self.owners.len());
                self.owners.push((key, source));
            }
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }
}

/// What a target pass will write.
#[derive(Debug)]
pub(super) struct Plan {
    pub preference: Preference,
    pub unassigned: String,
    /// Items per owning module file, sorted by position
    pub desired: BTreeMap<String, Vec<ModuleItem>>,
    pub edits: Vec<TemplateEdit>,
    mapping: MappingFile,
}

impl Plan {
    /// Desired module files that may be written, i.e. all but invalid ones.
    pub fn writable<'p>(
        &'p self,
        sides: &'p Sides,
    ) -> impl Iterator<Item = (&'p String, &'p Vec<ModuleItem>)> + 'p {
        self.desired
            .iter()
            .filter(|(rel_path, _)| !sides.invalid_files.contains(*rel_path))
    }

    /// Expanded items for the domain side, over sorted module paths.
    ///
    /// Items whose expansion failed are skipped; with `unique`, later items
    /// reusing a key are skipped too.
    pub fn expanded<'p>(
        &'p self,
        target: Target,
        unique: bool,
        warnings: &mut Vec<String>,
    ) -> Vec<(&'p ModuleItem, &'p Value)> {
        let mut seen = HashSet::new();
        let mut combined = Vec::new();
        for item in self.desired.values().flatten() {
            let key = item.key();
            if unique && seen.contains(&key) {
                warnings.push(format!(
                    "Duplicate {} {} across modules; keeping first.",
                    target.duplicate_label(),
                    key
                ));
                continue;
            }
            let Some(expanded) = &item.expanded else {
                warnings.push(format!(
                    "Skipping {} {} due to template expansion failure.",
                    target.item_label(),
                    key
                ));
                continue;
            };
            seen.insert(key);
            combined.push((item, expanded));
        }
        combined
    }
}

impl Cycle<'_> {
    /// Decide the preference and choose every item's winning version.
    pub(super) fn plan(
        &self,
        target: Target,
        sides: &Sides,
        unassigned: &str,
        warnings: &mut Vec<String>,
    ) -> Result<Plan> {
        let key = target.key();
        let mut mapping = MappingFile::load(self.root, key, unassigned, warnings)?;

        let mut index = OwnerIndex::default();
        for entry in mapping.entries.drain(..) {
            if !entry.id.is_empty() {
                index.set(entry.key(), entry.source);
            }
        }
        for item in sides.modules.iter() {
            index.set(item.key(), item.source.clone());
        }
        for item in sides.domain.iter() {
            let item_key = item.key();
            if !index.contains(&item_key) {
                index.set(item_key, unassigned.to_string());
            }
        }

        let preference = self.resolve_preference(target, sides)?;
        let mut desired: BTreeMap<String, Vec<ModuleItem>> = sides
            .valid_files
            .iter()
            .map(|rel_path| (rel_path.clone(), Vec::new()))
            .collect();
        let mut edits = Vec::new();
        for (item_key, source) in &index.owners {
            let module_item = sides.modules.get(item_key);
            let domain_item = sides.domain.get(item_key);
            let unassigned_owned = source == unassigned;
            let chosen = match domain_item {
                None => match preference {
                    Preference::Domain => None,
                    Preference::Mixed if unassigned_owned => None,
                    _ => module_item.cloned(),
                },
                Some(domain_item) => {
                    let domain_wins = preference == Preference::Domain
                        || (preference == Preference::Mixed && unassigned_owned);
                    if domain_wins {
                        Some(self.domain_version(target, module_item, domain_item, warnings, &mut edits)?)
                    } else if let Some(module_item) = module_item {
                        Some(module_item.clone())
                    } else {
                        warnings.push(format!(
                            "{} {} missing from modules; keeping domain version.",
                            target.item_label(),
                            item_key
                        ));
                        Some(domain_item.clone())
                    }
                }
            };
            if let Some(item) = chosen {
                desired.entry(source.clone()).or_default().push(item);
            }
        }
        for items in desired.values_mut() {
            items.sort_by_key(|item| item.order);
        }

        Ok(Plan {
            preference,
            unassigned: unassigned.to_string(),
            desired,
            edits,
            mapping,
        })
    }

    fn resolve_preference(&self, target: Target, sides: &Sides) -> Result<Preference> {
        let stored = self.state.get(target.key());
        let domain_hash = domain_hash(self.root, target)?;
        let modules_hash = combined_checksum(self.root, sides.module_files.iter().map(String::as_str))?;
        let domain_changed = sides.domain_valid
            && (sides.domain_injected || stored.domain_hash.as_deref() != Some(domain_hash.as_str()));
        let modules_changed =
            sides.modules_injected || stored.modules_hash.as_deref() != Some(modules_hash.as_str());
        let computed = Preference::decide(
            stored.is_recorded(),
            domain_changed,
            modules_changed,
            sides.domain_valid && domain_exists(self.root, target),
            !sides.module_files.is_empty(),
        );
        let preference = self.preference.unwrap_or(computed);
        debug!(
            target = target.key(),
            %computed,
            %preference,
            domain_changed,
            modules_changed,
            "resolved preference"
        );
        Ok(preference)
    }

    /// The domain item, merged into its module copy when that copy uses
    /// templates.
    fn domain_version(
        &self,
        target: Target,
        module_item: Option<&ModuleItem>,
        domain_item: &ModuleItem,
        warnings: &mut Vec<String>,
        edits: &mut Vec<TemplateEdit>,
    ) -> Result<ModuleItem> {
        let Some(module_item) = module_item.filter(|item| contains_template_tags(&item.data)) else {
            return Ok(domain_item.clone());
        };
        let merge = TemplateMerge::new(
            self.root,
            &module_item.source,
            &domain_item.source,
            domain_item.line,
        )?;
        let data = merge.merge(&module_item.data, &domain_item.data, warnings, edits);
        let exclude: &[&str] = match target {
            Target::Domain(spec) => spec.exclude_keys(),
            Target::Helpers => &[],
        };
        let expansion = expand_item(
            self.root,
            ExpandOptions::templates_only(),
            &data,
            &module_item.source,
            exclude,
            warnings,
        );
        Ok(ModuleItem {
            id: domain_item.id.clone(),
            data,
            source: module_item.source.clone(),
            order: domain_item.order,
            name: expansion.name,
            fingerprint: expansion.fingerprint,
            helper_type: domain_item.helper_type,
            expanded: expansion.expanded,
            line: domain_item.line,
        })
    }

    /// Write module payloads, template diffs and domain payloads, as the
    /// write mode allows.
    pub(super) fn write_outputs(
        &mut self,
        plan: &Plan,
        modules: Vec<(String, Value)>,
        domains: Vec<(String, Value)>,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        if self.mode.writes_modules() {
            for (rel_path, payload) in &modules {
                if self.writer.write_yaml(rel_path, payload)? {
                    changed.push(rel_path.clone());
                }
            }
            changed.extend(write_template_diffs(self.root, &mut self.writer, &plan.edits, warnings)?);
        }
        if self.mode.writes_domain() {
            for (rel_path, payload) in &domains {
                if self.writer.write_domain_yaml(rel_path, payload)? {
                    changed.push(rel_path.clone());
                }
            }
        }
        Ok(changed)
    }

    /// Rebuild the mapping and record the target's new hashes.
    pub(super) fn finish(&mut self, target: Target, sides: &Sides, plan: Plan) -> Result<()> {
        let Plan {
            desired,
            mut mapping,
            preference,
            ..
        } = plan;
        let mut entries: Vec<MappingEntry> = desired
            .iter()
            .flat_map(|(source, items)| {
                items.iter().map(move |item| MappingEntry {
                    id: item.id.clone(),
                    source: source.clone(),
                    helper_type: item.helper_type.map(str::to_string),
                    name: item.name.clone(),
                    fingerprint: (!item.fingerprint.is_empty()).then(|| item.fingerprint.clone()),
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            (a.helper_type.as_deref().unwrap_or_default(), &a.id)
                .cmp(&(b.helper_type.as_deref().unwrap_or_default(), &b.id))
        });
        mapping.entries = entries;
        if !self.writer.is_preview() && mapping.save(self.root)? {
            debug!(target = target.key(), entries = mapping.entries.len(), "mapping updated");
        }

        let hashed: BTreeSet<&str> = sides
            .module_files
            .iter()
            .chain(desired.keys())
            .map(String::as_str)
            .collect();
        let modules_hash = combined_checksum(self.root, hashed)?;
        let domain_hash = domain_hash(self.root, target)?;
        debug!(target = target.key(), %preference, "recording target state");
        self.state.record(target.key(), domain_hash, modules_hash);
        Ok(())
    }
}

/// Hash of a target's domain side; helpers combine every helper file.
fn domain_hash(root: &ConfigRoot, target: Target) -> Result<String> {
    let hash = match target {
        Target::Domain(spec) => file_checksum(root, spec.domain_file)?,
        Target::Helpers => {
            let files: Vec<String> = HELPER_TYPES.iter().map(|helper| helper_domain_file(helper)).collect();
            combined_checksum(root, files.iter().map(String::as_str))?
        }
    };
    Ok(hash)
}

fn domain_exists(root: &ConfigRoot, target: Target) -> bool {
    match target {
        Target::Domain(spec) => root.is_file(spec.domain_file),
        Target::Helpers => HELPER_TYPES
            .iter()
            .any(|helper| root.is_file(&helper_domain_file(helper))),
    }
}
