//! List-shaped targets: automations, scenes, templates

use std::collections::HashSet;

use serde_yaml::Value;

use super::Cycle;
use super::resolve::Sides;
use crate::Result;
use crate::item::{Catalog, ModuleItem};
use crate::parse::{explicit_ids_in, parse_list_file};
use crate::registry::{DomainSpec, Target};

impl Cycle<'_> {
    pub(super) fn sync_list(
        &mut self,
        spec: &'static DomainSpec,
        unassigned: &str,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let target = Target::Domain(spec);
        let module_files = spec.module_files(self.root)?;
        let mut used_ids = if spec.uses_alias_ids() {
            explicit_ids_in(self.root, spec, &module_files)?
        } else {
            HashSet::new()
        };

        let mut sides = Sides::new(module_files.clone());
        for rel_path in &module_files {
            let parsed = parse_list_file(self.root, spec, rel_path, &mut used_ids, warnings)?;
            sides.add_module_file(
                target,
                rel_path,
                parsed.map(|file| (file.items, file.injected)),
                warnings,
            );
        }

        let mut domain_ids = used_ids.clone();
        if let Some(domain) = parse_list_file(self.root, spec, spec.domain_file, &mut domain_ids, warnings)? {
            sides.domain_valid = true;
            sides.domain_injected = domain.injected;
            let mut items = domain.items;
            if spec.id_field.is_none() {
                adopt_module_ids(&mut items, &sides.modules);
            }
            sides.add_domain_items(target, spec.domain_file, items, warnings);
        }
        if sides.nothing_to_do() {
            return Ok(Vec::new());
        }

        let plan = self.plan(target, &sides, unassigned, warnings)?;
        let modules = plan
            .writable(&sides)
            .map(|(rel_path, items)| {
                let entries = items.iter().map(|item| item.data.clone()).collect();
                (rel_path.clone(), Value::Sequence(entries))
            })
            .collect();
        let combined = plan
            .expanded(target, false, warnings)
            .into_iter()
            .map(|(_, expanded)| expanded.clone())
            .collect();
        let changed = self.write_outputs(
            &plan,
            modules,
            vec![(spec.domain_file.to_string(), Value::Sequence(combined))],
            warnings,
        )?;
        self.finish(target, &sides, plan)?;
        Ok(changed)
    }
}

/// Give positional domain items the identity of the module item with the
/// same content.
///
/// Items of domains without an identity field are known by position only,
/// which differs between the domain file and the module files.
///
/// Matching is by content, so a domain-side edit to such an item no longer
/// matches its module copy. The edited item is treated as new and lands in
/// the unassigned bundle, and the module copy is dropped from its file.
fn adopt_module_ids(domain_items: &mut [ModuleItem], modules: &Catalog) {
    let mut claimed: HashSet<String> = domain_items
        .iter()
        .filter(|item| modules.contains(&item.id))
        .map(|item| item.id.clone())
        .collect();
    for item in domain_items.iter_mut() {
        if modules.contains(&item.id) {
            continue;
        }
        let adopted = modules
            .iter()
            .find(|module| module.fingerprint == item.fingerprint && !claimed.contains(&module.id));
        if let Some(module) = adopted {
            item.id = module.id.clone();
            claimed.insert(module.id.clone());
        }
    }
}
