//! Keyed targets: scripts, groups

use serde_yaml::{Mapping, Value};

use super::Cycle;
use super::resolve::Sides;
use crate::Result;
use crate::parse::parse_keyed_file;
use crate::registry::{DomainSpec, Target};

impl Cycle<'_> {
    pub(super) fn sync_keyed(
        &mut self,
        spec: &'static DomainSpec,
        unassigned: &str,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let target = Target::Domain(spec);
        let module_files = spec.module_files(self.root)?;
        let mut sides = Sides::new(module_files.clone());
        for rel_path in &module_files {
            let parsed = parse_keyed_file(self.root, spec, rel_path, warnings)?;
            sides.add_module_file(target, rel_path, parsed.map(|items| (items, false)), warnings);
        }
        if let Some(items) = parse_keyed_file(self.root, spec, spec.domain_file, warnings)? {
            sides.domain_valid = true;
            sides.add_domain_items(target, spec.domain_file, items, warnings);
        }
        if sides.nothing_to_do() {
            return Ok(Vec::new());
        }

        let plan = self.plan(target, &sides, unassigned, warnings)?;
        let modules = plan
            .writable(&sides)
            .map(|(rel_path, items)| {
                let map: Mapping = items
                    .iter()
                    .map(|item| (Value::String(item.id.clone()), item.data.clone()))
                    .collect();
                (rel_path.clone(), Value::Mapping(map))
            })
            .collect();
        let combined: Mapping = plan
            .expanded(target, true, warnings)
            .into_iter()
            .map(|(item, expanded)| (Value::String(item.id.clone()), expanded.clone()))
            .collect();
        let changed = self.write_outputs(
            &plan,
            modules,
            vec![(spec.domain_file.to_string(), Value::Mapping(combined))],
            warnings,
        )?;
        self.finish(target, &sides, plan)?;
        Ok(changed)
    }
}
