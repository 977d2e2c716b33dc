//! UI helpers (`input_boolean`, `timer`, ...)
//!
//! Module files bundle helpers of several types; every type has its own
//! domain file. The whole family is reconciled as one target.

use serde_yaml::{Mapping, Value};

use super::Cycle;
use super::resolve::Sides;
use crate::Result;
use crate::item::ModuleItem;
use crate::parse::{parse_helper_domain, parse_helpers_file};
use crate::registry::{HELPER_TYPES, Target, helper_domain_file};

impl Cycle<'_> {
    pub(super) fn sync_helpers(&mut self, unassigned: &str, warnings: &mut Vec<String>) -> Result<Vec<String>> {
        let target = Target::Helpers;
        let module_files = target.module_files(self.root)?;
        let mut sides = Sides::new(module_files.clone());
        for rel_path in &module_files {
            let parsed = parse_helpers_file(self.root, rel_path, warnings)?;
            sides.add_module_file(target, rel_path, parsed.map(|items| (items, false)), warnings);
        }
        // Helper domain files are optional; a missing one is an empty type.
        sides.domain_valid = true;
        for helper in HELPER_TYPES {
            let items = parse_helper_domain(self.root, helper, warnings)?;
            sides.add_domain_items(target, &helper_domain_file(helper), items, warnings);
        }

        let plan = self.plan(target, &sides, unassigned, warnings)?;
        let modules = plan
            .writable(&sides)
            .map(|(rel_path, items)| (rel_path.clone(), Value::Mapping(bundle(items))))
            .collect();

        let expanded = plan.expanded(target, true, warnings);
        let domains = HELPER_TYPES
            .iter()
            .map(|helper| {
                let combined: Mapping = expanded
                    .iter()
                    .filter(|(item, _)| item.helper_type == Some(*helper))
                    .map(|(item, value)| (Value::String(item.id.clone()), (*value).clone()))
                    .collect();
                (helper_domain_file(helper), Value::Mapping(combined))
            })
            .collect();

        let changed = self.write_outputs(&plan, modules, domains, warnings)?;
        self.finish(target, &sides, plan)?;
        Ok(changed)
    }
}

/// `{helper_type: {id: data}}` in registry order, omitting empty types.
fn bundle(items: &[ModuleItem]) -> Mapping {
    let mut payload = Mapping::new();
    for helper in HELPER_TYPES {
        let values: Mapping = items
            .iter()
            .filter(|item| item.helper_type == Some(helper))
            .map(|item| (Value::String(item.id.clone()), item.data.clone()))
            .collect();
        if !values.is_empty() {
            payload.insert(Value::String(helper.to_string()), Value::Mapping(values));
        }
    }
    payload
}
