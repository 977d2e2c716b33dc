//! Dashboard views
//!
//! View modules are either a bare list of views or `{views: [...], ...meta}`.
//! Dashboard-level keys (title, theme and the like) live in exactly one
//! module: the first valid one carrying any, or the unassigned file.

use std::collections::HashMap;

use serde_yaml::{Mapping, Value};

use super::Cycle;
use super::resolve::Sides;
use crate::Result;
use crate::parse::{ViewLayout, ViewShape, parse_view_domain, parse_view_file, views_with_meta};
use crate::preference::Preference;
use crate::registry::{DomainSpec, Target};

impl Cycle<'_> {
    pub(super) fn sync_view_list(
        &mut self,
        spec: &'static DomainSpec,
        unassigned: &str,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let target = Target::Domain(spec);
        let module_files = spec.module_files(self.root)?;
        let mut sides = Sides::new(module_files.clone());
        let mut layouts: HashMap<String, (ViewShape, Mapping)> = HashMap::new();
        let mut meta_source: Option<String> = None;
        for rel_path in &module_files {
            let parsed = parse_view_file(self.root, spec, rel_path, warnings)?;
            let parsed = parsed.map(|file| {
                if meta_source.is_none() && !file.meta.is_empty() {
                    meta_source = Some(rel_path.clone());
                }
                layouts.insert(rel_path.clone(), (file.shape, file.meta));
                (file.views, file.injected)
            });
            sides.add_module_file(target, rel_path, parsed, warnings);
        }

        let mut domain_meta = Mapping::new();
        if let Some(domain) = parse_view_domain(self.root, spec, warnings)? {
            sides.domain_valid = true;
            sides.domain_injected = domain.injected;
            domain_meta = domain.meta;
            sides.add_domain_items(target, spec.domain_file, domain.views, warnings);
        }
        if sides.nothing_to_do() {
            return Ok(Vec::new());
        }

        let mut plan = self.plan(target, &sides, unassigned, warnings)?;
        let source_meta = meta_source
            .as_ref()
            .and_then(|rel_path| layouts.get(rel_path))
            .map(|(_, meta)| meta.clone());
        let meta = match (plan.preference, source_meta) {
            (Preference::Domain, _) | (_, None) => domain_meta,
            (_, Some(meta)) => meta,
        };
        let meta_target = meta_source.unwrap_or_else(|| plan.unassigned.clone());
        if !meta.is_empty() {
            plan.desired.entry(meta_target.clone()).or_default();
        }

        let modules = plan
            .writable(&sides)
            .map(|(rel_path, items)| {
                let views: Vec<Value> = items.iter().map(|item| item.data.clone()).collect();
                let payload = if *rel_path == meta_target {
                    Value::Mapping(views_with_meta(views, meta.clone()))
                } else {
                    let shape = layouts
                        .get(rel_path)
                        .map_or(ViewShape::Map, |(shape, _)| *shape);
                    ViewLayout::payload(shape, views, Mapping::new())
                };
                (rel_path.clone(), payload)
            })
            .collect();
        let combined = plan
            .expanded(target, false, warnings)
            .into_iter()
            .map(|(_, expanded)| expanded.clone())
            .collect();
        let domain = Value::Mapping(views_with_meta(combined, meta));
        let changed = self.write_outputs(
            &plan,
            modules,
            vec![(spec.domain_file.to_string(), domain)],
            warnings,
        )?;
        self.finish(target, &sides, plan)?;
        Ok(changed)
    }
}
