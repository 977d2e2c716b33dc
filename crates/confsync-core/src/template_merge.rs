//! Template-preserving merge and template edit artifacts
//!
//! When the domain side wins for an item whose module copy references a
//! template fragment, the domain value is merged into the module value
//! without replacing the template tag. Edits that land inside the expanded
//! template become [`TemplateEdit`]s, written out as `<template>.diff` files
//! for the operator to apply. Template files themselves are never written.

use confsync_content::{
    ExpandOptions, Expander, fingerprint, is_template_tag, render, tag_line, template_candidates,
    unified_diff,
};
use confsync_fs::ConfigRoot;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::Result;
use crate::engine::Writer;

const MAX_MERGE_DEPTH: usize = 50;

/// A domain-side edit to content produced by a template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEdit {
    /// Root-relative template file
    pub template_path: String,
    pub include_tag: String,
    /// Module file holding the template tag
    pub include_site: String,
    pub include_site_line: Option<usize>,
    /// Domain file where the edit was made
    pub domain_site: String,
    pub domain_line: Option<usize>,
    /// Value the template would need to produce
    pub proposed: Value,
}

/// Merges one domain item into its module copy.
pub struct TemplateMerge<'a> {
    root: &'a ConfigRoot,
    include_site: &'a str,
    include_text: String,
    domain_site: &'a str,
    domain_line: Option<usize>,
}

impl<'a> TemplateMerge<'a> {
    pub fn new(
        root: &'a ConfigRoot,
        include_site: &'a str,
        domain_site: &'a str,
        domain_line: Option<usize>,
    ) -> Result<Self> {
        Ok(Self {
            root,
            include_site,
            include_text: root.read(include_site)?,
            domain_site,
            domain_line,
        })
    }

    /// Merge `domain` into `module`, keeping template tags of `module`.
    ///
    /// Shared map keys keep the module order, domain-only keys follow; lists
    /// merge by index and take the domain tail; anything else takes the
    /// domain value.
    pub fn merge(
        &self,
        module: &Value,
        domain: &Value,
        warnings: &mut Vec<String>,
        edits: &mut Vec<TemplateEdit>,
    ) -> Value {
        self.merge_at(module, domain, warnings, edits, 0)
    }

    fn merge_at(
        &self,
        module: &Value,
        domain: &Value,
        warnings: &mut Vec<String>,
        edits: &mut Vec<TemplateEdit>,
        depth: usize,
    ) -> Value {
        if depth > MAX_MERGE_DEPTH {
            warnings.push(format!(
                "Template merge exceeded max depth in {}.",
                self.include_site
            ));
            return domain.clone();
        }

        match (module, domain) {
            (Value::Tagged(tagged), _) if is_template_tag(&tagged.tag.to_string()) => {
                self.preserve_template(tagged, module, domain, warnings, edits);
                module.clone()
            }
            (Value::Mapping(module_map), Value::Mapping(domain_map)) => {
                let mut merged = Mapping::new();
                for (key, value) in module_map {
                    let Some(domain_value) = domain_map.get(key) else {
                        continue;
                    };
                    let value = self.merge_at(value, domain_value, warnings, edits, depth + 1);
                    merged.insert(key.clone(), value);
                }
                for (key, value) in domain_map {
                    if !module_map.contains_key(key) {
                        merged.insert(key.clone(), value.clone());
                    }
                }
                Value::Mapping(merged)
            }
            (Value::Sequence(module_items), Value::Sequence(domain_items)) => {
                let mut merged: Vec<Value> = module_items
                    .iter()
                    .zip(domain_items)
                    .map(|(m, d)| self.merge_at(m, d, warnings, edits, depth + 1))
                    .collect();
                merged.extend(domain_items.iter().skip(module_items.len()).cloned());
                Value::Sequence(merged)
            }
            _ => domain.clone(),
        }
    }

    fn preserve_template(
        &self,
        tagged: &TaggedValue,
        module: &Value,
        domain: &Value,
        warnings: &mut Vec<String>,
        edits: &mut Vec<TemplateEdit>,
    ) {
        let expander = Expander::new(self.root, ExpandOptions::templates_only());
        let Some(expanded) = expander.expand(module, self.include_site, warnings) else {
            return;
        };
        if &expanded == domain {
            return;
        }
        let tag = tagged.tag.to_string();
        let include_site_line = tag_line(&self.include_text, &tag);
        let candidates = template_candidates(self.root, &tag, self.include_site, warnings);
        match candidates.as_slice() {
            [template_path] => {
                debug!(template = %template_path, site = self.include_site, "template edit detected");
                edits.push(TemplateEdit {
                    template_path: template_path.clone(),
                    include_tag: tag,
                    include_site: self.include_site.to_string(),
                    include_site_line,
                    domain_site: self.domain_site.to_string(),
                    domain_line: self.domain_line,
                    proposed: domain.clone(),
                });
            }
            _ => warnings.push(format!(
                "Template-backed edit detected for {} in {}:{}; cannot generate a diff for glob/ambiguous includes.",
                tag,
                self.include_site,
                include_site_line.map_or_else(|| "?".to_string(), |line| line.to_string()),
            )),
        }
    }
}

fn location(path: &str, line: Option<usize>) -> String {
    match line {
        Some(line) => format!("{}:{}", path, line),
        None => path.to_string(),
    }
}

/// Write one `<template>.diff` per edited template.
///
/// Templates whose edits disagree get no diff and a warning. Returns the
/// diff files that changed.
pub fn write_template_diffs(
    root: &ConfigRoot,
    writer: &mut Writer,
    edits: &[TemplateEdit],
    warnings: &mut Vec<String>,
) -> Result<Vec<String>> {
    let mut templates: Vec<(&str, Vec<&TemplateEdit>)> = Vec::new();
    for edit in edits {
        match templates
            .iter_mut()
            .find(|(path, _)| *path == edit.template_path)
        {
            Some((_, group)) => group.push(edit),
            None => templates.push((&edit.template_path, vec![edit])),
        }
    }

    let mut changed = Vec::new();
    for (template_path, group) in templates {
        let mut proposals: Vec<(String, &Value)> = Vec::new();
        for edit in &group {
            let fp = fingerprint(Some(&edit.proposed), &[]);
            if !proposals.iter().any(|(seen, _)| *seen == fp) {
                proposals.push((fp, &edit.proposed));
            }
        }
        let [(_, proposed)] = proposals.as_slice() else {
            warnings.push(format!(
                "Conflicting template edits detected for {}; wrote no diff file.",
                template_path
            ));
            continue;
        };

        let old_text = root.read(template_path)?;
        let new_text = render(proposed)?;
        let diff = unified_diff(template_path, &old_text, &new_text);
        if diff.trim().is_empty() {
            continue;
        }

        let mut header: Vec<String> = vec![format!("# TEMPLATE EDIT DETECTED for {}", template_path)];
        for edit in &group {
            for line in [
                format!("# Edited in {}", location(&edit.domain_site, edit.domain_line)),
                format!(
                    "# Included from {} ({})",
                    location(&edit.include_site, edit.include_site_line),
                    edit.include_tag
                ),
            ] {
                if !header.contains(&line) {
                    header.push(line);
                }
            }
        }

        let diff_path = format!("{}.diff", template_path);
        let content = format!("{}\n\n{}", header.join("\n"), diff);
        if writer.write_text(&diff_path, &content)? {
            changed.push(diff_path);
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsync_content::parse_document;
    use confsync_test_utils::ConfigTree;
    use pretty_assertions::assert_eq;

    const TEMPLATE: &str = "packages/common/lights.template.yaml";
    const MODULE: &str = "packages/porch/automation.yaml";

    fn yaml(text: &str) -> Value {
        parse_document(text, "test").unwrap()
    }

    fn tree() -> ConfigTree {
        let tree = ConfigTree::new();
        tree.write(TEMPLATE, "- service: light.turn_on\n  target:\n    entity_id: light.porch\n");
        tree.write(
            MODULE,
            "- id: porch\n  alias: Porch\n  action: !/packages/common/lights.template.yaml\n",
        );
        tree
    }

    #[test]
    fn tag_is_kept_and_edit_recorded() {
        let tree = tree();
        let merge = TemplateMerge::new(tree.root(), MODULE, "automations.yaml", Some(3)).unwrap();
        let module = yaml("id: porch\nalias: Porch\naction: !/packages/common/lights.template.yaml\n");
        let domain = yaml(
            "id: porch\nalias: Porch light\naction:\n  - service: light.turn_on\n    target:\n      entity_id: light.porch_2\nmode: single\n",
        );
        let mut warnings = Vec::new();
        let mut edits = Vec::new();
        let merged = merge.merge(&module, &domain, &mut warnings, &mut edits);

        assert!(matches!(merged["action"], Value::Tagged(_)));
        assert_eq!(merged["alias"], Value::String("Porch light".into()));
        assert_eq!(merged["mode"], Value::String("single".into()));
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].template_path, TEMPLATE);
        assert_eq!(edits[0].include_site_line, Some(3));
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn unchanged_template_content_records_nothing() {
        let tree = tree();
        let merge = TemplateMerge::new(tree.root(), MODULE, "automations.yaml", None).unwrap();
        let module = yaml("action: !/packages/common/lights.template.yaml\n");
        let domain = yaml("action:\n  - service: light.turn_on\n    target:\n      entity_id: light.porch\n");
        let mut edits = Vec::new();
        merge.merge(&module, &domain, &mut Vec::new(), &mut edits);
        assert!(edits.is_empty());
    }

    #[test]
    fn lists_merge_by_index_and_take_the_domain_tail() {
        let tree = tree();
        let merge = TemplateMerge::new(tree.root(), MODULE, "automations.yaml", None).unwrap();
        let merged = merge.merge(
            &yaml("[a, b]\n"),
            &yaml("[x, y, z]\n"),
            &mut Vec::new(),
            &mut Vec::new(),
        );
        assert_eq!(merged, yaml("[x, y, z]\n"));
    }

    #[test]
    fn diff_file_is_written_next_to_the_template() {
        let tree = tree();
        let edit = TemplateEdit {
            template_path: TEMPLATE.to_string(),
            include_tag: "!/packages/common/lights.template.yaml".to_string(),
            include_site: MODULE.to_string(),
            include_site_line: Some(3),
            domain_site: "automations.yaml".to_string(),
            domain_line: Some(1),
            proposed: yaml("- service: light.turn_off\n"),
        };
        let mut writer = Writer::new(tree.root(), false);
        let mut warnings = Vec::new();
        let changed =
            write_template_diffs(tree.root(), &mut writer, &[edit.clone(), edit], &mut warnings).unwrap();

        assert_eq!(changed, vec![format!("{}.diff", TEMPLATE)]);
        let diff = tree.read(&format!("{}.diff", TEMPLATE));
        assert!(diff.starts_with(
            "# TEMPLATE EDIT DETECTED for packages/common/lights.template.yaml\n# Edited in automations.yaml:1\n# Included from packages/porch/automation.yaml:3 (!/packages/common/lights.template.yaml)\n\ndiff --git "
        ));
        assert!(diff.contains("+- service: light.turn_off"));
        assert_eq!(tree.read(TEMPLATE), "- service: light.turn_on\n  target:\n    entity_id: light.porch\n");
    }

    #[test]
    fn conflicting_edits_write_no_diff() {
        let tree = tree();
        let edit = |proposed: &str| TemplateEdit {
            template_path: TEMPLATE.to_string(),
            include_tag: "!/packages/common/lights.template.yaml".to_string(),
            include_site: MODULE.to_string(),
            include_site_line: None,
            domain_site: "automations.yaml".to_string(),
            domain_line: None,
            proposed: yaml(proposed),
        };
        let mut writer = Writer::new(tree.root(), false);
        let mut warnings = Vec::new();
        let changed = write_template_diffs(
            tree.root(),
            &mut writer,
            &[edit("- a: 1\n"), edit("- a: 2\n")],
            &mut warnings,
        )
        .unwrap();
        assert!(changed.is_empty());
        assert_eq!(
            warnings,
            vec![format!("Conflicting template edits detected for {}; wrote no diff file.", TEMPLATE)]
        );
        assert!(!tree.exists(&format!("{}.diff", TEMPLATE)));
    }
}
