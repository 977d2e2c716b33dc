//! Include and template expansion
//!
//! Expands template tags (`!/packages/common/lights.template.yaml`, globs
//! allowed) and, when enabled, the platform `!include*` tags into plain data.
//! Content that cannot be expanded is dropped from its parent and a warning is
//! recorded; the expander never writes to disk.

use confsync_fs::{ConfigRoot, NormalizedPath, has_parent_segment, normalize_relative};
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::yaml::{PLATFORM_INCLUDE_TAGS, deep_merge, is_template_pattern, is_template_tag, parse_document};

const MAX_DEPTH: usize = 20;
const INCLUDE_FILE_PATTERN: &str = "*.y*ml";

/// Which tag families to resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    pub templates: bool,
    pub platform_includes: bool,
}

impl ExpandOptions {
    pub fn templates_only() -> Self {
        Self {
            templates: true,
            platform_includes: false,
        }
    }

    pub fn with_platform_includes(mut self, enabled: bool) -> Self {
        self.platform_includes = enabled;
        self
    }
}

/// Expands tagged values relative to a configuration root.
#[derive(Debug, Clone, Copy)]
pub struct Expander<'a> {
    root: &'a ConfigRoot,
    options: ExpandOptions,
}

impl<'a> Expander<'a> {
    pub fn new(root: &'a ConfigRoot, options: ExpandOptions) -> Self {
        Self { root, options }
    }

    /// Expand `value`, which was read from the file `base` (root-relative).
    ///
    /// Returns `None` when the value itself had to be dropped.
    pub fn expand(&self, value: &Value, base: &str, warnings: &mut Vec<String>) -> Option<Value> {
        self.expand_at(value, base, warnings, 0)
    }

    fn expand_at(
        &self,
        value: &Value,
        base: &str,
        warnings: &mut Vec<String>,
        depth: usize,
    ) -> Option<Value> {
        if depth > MAX_DEPTH {
            warnings.push(format!("Include expansion exceeded max depth at {}.", base));
            return Some(value.clone());
        }

        match value {
            Value::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                if self.options.templates && is_template_tag(&tag) {
                    return self.expand_template(&tag, base, warnings, depth);
                }
                if self.options.platform_includes && PLATFORM_INCLUDE_TAGS.contains(&tag.as_str()) {
                    return self.expand_platform_include(&tag, &tagged.value, base, warnings, depth);
                }
                let nested = match &tagged.value {
                    Value::Mapping(map) => {
                        Value::Mapping(self.expand_mapping(map, base, warnings, depth))
                    }
                    Value::Sequence(items) => {
                        Value::Sequence(self.expand_sequence(items, base, warnings, depth))
                    }
                    _ => return Some(value.clone()),
                };
                Some(Value::Tagged(Box::new(TaggedValue {
                    tag: tagged.tag.clone(),
                    value: nested,
                })))
            }
            Value::Mapping(map) => Some(Value::Mapping(self.expand_mapping(map, base, warnings, depth))),
            Value::Sequence(items) => {
                Some(Value::Sequence(self.expand_sequence(items, base, warnings, depth)))
            }
            other => Some(other.clone()),
        }
    }

    fn expand_mapping(
        &self,
        map: &Mapping,
        base: &str,
        warnings: &mut Vec<String>,
        depth: usize,
    ) -> Mapping {
        let mut output = Mapping::new();
        for (key, value) in map {
            if let Some(expanded) = self.expand_at(value, base, warnings, depth + 1) {
                output.insert(key.clone(), expanded);
            }
        }
        output
    }

    fn expand_sequence(
        &self,
        items: &[Value],
        base: &str,
        warnings: &mut Vec<String>,
        depth: usize,
    ) -> Vec<Value> {
        items
            .iter()
            .filter_map(|item| self.expand_at(item, base, warnings, depth + 1))
            .collect()
    }

    fn expand_template(
        &self,
        tag: &str,
        base: &str,
        warnings: &mut Vec<String>,
        depth: usize,
    ) -> Option<Value> {
        let candidates = template_candidates(self.root, tag, base, warnings);
        if candidates.is_empty() {
            warnings.push(format!(
                "Template include did not match any files: {} in {}",
                tag, base
            ));
            return None;
        }

        let mut expanded = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let loaded = self.load_include(candidate, warnings)?;
            let child = self.expand_at(&loaded, candidate, warnings, depth + 1)?;
            expanded.push(child);
        }

        if expanded.len() == 1 {
            return expanded.pop();
        }
        if expanded.iter().all(Value::is_sequence) {
            let merged = expanded
                .into_iter()
                .filter_map(|entry| match entry {
                    Value::Sequence(items) => Some(items),
                    _ => None,
                })
                .flatten()
                .collect();
            return Some(Value::Sequence(merged));
        }
        if expanded.iter().all(Value::is_mapping) {
            let merged = expanded
                .into_iter()
                .filter_map(|entry| match entry {
                    Value::Mapping(map) => Some(map),
                    _ => None,
                })
                .fold(Mapping::new(), deep_merge);
            return Some(Value::Mapping(merged));
        }
        warnings.push(format!(
            "Template glob include produced mixed shapes; skipping: {} in {}",
            tag, base
        ));
        None
    }

    fn expand_platform_include(
        &self,
        tag: &str,
        argument: &Value,
        base: &str,
        warnings: &mut Vec<String>,
        depth: usize,
    ) -> Option<Value> {
        let Some(argument) = argument.as_str().filter(|arg| !arg.trim().is_empty()) else {
            warnings.push(format!("{} must be a non-empty string in {}", tag, base));
            return None;
        };
        let Some(target) = self.resolve_include_path(base, argument) else {
            warnings.push(format!("{} must stay within config dir in {}", tag, base));
            return None;
        };
        debug!(tag, base, target = %target, "expanding platform include");

        if tag == "!include" {
            let loaded = self.load_include(&target, warnings)?;
            return self.expand_at(&loaded, &target, warnings, depth + 1);
        }

        let directory_missing = !self.root.is_dir(&target);
        let named = matches!(tag, "!include_dir_named" | "!include_dir_merge_named");
        if directory_missing {
            warnings.push(format!("{} directory not found: {}", tag, argument));
            return Some(if named {
                Value::Mapping(Mapping::new())
            } else {
                Value::Sequence(Vec::new())
            });
        }

        let children = match self.root.list_files(&target, INCLUDE_FILE_PATTERN) {
            Ok(children) => children,
            Err(e) => {
                warnings.push(format!("{} could not list {}: {}", tag, argument, e));
                Vec::new()
            }
        };

        let mut list = Vec::new();
        let mut map = Mapping::new();
        for child in &children {
            let Some(loaded) = self.load_include(child, warnings) else {
                continue;
            };
            let Some(expanded) = self.expand_at(&loaded, child, warnings, depth + 1) else {
                continue;
            };
            match tag {
                "!include_dir_list" => list.push(expanded),
                "!include_dir_merge_list" => match expanded {
                    Value::Sequence(items) => list.extend(items),
                    Value::Null => {}
                    other => list.push(other),
                },
                _ => {
                    let key = Value::String(
                        NormalizedPath::new(child.as_str())
                            .file_stem()
                            .unwrap_or_default()
                            .to_string(),
                    );
                    let merged = match (tag, map.get(&key), expanded) {
                        ("!include_dir_merge_named", Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                            Value::Mapping(deep_merge(existing.clone(), incoming))
                        }
                        (_, _, expanded) => expanded,
                    };
                    map.insert(key, merged);
                }
            }
        }

        Some(if named {
            Value::Mapping(map)
        } else {
            Value::Sequence(list)
        })
    }

    fn resolve_include_path(&self, base: &str, argument: &str) -> Option<String> {
        let base_dir = match NormalizedPath::new(base).parent() {
            Some(parent) => self.root.path().join(parent.as_str()),
            None => self.root.path().clone(),
        };
        base_dir
            .join(argument)
            .strip_root(self.root.path())
            .filter(|rel| !rel.is_empty())
    }

    fn load_include(&self, rel_path: &str, warnings: &mut Vec<String>) -> Option<Value> {
        if !self.root.is_file(rel_path) {
            warnings.push(format!("Missing include file: {}", rel_path));
            return None;
        }
        let text = match self.root.read(rel_path) {
            Ok(text) => text,
            Err(e) => {
                warnings.push(format!("Missing include file: {} ({})", rel_path, e));
                return None;
            }
        };
        match parse_document(&text, rel_path) {
            Ok(value) => Some(value),
            Err(e) => {
                warnings.push(format!("Invalid YAML in {}: {}", rel_path, e));
                None
            }
        }
    }
}

/// Resolve a template tag to the root-relative template files it names.
///
/// Glob patterns return every matching template file in sorted order; plain
/// paths return the file when it exists.
pub fn template_candidates(
    root: &ConfigRoot,
    tag: &str,
    base: &str,
    warnings: &mut Vec<String>,
) -> Vec<String> {
    if !is_template_tag(tag) {
        return Vec::new();
    }
    let raw = tag[1..].trim().trim_start_matches('/');
    if raw.is_empty() {
        warnings.push(format!(
            "Invalid template include path {} in {}: Include path is empty.",
            tag, base
        ));
        return Vec::new();
    }
    if has_parent_segment(raw) {
        warnings.push(format!(
            "Invalid template include path {} in {}: Include path cannot include parent directory segments.",
            tag, base
        ));
        return Vec::new();
    }

    if raw.contains(['*', '?', '[', ']']) {
        return match root.glob(raw) {
            Ok(matches) => matches
                .into_iter()
                .filter(|rel| {
                    NormalizedPath::new(rel.as_str())
                        .file_name()
                        .is_some_and(is_template_pattern)
                })
                .collect(),
            Err(e) => {
                warnings.push(format!("Invalid template include path {} in {}: {}", tag, base, e));
                Vec::new()
            }
        };
    }

    match normalize_relative(raw) {
        Some(rel) if root.is_file(&rel) => vec![rel],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixture(files: &[(&str, &str)]) -> (tempfile::TempDir, ConfigRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = ConfigRoot::new(dir.path()).unwrap();
        for (rel, content) in files {
            root.write(rel, content).unwrap();
        }
        (dir, root)
    }

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn single_template_substitutes_in_place() {
        let (_dir, root) = fixture(&[(
            "packages/common/lights.template.yaml",
            "- service: light.turn_on\n",
        )]);
        let expander = Expander::new(&root, ExpandOptions::templates_only());
        let mut warnings = Vec::new();

        let value = yaml("action: !/packages/common/lights.template.yaml\n");
        let expanded = expander
            .expand(&value, "packages/kitchen/automation.yaml", &mut warnings)
            .unwrap();

        assert_eq!(expanded, yaml("action:\n  - service: light.turn_on\n"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn glob_templates_concatenate_lists() {
        let (_dir, root) = fixture(&[
            ("packages/common/a.template.yaml", "- one\n"),
            ("packages/common/b.template.yaml", "- two\n"),
        ]);
        let expander = Expander::new(&root, ExpandOptions::templates_only());
        let mut warnings = Vec::new();

        let expanded = expander
            .expand(&yaml("!packages/common/*.template.yaml x"), "a.yaml", &mut warnings)
            .unwrap();

        assert_eq!(expanded, yaml("[one, two]"));
    }

    #[test]
    fn mixed_glob_shapes_drop_the_value() {
        let (_dir, root) = fixture(&[
            ("packages/common/a.template.yaml", "- one\n"),
            ("packages/common/b.template.yaml", "k: v\n"),
        ]);
        let expander = Expander::new(&root, ExpandOptions::templates_only());
        let mut warnings = Vec::new();

        let value = yaml("keep: 1\ndrop: !packages/common/*.template.yaml x\n");
        let expanded = expander.expand(&value, "a.yaml", &mut warnings).unwrap();

        assert_eq!(expanded, yaml("keep: 1\n"));
        assert!(warnings[0].contains("mixed shapes"));
    }

    #[test]
    fn missing_template_is_dropped_with_warning() {
        let (_dir, root) = fixture(&[]);
        let expander = Expander::new(&root, ExpandOptions::templates_only());
        let mut warnings = Vec::new();

        let result = expander.expand(&yaml("!/packages/none.template.yaml x"), "a.yaml", &mut warnings);

        assert_eq!(result, None);
        assert!(warnings[0].starts_with("Template include did not match any files"));
    }

    #[test]
    fn parent_segments_are_rejected() {
        let (_dir, root) = fixture(&[]);
        let mut warnings = Vec::new();
        let found = template_candidates(&root, "!../x.template.yaml", "a.yaml", &mut warnings);
        assert!(found.is_empty());
        assert!(warnings[0].starts_with("Invalid template include path"));
    }

    #[test]
    fn platform_includes_resolve_only_when_enabled() {
        let (_dir, root) = fixture(&[
            ("groups/members/kitchen.yaml", "name: Kitchen\n"),
            ("groups/members/hall.yaml", "name: Hall\n"),
        ]);
        let value = yaml("all: !include_dir_named members\n");
        let mut warnings = Vec::new();

        let untouched = Expander::new(&root, ExpandOptions::templates_only())
            .expand(&value, "groups/lights.yaml", &mut warnings)
            .unwrap();
        assert_eq!(untouched, value);

        let expanded = Expander::new(&root, ExpandOptions::templates_only().with_platform_includes(true))
            .expand(&value, "groups/lights.yaml", &mut warnings)
            .unwrap();
        assert_eq!(
            expanded,
            yaml("all:\n  hall: {name: Hall}\n  kitchen: {name: Kitchen}\n")
        );
    }

    #[test]
    fn missing_include_directory_degrades_to_empty() {
        let (_dir, root) = fixture(&[]);
        let expander = Expander::new(&root, ExpandOptions::default().with_platform_includes(true));
        let mut warnings = Vec::new();

        let expanded = expander
            .expand(&yaml("!include_dir_merge_list nowhere"), "groups.yaml", &mut warnings)
            .unwrap();

        assert_eq!(expanded, Value::Sequence(Vec::new()));
        assert_eq!(warnings, vec!["!include_dir_merge_list directory not found: nowhere"]);
    }

    #[test]
    fn include_cannot_escape_root() {
        let (_dir, root) = fixture(&[]);
        let expander = Expander::new(&root, ExpandOptions::default().with_platform_includes(true));
        let mut warnings = Vec::new();

        let result = expander.expand(&yaml("!include ../../etc/passwd"), "groups.yaml", &mut warnings);

        assert_eq!(result, None);
        assert!(warnings[0].contains("must stay within config dir"));
    }

    #[test]
    fn unknown_tags_keep_their_payload() {
        let (_dir, root) = fixture(&[]);
        let expander = Expander::new(&root, ExpandOptions::templates_only());
        let mut warnings = Vec::new();
        let value = yaml("password: !secret wifi\n");
        assert_eq!(expander.expand(&value, "a.yaml", &mut warnings), Some(value));
    }
}
