//! Tag-aware YAML codec
//!
//! Documents are held as [`serde_yaml::Value`]. Custom tags such as
//! `!include`, `!secret` or `!/packages/common.template.yaml` decode to
//! [`Value::Tagged`] and render back unchanged, so module files keep their
//! references across a parse/render cycle.

use confsync_fs::ConfigRoot;
use serde_yaml::mapping::Entry;
use serde_yaml::{Mapping, Value};

use crate::{Error, Result};

/// Platform include tags understood by the expander.
pub const PLATFORM_INCLUDE_TAGS: [&str; 5] = [
    "!include",
    "!include_dir_list",
    "!include_dir_merge_list",
    "!include_dir_named",
    "!include_dir_merge_named",
];

/// A parsed file together with the text it came from.
#[derive(Debug, Clone)]
pub struct YamlDocument {
    pub data: Value,
    pub text: String,
    /// 1-based source lines of top-level sequence items, when they could be
    /// located for every item.
    pub item_lines: Option<Vec<usize>>,
}

impl YamlDocument {
    /// Source line of the top-level item at `index`.
    pub fn item_line(&self, index: usize) -> Option<usize> {
        self.item_lines.as_ref()?.get(index).copied()
    }
}

/// Parse YAML text. Blank text is `null`.
///
/// `path` is used in error messages only.
pub fn parse_document(text: &str, path: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(text).map_err(|e| Error::parse(path, e.to_string()))
}

/// Render a value as block-style YAML with exactly one trailing newline.
///
/// `null` renders to empty text, and a tag with an empty payload renders as
/// the bare tag.
pub fn render(value: &Value) -> Result<String> {
    if value.is_null() {
        return Ok(String::new());
    }
    let text = serde_yaml::to_string(value).map_err(|e| Error::Render {
        message: e.to_string(),
    })?;
    let mut bare_tags = Vec::new();
    collect_bare_tags(value, &mut bare_tags);
    if bare_tags.is_empty() {
        return Ok(format!("{}\n", text.trim_end()));
    }
    let lines: Vec<&str> = text
        .trim_end()
        .lines()
        .map(|line| strip_null_payload(line, &bare_tags))
        .collect();
    Ok(format!("{}\n", lines.join("\n")))
}

/// Tags whose payload is `null`, deduplicated.
fn collect_bare_tags(value: &Value, tags: &mut Vec<String>) {
    match value {
        Value::Tagged(tagged) => {
            if tagged.value.is_null() {
                let tag = tagged.tag.to_string();
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            } else {
                collect_bare_tags(&tagged.value, tags);
            }
        }
        Value::Mapping(map) => map.iter().for_each(|(key, value)| {
            collect_bare_tags(key, tags);
            collect_bare_tags(value, tags);
        }),
        Value::Sequence(items) => items.iter().for_each(|item| collect_bare_tags(item, tags)),
        _ => {}
    }
}

/// `key: !tag null` becomes `key: !tag`, and likewise for `- !tag null`.
fn strip_null_payload<'a>(line: &'a str, tags: &[String]) -> &'a str {
    let Some(head) = line.strip_suffix(" null") else {
        return line;
    };
    let matched = tags.iter().any(|tag| {
        head.strip_suffix(tag.as_str()).is_some_and(|prefix| {
            prefix.trim().is_empty() || prefix.ends_with(": ") || prefix.ends_with("- ")
        })
    });
    if matched { head } else { line }
}

/// Read and parse a file under the root. Missing files load as `null`.
pub fn load_document(root: &ConfigRoot, rel_path: &str) -> Result<YamlDocument> {
    let text = root.read(rel_path)?;
    let data = parse_document(&text, rel_path)?;
    let item_lines = match &data {
        Value::Sequence(items) => {
            let lines = sequence_item_lines(&text);
            (lines.len() == items.len()).then_some(lines)
        }
        _ => None,
    };
    Ok(YamlDocument {
        data,
        text,
        item_lines,
    })
}

/// 1-based lines that open a top-level block sequence item.
pub fn sequence_item_lines(text: &str) -> Vec<usize> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let Some(rest) = line.strip_prefix('-') else {
                return false;
            };
            rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')
        })
        .map(|(idx, _)| idx + 1)
        .collect()
}

/// 1-based line of the first occurrence of `tag` as a whole token.
pub fn tag_line(text: &str, tag: &str) -> Option<usize> {
    text.lines().enumerate().find_map(|(idx, line)| {
        line.match_indices(tag)
            .any(|(pos, _)| {
                line[pos + tag.len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| c.is_whitespace() || matches!(c, ',' | ']' | '}'))
            })
            .then_some(idx + 1)
    })
}

/// Text form of a scalar used as a key or identity.
pub fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// True for tags of the form `!path/to/name.template.yaml`.
pub fn is_template_tag(tag: &str) -> bool {
    let Some(suffix) = tag.strip_prefix('!') else {
        return false;
    };
    let suffix = suffix.trim_start_matches('/');
    !suffix.is_empty() && is_template_pattern(suffix)
}

pub(crate) fn is_template_pattern(pattern: &str) -> bool {
    let lowered = pattern.to_lowercase();
    lowered.ends_with(".template.yaml") || lowered.ends_with(".template.yml")
}

/// True when any node below `value` carries a template tag.
pub fn contains_template_tags(value: &Value) -> bool {
    match value {
        Value::Tagged(tagged) => {
            is_template_tag(&tagged.tag.to_string()) || contains_template_tags(&tagged.value)
        }
        Value::Mapping(map) => map.values().any(contains_template_tags),
        Value::Sequence(items) => items.iter().any(contains_template_tags),
        _ => false,
    }
}

/// Merge `right` into `left`: nested maps merge, nested lists concatenate,
/// anything else is overwritten. Existing keys keep their position.
pub fn deep_merge(mut left: Mapping, right: Mapping) -> Mapping {
    for (key, incoming) in right {
        match left.entry(key) {
            Entry::Occupied(mut slot) => match (slot.get_mut(), incoming) {
                (Value::Mapping(existing), Value::Mapping(incoming)) => {
                    let base = std::mem::take(existing);
                    *existing = deep_merge(base, incoming);
                }
                (Value::Sequence(existing), Value::Sequence(incoming)) => {
                    existing.extend(incoming);
                }
                (existing, incoming) => *existing = incoming,
            },
            Entry::Vacant(slot) => {
                slot.insert(incoming);
            }
        }
    }
    left
}
