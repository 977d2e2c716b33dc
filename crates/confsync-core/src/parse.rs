//! Reading items out of module and domain files
//!
//! Every reader reports recoverable problems as warnings. A file that cannot
//! be parsed, or whose top-level shape is wrong, comes back as `None`: the
//! engine skips it and never rewrites it.

use std::collections::HashSet;

use confsync_content::{
    ExpandOptions, Expander, YamlDocument, fingerprint, load_document, scalar_string,
};
use confsync_fs::ConfigRoot;
use serde_yaml::{Mapping, Value};

use crate::Result;
use crate::identity::{alias_id, ensure_unique, explicit_id, item_name, sanitize_view_path, synthetic_id};
use crate::item::ModuleItem;
use crate::registry::{DomainKind, DomainSpec, helper_domain_file, helper_type};

/// Load a document, turning parse errors into a warning.
pub(crate) fn load_or_warn(
    root: &ConfigRoot,
    rel_path: &str,
    warnings: &mut Vec<String>,
) -> Result<Option<YamlDocument>> {
    match load_document(root, rel_path) {
        Ok(document) => Ok(Some(document)),
        Err(confsync_content::Error::Parse { path, message }) => {
            warnings.push(format!("{}: {}", path, message));
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Expanded form of an item and the values derived from it.
#[derive(Debug, Clone)]
pub(crate) struct Expansion {
    pub expanded: Option<Value>,
    pub name: Option<String>,
    pub fingerprint: String,
}

pub(crate) fn expand_item(
    root: &ConfigRoot,
    options: ExpandOptions,
    value: &Value,
    base: &str,
    exclude: &[&str],
    warnings: &mut Vec<String>,
) -> Expansion {
    let expanded = Expander::new(root, options).expand(value, base, warnings);
    Expansion {
        name: expanded.as_ref().and_then(item_name),
        fingerprint: fingerprint(expanded.as_ref(), exclude),
        expanded,
    }
}

/// Expansion options for a domain's items.
pub(crate) fn expand_options(spec: &DomainSpec) -> ExpandOptions {
    ExpandOptions::templates_only().with_platform_includes(spec.platform_includes)
}

/// Items of a list-shaped file.
#[derive(Debug, Default)]
pub struct ListFile {
    pub items: Vec<ModuleItem>,
    /// Whether identities were written into the items
    pub injected: bool,
}

/// Assign identities to `entries` and build their items.
///
/// Entries lacking an identity get one (alias-derived for automations,
/// positional otherwise); it is written back into the entry when the domain
/// stores identities. `used_ids` collects every identity seen.
pub(crate) fn parse_list_items(
    root: &ConfigRoot,
    spec: &DomainSpec,
    entries: &mut [Value],
    lines: Option<&[usize]>,
    rel_path: &str,
    used_ids: &mut HashSet<String>,
    warnings: &mut Vec<String>,
) -> ListFile {
    let mut parsed = ListFile::default();
    for (idx, entry) in entries.iter_mut().enumerate() {
        if !entry.is_mapping() {
            warnings.push(format!("{} item {} is not a map.", rel_path, idx + 1));
            continue;
        }
        let line = lines.and_then(|lines| lines.get(idx).copied());
        let id = match explicit_id(entry, spec.id_field) {
            Some(id) => id,
            None => {
                let id = generated_id(spec, entry, rel_path, line, idx, used_ids);
                if let (Some(field), true, Value::Mapping(map)) = (spec.id_field, spec.auto_id, &mut *entry) {
                    map.insert(Value::String(field.to_string()), Value::String(id.clone()));
                    parsed.injected = true;
                }
                id
            }
        };
        used_ids.insert(id.clone());

        let expansion = expand_item(
            root,
            ExpandOptions::templates_only(),
            entry,
            rel_path,
            spec.exclude_keys(),
            warnings,
        );
        parsed.items.push(ModuleItem {
            id,
            data: entry.clone(),
            source: rel_path.to_string(),
            order: idx,
            name: expansion.name,
            fingerprint: expansion.fingerprint,
            helper_type: None,
            expanded: expansion.expanded,
            line,
        });
    }
    parsed
}

/// Identity for an entry that has none.
pub(crate) fn generated_id(
    spec: &DomainSpec,
    entry: &Value,
    rel_path: &str,
    line: Option<usize>,
    index: usize,
    used_ids: &HashSet<String>,
) -> String {
    if spec.uses_alias_ids() {
        let candidate = alias_id(entry).unwrap_or_else(|| synthetic_id(rel_path, line, index));
        return ensure_unique(&candidate, used_ids);
    }
    let candidate = synthetic_id(rel_path, line, index);
    match spec.kind {
        DomainKind::ViewList => sanitize_view_path(&candidate),
        _ => candidate,
    }
}

/// Parse a list-shaped module or domain file.
pub fn parse_list_file(
    root: &ConfigRoot,
    spec: &DomainSpec,
    rel_path: &str,
    used_ids: &mut HashSet<String>,
    warnings: &mut Vec<String>,
) -> Result<Option<ListFile>> {
    let Some(YamlDocument { data, item_lines, .. }) = load_or_warn(root, rel_path, warnings)? else {
        return Ok(None);
    };
    let mut entries = match data {
        Value::Null => Vec::new(),
        Value::Sequence(entries) => entries,
        _ => {
            warnings.push(format!("{} is not a list of items.", rel_path));
            return Ok(None);
        }
    };
    Ok(Some(parse_list_items(
        root,
        spec,
        &mut entries,
        item_lines.as_deref(),
        rel_path,
        used_ids,
        warnings,
    )))
}

/// Explicit identities in every parseable list-shaped file of `rel_paths`.
pub(crate) fn explicit_ids_in(
    root: &ConfigRoot,
    spec: &DomainSpec,
    rel_paths: &[String],
) -> Result<HashSet<String>> {
    let mut ids = HashSet::new();
    for rel_path in rel_paths {
        let data = match load_document(root, rel_path) {
            Ok(document) => document.data,
            Err(confsync_content::Error::Parse { .. }) => continue,
            Err(e) => return Err(e.into()),
        };
        if let Value::Sequence(entries) = data {
            ids.extend(entries.iter().filter_map(|entry| explicit_id(entry, spec.id_field)));
        }
    }
    Ok(ids)
}

/// Parse a keyed module or domain file.
pub fn parse_keyed_file(
    root: &ConfigRoot,
    spec: &DomainSpec,
    rel_path: &str,
    warnings: &mut Vec<String>,
) -> Result<Option<Vec<ModuleItem>>> {
    let Some(document) = load_or_warn(root, rel_path, warnings)? else {
        return Ok(None);
    };
    let map = match document.data {
        Value::Null => Mapping::new(),
        Value::Mapping(map) => map,
        _ => {
            warnings.push(format!("{} is not a map.", rel_path));
            return Ok(None);
        }
    };
    let options = expand_options(spec);
    let items = map
        .iter()
        .enumerate()
        .map(|(idx, (key, value))| {
            keyed_item(root, options, scalar_string(key), value, rel_path, idx, None, warnings)
        })
        .collect();
    Ok(Some(items))
}

#[allow(clippy::too_many_arguments)]
fn keyed_item(
    root: &ConfigRoot,
    options: ExpandOptions,
    id: String,
    value: &Value,
    rel_path: &str,
    order: usize,
    helper_type: Option<&'static str>,
    warnings: &mut Vec<String>,
) -> ModuleItem {
    let expansion = expand_item(root, options, value, rel_path, &[], warnings);
    ModuleItem {
        id,
        data: value.clone(),
        source: rel_path.to_string(),
        order,
        name: expansion.name,
        fingerprint: expansion.fingerprint,
        helper_type,
        expanded: expansion.expanded,
        line: None,
    }
}

/// How a view file lays out its views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewShape {
    /// A bare list of views
    List,
    /// `{views: [...], ...meta}`
    Map,
}

/// A view file split into its parts.
#[derive(Debug, Clone)]
pub struct ViewLayout {
    pub shape: ViewShape,
    /// `None` when a map-shaped file's `views` is not a list
    pub views: Option<Vec<Value>>,
    pub meta: Mapping,
}

impl ViewLayout {
    /// Reassemble the file payload in its original shape.
    pub fn payload(shape: ViewShape, views: Vec<Value>, meta: Mapping) -> Value {
        match shape {
            ViewShape::List => Value::Sequence(views),
            ViewShape::Map => Value::Mapping(views_with_meta(views, meta)),
        }
    }
}

/// `{views, ...meta}` with `views` first.
pub(crate) fn views_with_meta(views: Vec<Value>, meta: Mapping) -> Mapping {
    let mut payload = Mapping::new();
    payload.insert(Value::String("views".to_string()), Value::Sequence(views));
    for (key, value) in meta {
        payload.insert(key, value);
    }
    payload
}

/// Split view-file data. `null` is an empty list; non-list, non-map data is
/// rejected.
pub fn split_views(data: Value, null_shape: ViewShape) -> Option<ViewLayout> {
    match data {
        Value::Null => Some(ViewLayout {
            shape: null_shape,
            views: Some(Vec::new()),
            meta: Mapping::new(),
        }),
        Value::Sequence(views) => Some(ViewLayout {
            shape: ViewShape::List,
            views: Some(views),
            meta: Mapping::new(),
        }),
        Value::Mapping(map) => {
            let mut views = Some(Vec::new());
            let mut meta = Mapping::new();
            for (key, value) in map {
                if key.as_str() != Some("views") {
                    meta.insert(key, value);
                    continue;
                }
                views = match value {
                    Value::Null => Some(Vec::new()),
                    Value::Sequence(views) => Some(views),
                    _ => None,
                };
            }
            Some(ViewLayout {
                shape: ViewShape::Map,
                views,
                meta,
            })
        }
        _ => None,
    }
}

/// Items of a view file.
#[derive(Debug)]
pub struct ViewFile {
    pub shape: ViewShape,
    pub views: Vec<ModuleItem>,
    pub meta: Mapping,
    pub injected: bool,
}

/// Parse a view module file (list- or map-shaped).
pub fn parse_view_file(
    root: &ConfigRoot,
    spec: &DomainSpec,
    rel_path: &str,
    warnings: &mut Vec<String>,
) -> Result<Option<ViewFile>> {
    parse_views(root, spec, rel_path, ViewShape::List, warnings)
}

/// Parse the dashboard domain file, which must be map-shaped.
pub fn parse_view_domain(
    root: &ConfigRoot,
    spec: &DomainSpec,
    warnings: &mut Vec<String>,
) -> Result<Option<ViewFile>> {
    let parsed = parse_views(root, spec, spec.domain_file, ViewShape::Map, warnings)?;
    match parsed {
        Some(file) if file.shape == ViewShape::List => {
            warnings.push(format!("{} is not a map.", spec.domain_file));
            Ok(None)
        }
        other => Ok(other),
    }
}

fn parse_views(
    root: &ConfigRoot,
    spec: &DomainSpec,
    rel_path: &str,
    null_shape: ViewShape,
    warnings: &mut Vec<String>,
) -> Result<Option<ViewFile>> {
    let Some(YamlDocument { data, item_lines, .. }) = load_or_warn(root, rel_path, warnings)? else {
        return Ok(None);
    };
    let Some(layout) = split_views(data, null_shape) else {
        warnings.push(format!("{} is not a list or map.", rel_path));
        return Ok(None);
    };
    let mut views = layout.views.unwrap_or_else(|| {
        warnings.push(format!("{} views is not a list.", rel_path));
        Vec::new()
    });
    let lines = match layout.shape {
        ViewShape::List => item_lines,
        ViewShape::Map => None,
    };
    let mut used_ids = HashSet::new();
    let parsed = parse_list_items(
        root,
        spec,
        &mut views,
        lines.as_deref(),
        rel_path,
        &mut used_ids,
        warnings,
    );
    Ok(Some(ViewFile {
        shape: layout.shape,
        views: parsed.items,
        meta: layout.meta,
        injected: parsed.injected,
    }))
}

/// Parse a helper bundle `{helper_type: {key: value}}`.
///
/// Unknown helper types are ignored.
pub fn parse_helpers_file(
    root: &ConfigRoot,
    rel_path: &str,
    warnings: &mut Vec<String>,
) -> Result<Option<Vec<ModuleItem>>> {
    let Some(document) = load_or_warn(root, rel_path, warnings)? else {
        return Ok(None);
    };
    let map = match document.data {
        Value::Null => Mapping::new(),
        Value::Mapping(map) => map,
        _ => {
            warnings.push(format!("{} is not a map.", rel_path));
            return Ok(None);
        }
    };
    let options = ExpandOptions::templates_only();
    let mut items = Vec::new();
    for (type_key, values) in &map {
        let Some(helper) = type_key.as_str().and_then(helper_type) else {
            continue;
        };
        let Value::Mapping(values) = values else {
            warnings.push(format!("{} {} is not a map.", rel_path, helper));
            continue;
        };
        for (idx, (key, value)) in values.iter().enumerate() {
            items.push(keyed_item(
                root,
                options,
                scalar_string(key),
                value,
                rel_path,
                idx,
                Some(helper),
                warnings,
            ));
        }
    }
    Ok(Some(items))
}

/// Parse the domain file of one helper type. Unreadable files yield no items.
pub fn parse_helper_domain(
    root: &ConfigRoot,
    helper: &'static str,
    warnings: &mut Vec<String>,
) -> Result<Vec<ModuleItem>> {
    let rel_path = helper_domain_file(helper);
    let Some(document) = load_or_warn(root, &rel_path, warnings)? else {
        return Ok(Vec::new());
    };
    let map = match document.data {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(map) => map,
        _ => {
            warnings.push(format!("{} is not a map.", rel_path));
            return Ok(Vec::new());
        }
    };
    let options = ExpandOptions::templates_only();
    Ok(map
        .iter()
        .enumerate()
        .map(|(idx, (key, value))| {
            keyed_item(root, options, scalar_string(key), value, &rel_path, idx, Some(helper), warnings)
        })
        .collect())
}
