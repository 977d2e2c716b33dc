//! In-memory edits of module file payloads
//!
//! Removals and insertions work on parsed file data and return the new
//! payload; callers decide when to write. This lets a multi-file operation
//! validate everything before touching the disk.

use std::collections::HashSet;

use confsync_content::{fingerprint, load_document, scalar_string};
use confsync_fs::ConfigRoot;
use serde_yaml::{Mapping, Value};

use crate::identity::{alias_id, ensure_unique, explicit_id, sanitize_view_path, synthetic_id};
use crate::item::ModuleItem;
use crate::items::context::FileKind;
use crate::items::selector::ItemSelector;
use crate::parse::{ViewLayout, ViewShape, parse_list_items, split_views};
use crate::registry::{DomainKind, DomainSpec, helper_type};
use crate::{Error, Result};

pub(crate) const ITEM_NOT_FOUND: &str = "Item not found. Refresh the item list and try again.";
pub(crate) const ITEM_AMBIGUOUS: &str = "Item match is ambiguous. Refresh the item list and try again.";

/// An item taken out of a file, on its way somewhere else.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DetachedItem {
    pub id: String,
    pub helper_type: Option<&'static str>,
    pub data: Value,
}

/// Items removed from a file and the file's remaining payload.
#[derive(Debug)]
pub(crate) struct Removal {
    /// In selector order
    pub removed: Vec<DetachedItem>,
    pub payload: Value,
}

/// Parsed data of a file; `null` for missing or blank files.
pub(crate) fn load_data(root: &ConfigRoot, rel_path: &str) -> Result<Value> {
    Ok(load_document(root, rel_path)?.data)
}

pub(crate) fn as_list(data: Value, message: &str) -> Result<Vec<Value>> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(entries) => Ok(entries),
        _ => Err(Error::invalid(message)),
    }
}

pub(crate) fn as_map(data: Value, message: &str) -> Result<Mapping> {
    match data {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        _ => Err(Error::invalid(message)),
    }
}

/// Split dashboard data into shape, views and meta.
pub(crate) fn as_views(data: Value, message: &str) -> Result<(ViewShape, Vec<Value>, Mapping)> {
    let layout = split_views(data, ViewShape::List).ok_or_else(|| Error::invalid(message))?;
    let views = layout
        .views
        .ok_or_else(|| Error::invalid("Lovelace views are not a list."))?;
    Ok((layout.shape, views, layout.meta))
}

/// The map key whose text form is `key`.
pub(crate) fn find_key(map: &Mapping, key: &str) -> Option<Value> {
    map.keys().find(|candidate| scalar_string(candidate) == key).cloned()
}

/// `map` without `key`, order preserved.
pub(crate) fn without_key(map: Mapping, key: &Value) -> Mapping {
    map.into_iter().filter(|(candidate, _)| candidate != key).collect()
}

/// Items of list entries, with identities as the engine would assign them.
pub(crate) fn list_items(
    root: &ConfigRoot,
    spec: &DomainSpec,
    rel_path: &str,
    entries: &[Value],
    lines: Option<&[usize]>,
    warnings: &mut Vec<String>,
) -> Vec<ModuleItem> {
    let mut copy = entries.to_vec();
    parse_list_items(root, spec, &mut copy, lines, rel_path, &mut HashSet::new(), warnings).items
}

/// Index into the file's entries of the one item matching `selector`.
pub(crate) fn select_list_item(items: &[ModuleItem], selector: &ItemSelector) -> Result<usize> {
    let (id, fp) = selector
        .list_parts()
        .ok_or_else(|| Error::invalid("Selector type does not match the module file."))?;
    let matches: Vec<&ModuleItem> = items
        .iter()
        .filter(|item| id.is_none_or(|id| item.id == id))
        .filter(|item| fp.is_none_or(|fp| item.fingerprint == fp))
        .collect();
    single(&matches)
}

/// Like [`select_list_item`], falling back to the fingerprint alone.
pub(crate) fn select_list_item_flexible(
    items: &[ModuleItem],
    selector: &ItemSelector,
) -> Result<usize> {
    let strict = select_list_item(items, selector);
    if strict.is_ok() {
        return strict;
    }
    let Some((_, Some(fp))) = selector.list_parts() else {
        return Err(Error::not_found(ITEM_NOT_FOUND));
    };
    let matches: Vec<&ModuleItem> = items.iter().filter(|item| item.fingerprint == fp).collect();
    single(&matches)
}

fn single(matches: &[&ModuleItem]) -> Result<usize> {
    match matches {
        [item] => Ok(item.order),
        [] => Err(Error::not_found(ITEM_NOT_FOUND)),
        _ => Err(Error::Ambiguous(ITEM_AMBIGUOUS.to_string())),
    }
}

impl FileKind {
    /// Remove the selected items from `data`.
    ///
    /// With `fingerprint_fallback`, list and view selectors whose identity no
    /// longer matches may still select by fingerprint.
    pub(crate) fn remove_items(
        &self,
        root: &ConfigRoot,
        rel_path: &str,
        selectors: &[&ItemSelector],
        fingerprint_fallback: bool,
        warnings: &mut Vec<String>,
    ) -> Result<Removal> {
        let document = load_document(root, rel_path)?;
        match self {
            FileKind::List(spec) => {
                let entries = as_list(document.data, "Module file is not a list.")?;
                let lines = document.item_lines;
                let (removed, entries) = remove_entries(
                    root,
                    spec,
                    rel_path,
                    entries,
                    lines.as_deref(),
                    selectors,
                    fingerprint_fallback,
                    warnings,
                )?;
                Ok(Removal {
                    removed,
                    payload: Value::Sequence(entries),
                })
            }
            FileKind::Lovelace(spec) => {
                let (shape, views, meta) =
                    as_views(document.data, "Module file is not a valid lovelace module.")?;
                let lines = match shape {
                    ViewShape::List => document.item_lines,
                    ViewShape::Map => None,
                };
                let (removed, views) = remove_entries(
                    root,
                    spec,
                    rel_path,
                    views,
                    lines.as_deref(),
                    selectors,
                    fingerprint_fallback,
                    warnings,
                )?;
                Ok(Removal {
                    removed,
                    payload: ViewLayout::payload(shape, views, meta),
                })
            }
            FileKind::Mapping(_) => {
                let mut map = as_map(document.data, "Module file is not a map.")?;
                let mut removed = Vec::with_capacity(selectors.len());
                let mut keys = Vec::with_capacity(selectors.len());
                for selector in selectors {
                    let key = selector.map_key()?;
                    let found = find_key(&map, key).ok_or_else(|| Error::not_found(ITEM_NOT_FOUND))?;
                    removed.push(DetachedItem {
                        id: key.to_string(),
                        helper_type: None,
                        data: map.get(&found).cloned().unwrap_or(Value::Null),
                    });
                    keys.push(found);
                }
                for key in &keys {
                    map = without_key(map, key);
                }
                Ok(Removal {
                    removed,
                    payload: Value::Mapping(map),
                })
            }
            FileKind::Helpers => {
                let mut map = as_map(document.data, "Module file is not a helpers map.")?;
                let mut removed = Vec::with_capacity(selectors.len());
                for selector in selectors {
                    let (kind, key) = selector.helper_parts()?;
                    let helper = helper_type(kind).ok_or_else(|| Error::not_found(ITEM_NOT_FOUND))?;
                    let data = map
                        .get(helper)
                        .and_then(Value::as_mapping)
                        .and_then(|values| find_key(values, key).and_then(|k| values.get(&k).cloned()))
                        .ok_or_else(|| Error::not_found(ITEM_NOT_FOUND))?;
                    removed.push(DetachedItem {
                        id: key.to_string(),
                        helper_type: Some(helper),
                        data,
                    });
                }
                for item in &removed {
                    map = remove_helper(map, item.helper_type.unwrap_or_default(), &item.id);
                }
                Ok(Removal {
                    removed,
                    payload: Value::Mapping(map),
                })
            }
        }
    }

    /// Append `items` to `data`, assigning identities where the destination
    /// needs them.
    pub(crate) fn append_items(&self, rel_path: &str, data: Value, items: &[DetachedItem]) -> Result<Value> {
        match self {
            FileKind::List(spec) => {
                let mut entries = as_list(data, "Destination file is not a list.")?;
                append_entries(spec, rel_path, &mut entries, items)?;
                Ok(Value::Sequence(entries))
            }
            FileKind::Lovelace(spec) => {
                let (shape, mut views, meta) =
                    as_views(data, "Destination file is not a valid lovelace module.")?;
                append_entries(spec, rel_path, &mut views, items)?;
                Ok(ViewLayout::payload(shape, views, meta))
            }
            FileKind::Mapping(_) => {
                let mut map = as_map(data, "Destination file is not a map.")?;
                for item in items {
                    if find_key(&map, &item.id).is_some() {
                        return Err(Error::invalid(format!(
                            "Item key {} already exists in destination.",
                            item.id
                        )));
                    }
                    map.insert(Value::String(item.id.clone()), item.data.clone());
                }
                Ok(Value::Mapping(map))
            }
            FileKind::Helpers => {
                let mut map = as_map(data, "Destination file is not a helpers map.")?;
                for item in items {
                    let helper = item
                        .helper_type
                        .ok_or_else(|| Error::invalid("Unsupported helper type."))?;
                    let type_key = Value::String(helper.to_string());
                    if map.get(&type_key).is_none_or(Value::is_null) {
                        map.insert(type_key.clone(), Value::Mapping(Mapping::new()));
                    }
                    let Some(Value::Mapping(values)) = map.get_mut(&type_key) else {
                        return Err(Error::invalid("Helper type is not a map."));
                    };
                    if find_key(values, &item.id).is_some() {
                        return Err(Error::invalid(format!(
                            "Helper key {} already exists in destination.",
                            item.id
                        )));
                    }
                    values.insert(Value::String(item.id.clone()), item.data.clone());
                }
                Ok(Value::Mapping(map))
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn remove_entries(
    root: &ConfigRoot,
    spec: &DomainSpec,
    rel_path: &str,
    entries: Vec<Value>,
    lines: Option<&[usize]>,
    selectors: &[&ItemSelector],
    fingerprint_fallback: bool,
    warnings: &mut Vec<String>,
) -> Result<(Vec<DetachedItem>, Vec<Value>)> {
    let items = list_items(root, spec, rel_path, &entries, lines, warnings);
    let mut removed = Vec::with_capacity(selectors.len());
    let mut indices = HashSet::new();
    for selector in selectors {
        let index = if fingerprint_fallback {
            select_list_item_flexible(&items, selector)?
        } else {
            select_list_item(&items, selector)?
        };
        let id = items
            .iter()
            .find(|item| item.order == index)
            .map(|item| item.id.clone())
            .unwrap_or_default();
        removed.push(DetachedItem {
            id,
            helper_type: None,
            data: entries[index].clone(),
        });
        indices.insert(index);
    }
    let remaining = entries
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !indices.contains(idx))
        .map(|(_, entry)| entry)
        .collect();
    Ok((removed, remaining))
}

fn remove_helper(map: Mapping, helper: &str, key: &str) -> Mapping {
    map.into_iter()
        .filter_map(|(type_key, values)| {
            if type_key.as_str() != Some(helper) {
                return Some((type_key, values));
            }
            let Value::Mapping(values) = values else {
                return Some((type_key, values));
            };
            let remaining: Mapping = values
                .into_iter()
                .filter(|(candidate, _)| scalar_string(candidate) != key)
                .collect();
            (!remaining.is_empty()).then(|| (type_key, Value::Mapping(remaining)))
        })
        .collect()
}

fn append_entries(
    spec: &DomainSpec,
    rel_path: &str,
    entries: &mut Vec<Value>,
    items: &[DetachedItem],
) -> Result<()> {
    let mut used: HashSet<String> = entries
        .iter()
        .filter_map(|entry| explicit_id(entry, spec.id_field))
        .collect();
    let start = entries.len();
    for (idx, item) in items.iter().enumerate() {
        let prepared = prepare_list_item(spec, item.data.clone(), &mut used, rel_path, start + idx)?;
        entries.push(prepared);
    }
    Ok(())
}

/// Give a list entry an identity that is unique in its destination.
///
/// # Errors
///
/// Fails when the entry's explicit identity is already taken.
pub(crate) fn prepare_list_item(
    spec: &DomainSpec,
    mut data: Value,
    used: &mut HashSet<String>,
    rel_path: &str,
    index: usize,
) -> Result<Value> {
    let Some(field) = spec.id_field else {
        return Ok(data);
    };
    let id = match explicit_id(&data, Some(field)) {
        Some(id) if used.contains(&id) => {
            return Err(Error::invalid(format!(
                "{} id {} already exists in destination.",
                spec.key, id
            )));
        }
        Some(id) => Some(id),
        None if spec.auto_id => {
            let candidate = spec
                .uses_alias_ids()
                .then(|| alias_id(&data))
                .flatten()
                .unwrap_or_else(|| {
                    let positional = synthetic_id(rel_path, None, index);
                    match spec.kind {
                        DomainKind::ViewList => sanitize_view_path(&positional),
                        _ => positional,
                    }
                });
            let id = ensure_unique(&candidate, used);
            if let Value::Mapping(map) = &mut data {
                map.insert(Value::String(field.to_string()), Value::String(id.clone()));
            }
            Some(id)
        }
        None => None,
    };
    if let Some(id) = id {
        used.insert(id);
    }
    Ok(data)
}

/// Fingerprint of an edited item as it would be listed.
pub(crate) fn item_fingerprint(kind: FileKind, data: &Value) -> String {
    let exclude: &[&str] = match kind {
        FileKind::List(spec) | FileKind::Lovelace(spec) => spec.exclude_keys(),
        _ => &[],
    };
    fingerprint(Some(data), exclude)
}
