//! Item-level operations on module files

use std::collections::BTreeMap;

use confsync_content::{load_document, render};
use confsync_fs::ConfigPath;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use super::context::{FileKind, ensure_yaml_filename, module_file_context, resolve_module_path};
use super::edit::{
    DetachedItem, ITEM_NOT_FOUND, as_list, as_map, as_views, find_key, item_fingerprint, list_items,
    load_data, select_list_item, without_key,
};
use super::selector::{ItemOperation, ItemRef, ItemSelector, MoveTarget};
use crate::engine::{SyncEngine, Writer};
use crate::identity::{alias_id, ensure_unique, explicit_id, synthetic_id};
use crate::item::ModuleItem;
use crate::parse::{
    ViewLayout, ViewShape, load_or_warn, parse_helpers_file, parse_keyed_file, parse_list_file,
    parse_view_file,
};
use crate::registry::{helper_domain_file, helper_type};
use crate::report::{ItemList, ItemSaved, ItemSummary, ItemText, OperationReport};
use crate::{Error, Result};

const UNASSIGNED_PACKAGE: &str = "unassigned";

fn summaries(items: Vec<ModuleItem>, selector: impl Fn(&ModuleItem) -> ItemSelector) -> Vec<ItemSummary> {
    items
        .into_iter()
        .map(|item| ItemSummary {
            selector: selector(&item),
            id: item.id,
            name: item.name,
            fingerprint: item.fingerprint,
            helper_type: item.helper_type.map(str::to_string),
        })
        .collect()
}

fn parse_item_yaml(content: &str) -> Result<Value> {
    let data: Value =
        serde_yaml::from_str(content).map_err(|e| Error::invalid(format!("Invalid YAML: {}", e)))?;
    if data.is_null() {
        return Err(Error::invalid("YAML content is empty."));
    }
    Ok(data)
}

/// A source file's post-removal payload and the items taken out of it.
struct SourceEdit {
    kind: FileKind,
    payload: Value,
    removed: Vec<(ItemSelector, DetachedItem)>,
}

impl SyncEngine {
    /// Items of one module file, with selectors that address them.
    ///
    /// Unreadable files list no items; the reason is in the warnings.
    pub fn list_module_items(&self, rel_path: &str) -> Result<ItemList> {
        let root = self.root();
        let rel_path = resolve_module_path(rel_path)?;
        let kind = module_file_context(&rel_path)?;
        let mut warnings = Vec::new();
        let items = match kind {
            FileKind::List(spec) => parse_list_file(root, spec, &rel_path, &mut Default::default(), &mut warnings)?
                .map(|file| {
                    summaries(file.items, |item| ItemSelector::ListId {
                        id: Some(item.id.clone()),
                        fingerprint: Some(item.fingerprint.clone()),
                    })
                }),
            FileKind::Mapping(spec) => parse_keyed_file(root, spec, &rel_path, &mut warnings)?.map(|items| {
                summaries(items, |item| ItemSelector::MapKey { key: item.id.clone() })
            }),
            FileKind::Lovelace(spec) => parse_view_file(root, spec, &rel_path, &mut warnings)?.map(|file| {
                summaries(file.views, |item| ItemSelector::LovelaceView {
                    id: Some(item.id.clone()),
                    fingerprint: Some(item.fingerprint.clone()),
                })
            }),
            FileKind::Helpers => parse_helpers_file(root, &rel_path, &mut warnings)?.map(|items| {
                summaries(items, |item| ItemSelector::Helper {
                    helper_type: item.helper_type.unwrap_or_default().to_string(),
                    key: item.id.clone(),
                })
            }),
        };
        Ok(ItemList {
            path: rel_path,
            file_kind: kind.as_str().to_string(),
            items: items.unwrap_or_default(),
            warnings,
        })
    }

    /// One item rendered as YAML.
    pub fn read_module_item(&self, rel_path: &str, selector: &ItemSelector) -> Result<ItemText> {
        let root = self.root();
        let rel_path = resolve_module_path(rel_path)?;
        let kind = module_file_context(&rel_path)?;
        let document = load_document(root, &rel_path)?;
        let value = match kind {
            FileKind::List(spec) => {
                let entries = as_list(document.data, "Module file is not a valid list.")?;
                let items = list_items(root, spec, &rel_path, &entries, document.item_lines.as_deref(), &mut Vec::new());
                entries[select_list_item(&items, selector)?].clone()
            }
            FileKind::Mapping(_) => {
                let map = as_map(document.data, "Module file is not a valid map.")?;
                let key = selector.map_key()?;
                let found = find_key(&map, key).ok_or_else(|| Error::not_found(ITEM_NOT_FOUND))?;
                map.get(&found).cloned().unwrap_or(Value::Null)
            }
            FileKind::Helpers => {
                let map = as_map(document.data, "Module file is not a valid helpers map.")?;
                let (helper, key) = selector.helper_parts()?;
                map.get(helper)
                    .and_then(Value::as_mapping)
                    .and_then(|values| find_key(values, key).and_then(|found| values.get(&found).cloned()))
                    .ok_or_else(|| Error::not_found(ITEM_NOT_FOUND))?
            }
            FileKind::Lovelace(spec) => {
                let (shape, views, _) = as_views(document.data, "Module file is not a valid lovelace module.")?;
                let lines = match shape {
                    ViewShape::List => document.item_lines,
                    ViewShape::Map => None,
                };
                let items = list_items(root, spec, &rel_path, &views, lines.as_deref(), &mut Vec::new());
                views[select_list_item(&items, selector)?].clone()
            }
        };
        Ok(ItemText {
            path: rel_path,
            file_kind: kind.as_str().to_string(),
            selector: selector.clone(),
            yaml: render(&value)?,
        })
    }

    /// Replace one item with `content`, parsed as YAML.
    ///
    /// Automations written without an id get one derived from their alias;
    /// views written without a path keep the selected one.
    pub fn write_module_item(&self, rel_path: &str, selector: &ItemSelector, content: &str) -> Result<ItemSaved> {
        let root = self.root();
        let rel_path = resolve_module_path(rel_path)?;
        let kind = module_file_context(&rel_path)?;
        let mut item = parse_item_yaml(content)?;
        let document = load_document(root, &rel_path)?;

        let payload = match kind {
            FileKind::List(spec) => {
                if !item.is_mapping() {
                    return Err(Error::invalid("List items must be YAML maps."));
                }
                let mut entries = as_list(document.data, "Module file is not a list.")?;
                let items = list_items(root, spec, &rel_path, &entries, document.item_lines.as_deref(), &mut Vec::new());
                let index = select_list_item(&items, selector)?;
                if let Some(field) = spec.id_field.filter(|_| spec.uses_alias_ids())
                    && explicit_id(&item, Some(field)).is_none()
                {
                    let candidate = alias_id(&item).unwrap_or_else(|| synthetic_id(&rel_path, None, index));
                    let used = items
                        .iter()
                        .filter(|other| other.order != index)
                        .map(|other| other.id.clone())
                        .collect();
                    if let Value::Mapping(map) = &mut item {
                        map.insert(
                            Value::String(field.to_string()),
                            Value::String(ensure_unique(&candidate, &used)),
                        );
                    }
                }
                entries[index] = item.clone();
                Value::Sequence(entries)
            }
            FileKind::Mapping(_) => {
                if !item.is_mapping() {
                    return Err(Error::invalid("Map items must be YAML maps."));
                }
                let mut map = as_map(document.data, "Module file is not a map.")?;
                let key = selector.map_key()?;
                let found = find_key(&map, key).ok_or_else(|| Error::not_found(ITEM_NOT_FOUND))?;
                map.insert(found, item.clone());
                Value::Mapping(map)
            }
            FileKind::Helpers => {
                if !item.is_mapping() {
                    return Err(Error::invalid("Helper items must be YAML maps."));
                }
                let mut map = as_map(document.data, "Module file is not a helpers map.")?;
                let (kind_name, key) = selector.helper_parts()?;
                let helper = helper_type(kind_name).ok_or_else(|| Error::invalid("Unsupported helper type."))?;
                match map.get(helper) {
                    None | Some(Value::Null) => return Err(Error::not_found(ITEM_NOT_FOUND)),
                    Some(Value::Mapping(_)) => {}
                    Some(_) => return Err(Error::invalid("Helper type is not a map.")),
                }
                let Some(Value::Mapping(values)) = map.get_mut(helper) else {
                    return Err(Error::not_found(ITEM_NOT_FOUND));
                };
                let found = find_key(values, key).ok_or_else(|| Error::not_found(ITEM_NOT_FOUND))?;
                values.insert(found, item.clone());
                Value::Mapping(map)
            }
            FileKind::Lovelace(spec) => {
                if !item.is_mapping() {
                    return Err(Error::invalid("Lovelace views must be YAML maps."));
                }
                let (shape, mut views, meta) = as_views(document.data, "Module file is not a valid lovelace module.")?;
                let lines = match shape {
                    ViewShape::List => document.item_lines,
                    ViewShape::Map => None,
                };
                let items = list_items(root, spec, &rel_path, &views, lines.as_deref(), &mut Vec::new());
                let index = select_list_item(&items, selector)?;
                let selected_id = selector.list_parts().and_then(|(id, _)| id);
                if let (Some(field), Some(id)) = (spec.id_field, selected_id)
                    && explicit_id(&item, Some(field)).is_none()
                    && let Value::Mapping(map) = &mut item
                {
                    map.insert(Value::String(field.to_string()), Value::String(id.to_string()));
                }
                views[index] = item.clone();
                ViewLayout::payload(shape, views, meta)
            }
        };

        Writer::new(root, false).write_yaml(&rel_path, &payload)?;
        info!(path = %rel_path, selector = %selector.describe(), "saved module item");
        Ok(ItemSaved {
            status: "saved".to_string(),
            path: rel_path,
            file_kind: kind.as_str().to_string(),
            selector: selector.clone(),
            fingerprint: item_fingerprint(kind, &item),
        })
    }

    /// Move, unassign or delete items, then run a [`sync`](Self::sync).
    ///
    /// Every selection and destination is checked before any file is
    /// written.
    pub fn operate_module_items(&self, operation: &ItemOperation, items: &[ItemRef]) -> Result<OperationReport> {
        if items.is_empty() {
            return Err(Error::invalid("At least one item is required."));
        }
        let root = self.root();
        let mut warnings = Vec::new();

        // Selectors grouped by normalized source path, in first-seen order
        let mut sources: Vec<(String, Vec<&ItemSelector>)> = Vec::new();
        for item in items {
            if item.path.trim().is_empty() {
                return Err(Error::invalid("Item path is required."));
            }
            let rel_path = resolve_module_path(&item.path)?;
            match sources.iter_mut().find(|(path, _)| *path == rel_path) {
                Some((_, selectors)) if selectors.contains(&&item.selector) => {}
                Some((_, selectors)) => selectors.push(&item.selector),
                None => sources.push((rel_path, vec![&item.selector])),
            }
        }

        let mut edits: Vec<(String, SourceEdit)> = Vec::with_capacity(sources.len());
        for (rel_path, selectors) in &sources {
            let kind = module_file_context(rel_path)?;
            let removal = kind.remove_items(root, rel_path, selectors, false, &mut warnings)?;
            let removed = selectors
                .iter()
                .map(|selector| (*selector).clone())
                .zip(removal.removed)
                .collect();
            edits.push((
                rel_path.clone(),
                SourceEdit {
                    kind,
                    payload: removal.payload,
                    removed,
                },
            ));
        }

        let mut pending: BTreeMap<String, (Value, bool)> = BTreeMap::new();
        match operation {
            ItemOperation::Delete => {
                for (_, edit) in &edits {
                    let selectors: Vec<&ItemSelector> = edit.removed.iter().map(|(selector, _)| selector).collect();
                    self.remove_from_domain(edit.kind, &selectors, &mut pending, &mut warnings)?;
                }
            }
            ItemOperation::Unassign | ItemOperation::Move(_) => {
                let mut destinations: Vec<(String, FileKind, Vec<DetachedItem>)> = Vec::new();
                for (rel_path, edit) in &edits {
                    let destination = self.destination(operation, edit.kind)?;
                    if destination == *rel_path {
                        return Err(Error::invalid("Destination matches the source file."));
                    }
                    let detached = edit.removed.iter().map(|(_, item)| item.clone());
                    match destinations.iter_mut().find(|(path, _, _)| *path == destination) {
                        Some((_, kind, _)) if *kind != edit.kind => {
                            return Err(Error::invalid("Destination cannot mix different module types."));
                        }
                        Some((_, _, moved)) => moved.extend(detached),
                        None => destinations.push((destination, edit.kind, detached.collect())),
                    }
                }
                for (destination, kind, moved) in &destinations {
                    let data = load_data(root, destination)?;
                    let payload = kind.append_items(destination, data, moved)?;
                    pending.insert(destination.clone(), (payload, false));
                }
            }
        }

        let mut writer = Writer::new(root, false);
        let mut changed_files = Vec::new();
        for (rel_path, edit) in &edits {
            if writer.write_yaml(rel_path, &edit.payload)? {
                changed_files.push(rel_path.clone());
            }
        }
        for (rel_path, (payload, is_domain)) in &pending {
            let written = if *is_domain {
                writer.write_domain_yaml(rel_path, payload)?
            } else {
                writer.write_yaml(rel_path, payload)?
            };
            if written {
                changed_files.push(rel_path.clone());
            }
        }
        info!(
            operation = operation.name(),
            items = items.len(),
            files = changed_files.len(),
            "module items updated"
        );

        let synced = self.sync()?;
        warnings.extend(synced.warnings);
        changed_files.extend(synced.changed_files);
        changed_files.sort();
        changed_files.dedup();
        Ok(OperationReport {
            status: "ok".to_string(),
            changed_files,
            warnings,
        })
    }

    /// Module file that moved or unassigned items of `kind` go to.
    fn destination(&self, operation: &ItemOperation, kind: FileKind) -> Result<String> {
        let target = kind.target();
        let packages = ConfigPath::PackagesDir.as_str();
        match operation {
            ItemOperation::Unassign => Ok(target.unassigned_path()),
            ItemOperation::Move(MoveTarget::ExistingPackage { package_name }) => {
                let name = package_name_of(package_name)?;
                if !self.root().is_dir(&format!("{}/{}", packages, name)) {
                    return Err(Error::not_found("Package does not exist."));
                }
                Ok(format!("{}/{}/{}", packages, name, target.package_filename()))
            }
            ItemOperation::Move(MoveTarget::NewPackage { package_name }) => {
                let name = package_name_of(package_name)?;
                Ok(format!("{}/{}/{}", packages, name, target.package_filename()))
            }
            ItemOperation::Move(MoveTarget::OneOff { one_off_filename }) => {
                let filename = ensure_yaml_filename(one_off_filename)?;
                Ok(format!("{}/{}", target.module_dir(), filename))
            }
            ItemOperation::Delete => Err(Error::invalid("Delete has no destination.")),
        }
    }

    /// Queue removal of deleted items from their domain files.
    ///
    /// Items the domain file no longer holds are reported as warnings.
    fn remove_from_domain(
        &self,
        kind: FileKind,
        selectors: &[&ItemSelector],
        pending: &mut BTreeMap<String, (Value, bool)>,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let root = self.root();
        match kind {
            FileKind::List(spec) | FileKind::Lovelace(spec) => {
                let domain_file = spec.domain_file;
                let found: Vec<&ItemSelector> = selectors
                    .iter()
                    .copied()
                    .filter(|selector| {
                        let probe = kind.remove_items(root, domain_file, &[*selector], true, &mut Vec::new());
                        if probe.is_err() {
                            warnings.push(format!(
                                "{} {} not found in {}; left unchanged.",
                                spec.item_label(),
                                selector.describe(),
                                domain_file
                            ));
                        }
                        probe.is_ok()
                    })
                    .collect();
                if found.is_empty() {
                    return Ok(());
                }
                match kind.remove_items(root, domain_file, &found, true, warnings) {
                    Ok(removal) => {
                        pending.insert(domain_file.to_string(), (removal.payload, true));
                    }
                    Err(Error::NotFound(message) | Error::Ambiguous(message)) => {
                        warnings.push(format!("{}: {}", domain_file, message));
                    }
                    Err(e) => return Err(e),
                }
            }
            FileKind::Mapping(spec) => {
                let mut map = as_map(load_data(root, spec.domain_file)?, "Domain file is not a map.")?;
                let mut removed_any = false;
                for selector in selectors {
                    let key = selector.map_key()?;
                    match find_key(&map, key) {
                        Some(found) => {
                            map = without_key(map, &found);
                            removed_any = true;
                        }
                        None => warnings.push(format!(
                            "{} {} not found in {}; left unchanged.",
                            spec.item_label(),
                            key,
                            spec.domain_file
                        )),
                    }
                }
                if removed_any {
                    pending.insert(spec.domain_file.to_string(), (Value::Mapping(map), true));
                }
            }
            FileKind::Helpers => {
                for selector in selectors {
                    let (kind_name, key) = selector.helper_parts()?;
                    let Some(helper) = helper_type(kind_name) else {
                        continue;
                    };
                    let domain_file = helper_domain_file(helper);
                    let data = match pending.get(&domain_file) {
                        Some((payload, _)) => payload.clone(),
                        None => match load_or_warn(root, &domain_file, warnings)? {
                            Some(document) => document.data,
                            None => continue,
                        },
                    };
                    let map = match data {
                        Value::Null => Mapping::new(),
                        Value::Mapping(map) => map,
                        _ => {
                            warnings.push(format!("{} is not a map.", domain_file));
                            continue;
                        }
                    };
                    if let Some(found) = find_key(&map, key) {
                        let remaining = without_key(map, &found);
                        pending.insert(domain_file, (Value::Mapping(remaining), true));
                    }
                }
            }
        }
        debug!(target = kind.target().key(), "queued domain removals");
        Ok(())
    }
}

/// Validate a package name for a move destination.
fn package_name_of(raw: &str) -> Result<&str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::invalid("package_name is required."));
    }
    if name == UNASSIGNED_PACKAGE {
        return Err(Error::invalid("Package name 'unassigned' is reserved."));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::invalid("Package name must be a simple directory name."));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "package_name is required.")]
    #[case("   ", "package_name is required.")]
    #[case("unassigned", "Package name 'unassigned' is reserved.")]
    #[case("a/b", "Package name must be a simple directory name.")]
    #[case("..", "Package name must be a simple directory name.")]
    fn rejected_package_names(#[case] name: &str, #[case] message: &str) {
        let err = package_name_of(name).unwrap_err();
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn package_names_are_trimmed() {
        assert_eq!(package_name_of("  kitchen ").unwrap(), "kitchen");
    }

    #[test]
    fn item_yaml_must_not_be_empty() {
        assert_eq!(
            parse_item_yaml("   \n").unwrap_err().to_string(),
            "YAML content is empty."
        );
        assert!(parse_item_yaml("alias: x\n").unwrap().is_mapping());
    }
}
