//! Migration of legacy unassigned module files
//!
//! Items found only in a domain file are collected in the reserved
//! `packages/unassigned/` package. Older layouts kept them in
//! `<module_dir>/<module_dir>.unassigned.yaml`; such files are moved or merged
//! into the new location before module discovery.

use confsync_content::{load_document, render, scalar_string};
use confsync_fs::ConfigRoot;
use serde_yaml::Value;
use tracing::{info, warn};

use crate::items::context::FileKind;
use crate::items::edit::{DetachedItem, as_map, load_data};
use crate::parse::split_views;
use crate::registry::{Target, helper_type};
use crate::{Error, Result};

/// Make sure a target's unassigned file lives at its current path.
///
/// Returns the unassigned path. Nothing is migrated while previewing.
pub fn ensure_unassigned(
    root: &ConfigRoot,
    target: Target,
    preview: bool,
    warnings: &mut Vec<String>,
) -> Result<String> {
    let new_path = target.unassigned_path();
    let legacy_path = target.legacy_unassigned_path();
    if preview || legacy_path == new_path || !root.is_file(&legacy_path) {
        return Ok(new_path);
    }

    if !root.exists(&new_path) {
        root.rename(&legacy_path, &new_path)?;
        info!(from = %legacy_path, to = %new_path, "migrated legacy unassigned file");
        warnings.push(format!("Migrated {} to {}.", legacy_path, new_path));
        return Ok(new_path);
    }

    if let Err(e) = merge_legacy(root, target, &legacy_path, &new_path) {
        let message = format!(
            "Unable to merge legacy unassigned file {} into {}: {}",
            legacy_path, new_path, e
        );
        warn!("{}", message);
        warnings.push(message);
        return Ok(new_path);
    }
    root.remove(&legacy_path)?;
    info!(from = %legacy_path, to = %new_path, "merged legacy unassigned file");
    warnings.push(format!("Merged {} into {}.", legacy_path, new_path));
    Ok(new_path)
}

fn merge_legacy(root: &ConfigRoot, target: Target, legacy_path: &str, new_path: &str) -> Result<()> {
    let data = load_document(root, legacy_path)?.data;
    if data.is_null() {
        return Ok(());
    }
    let kind = FileKind::for_target(target);
    let items = legacy_items(kind, data)?;
    if items.is_empty() {
        return Ok(());
    }
    let merged = kind.append_items(new_path, load_data(root, new_path)?, &items)?;
    root.write(new_path, &render(&merged)?)?;
    Ok(())
}

fn legacy_items(kind: FileKind, data: Value) -> Result<Vec<DetachedItem>> {
    let detached = |data: Value| DetachedItem {
        id: String::new(),
        helper_type: None,
        data,
    };
    match kind {
        FileKind::Helpers => {
            let map = as_map(data, "Legacy unassigned helpers file is not a map.")?;
            let mut items = Vec::new();
            for (type_key, values) in map {
                let Some(helper) = type_key.as_str().and_then(helper_type) else {
                    continue;
                };
                let Value::Mapping(values) = values else {
                    return Err(Error::invalid(
                        "Legacy unassigned helpers file has non-map helper data.",
                    ));
                };
                items.extend(values.into_iter().map(|(key, data)| DetachedItem {
                    id: scalar_string(&key),
                    helper_type: Some(helper),
                    data,
                }));
            }
            Ok(items)
        }
        FileKind::Mapping(_) => {
            let map = as_map(data, "Legacy unassigned file is not a map.")?;
            Ok(map
                .into_iter()
                .map(|(key, data)| DetachedItem {
                    id: scalar_string(&key),
                    helper_type: None,
                    data,
                })
                .collect())
        }
        FileKind::Lovelace(_) => {
            let views = split_views(data, crate::parse::ViewShape::List)
                .and_then(|layout| layout.views)
                .ok_or_else(|| Error::invalid("Legacy unassigned lovelace file is not a list."))?;
            Ok(views.into_iter().filter(Value::is_mapping).map(detached).collect())
        }
        FileKind::List(_) => match data {
            Value::Sequence(entries) => {
                Ok(entries.into_iter().filter(Value::is_mapping).map(detached).collect())
            }
            _ => Err(Error::invalid("Legacy unassigned file is not a list.")),
        },
    }
}
