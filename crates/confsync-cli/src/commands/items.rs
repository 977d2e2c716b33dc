//! Item-level commands on a single module file

use std::path::Path;

use colored::Colorize;

use confsync_core::items::{FileKind, module_file_context, resolve_module_path};
use confsync_core::{ItemOperation, ItemRef, ItemSelector, MoveTarget, OperationReport};

use super::Context;
use super::output::{print_changed, print_header, print_json, print_warnings};
use crate::cli::SelectorArgs;
use crate::error::{CliError, Result};

/// Turn selector flags into selectors for the kind of file at `path`.
///
/// Several `--id` or `--key` flags select several items.
fn selectors(path: &str, args: &SelectorArgs) -> Result<Vec<ItemSelector>> {
    let rel_path = resolve_module_path(path)?;
    let kind = module_file_context(&rel_path)?;
    let selectors = match kind {
        FileKind::List(_) | FileKind::Lovelace(_) => {
            let make = |id: Option<String>, fingerprint: Option<String>| match kind {
                FileKind::Lovelace(_) => ItemSelector::LovelaceView { id, fingerprint },
                _ => ItemSelector::ListId { id, fingerprint },
            };
            if args.ids.is_empty() {
                args.fingerprint
                    .clone()
                    .map(|fingerprint| vec![make(None, Some(fingerprint))])
                    .unwrap_or_default()
            } else {
                args.ids
                    .iter()
                    .map(|id| make(Some(id.clone()), args.fingerprint.clone()))
                    .collect()
            }
        }
        FileKind::Mapping(_) => args
            .keys
            .iter()
            .map(|key| ItemSelector::MapKey { key: key.clone() })
            .collect(),
        FileKind::Helpers => {
            let Some(helper_type) = &args.helper_type else {
                return Err(CliError::user("Helper files need --helper-type."));
            };
            args.keys
                .iter()
                .map(|key| ItemSelector::Helper {
                    helper_type: helper_type.clone(),
                    key: key.clone(),
                })
                .collect()
        }
    };
    if selectors.is_empty() {
        let hint = match kind {
            FileKind::List(_) | FileKind::Lovelace(_) => "--id or --fingerprint",
            FileKind::Mapping(_) | FileKind::Helpers => "--key",
        };
        return Err(CliError::user(format!("No item selected; pass {}.", hint)));
    }
    Ok(selectors)
}

fn single_selector(path: &str, args: &SelectorArgs) -> Result<ItemSelector> {
    let mut selected = selectors(path, args)?;
    if selected.len() > 1 {
        return Err(CliError::user("Select exactly one item."));
    }
    selected
        .pop()
        .ok_or_else(|| CliError::user("No item selected."))
}

fn operate(ctx: &Context, path: &str, args: &SelectorArgs, operation: ItemOperation) -> Result<()> {
    let refs: Vec<ItemRef> = selectors(path, args)?
        .into_iter()
        .map(|selector| ItemRef::new(path, selector))
        .collect();
    let _lock = ctx.lock()?;
    let report = ctx.engine.operate_module_items(&operation, &refs)?;
    print_operation(operation.name(), refs.len(), &report);
    Ok(())
}

fn print_operation(name: &str, count: usize, report: &OperationReport) {
    print_header(&format!("Applied {} to {} item(s)", name, count));
    print_changed(&report.changed_files);
    print_warnings(&report.warnings);
}

/// Run the items list command
pub fn run_items_list(ctx: &Context, path: &str, json: bool) -> Result<()> {
    let list = ctx.engine.list_module_items(path)?;
    if json {
        return print_json(&list);
    }
    print_header(&format!("{} ({})", list.path, list.file_kind));
    if list.items.is_empty() {
        println!("   No items.");
    }
    for item in &list.items {
        let label = match &item.helper_type {
            Some(helper_type) => format!("{}:{}", helper_type, item.id),
            None => item.id.clone(),
        };
        match &item.name {
            Some(name) => println!("   {} {} {}", label.bold(), name, item.fingerprint.dimmed()),
            None => println!("   {} {}", label.bold(), item.fingerprint.dimmed()),
        }
    }
    print_warnings(&list.warnings);
    Ok(())
}

/// Run the items show command
pub fn run_items_show(ctx: &Context, path: &str, selector: &SelectorArgs) -> Result<()> {
    let selector = single_selector(path, selector)?;
    let item = ctx.engine.read_module_item(path, &selector)?;
    print!("{}", item.yaml);
    Ok(())
}

/// Run the items write command
pub fn run_items_write(ctx: &Context, path: &str, selector: &SelectorArgs, from: &Path) -> Result<()> {
    let selector = single_selector(path, selector)?;
    let content = std::fs::read_to_string(from)?;
    let _lock = ctx.lock()?;
    let saved = ctx.engine.write_module_item(path, &selector, &content)?;
    println!(
        "{} Saved {} in {}",
        "OK".green().bold(),
        selector.describe().cyan(),
        saved.path
    );
    Ok(())
}

/// Run the items delete command
pub fn run_items_delete(ctx: &Context, path: &str, selector: &SelectorArgs) -> Result<()> {
    operate(ctx, path, selector, ItemOperation::Delete)
}

/// Run the items unassign command
pub fn run_items_unassign(ctx: &Context, path: &str, selector: &SelectorArgs) -> Result<()> {
    operate(ctx, path, selector, ItemOperation::Unassign)
}

/// Run the items move command
pub fn run_items_move(
    ctx: &Context,
    path: &str,
    selector: &SelectorArgs,
    package: Option<String>,
    new: bool,
    one_off: Option<String>,
) -> Result<()> {
    let target = match (package, one_off) {
        (Some(package_name), None) if new => MoveTarget::NewPackage { package_name },
        (Some(package_name), None) => MoveTarget::ExistingPackage { package_name },
        (None, Some(one_off_filename)) => MoveTarget::OneOff { one_off_filename },
        _ => return Err(CliError::user("Pass exactly one of --package or --one-off.")),
    };
    operate(ctx, path, selector, ItemOperation::Move(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(ids: &[&str], keys: &[&str], helper_type: Option<&str>) -> SelectorArgs {
        SelectorArgs {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            fingerprint: None,
            keys: keys.iter().map(|s| s.to_string()).collect(),
            helper_type: helper_type.map(str::to_string),
        }
    }

    #[test]
    fn list_files_select_by_id() {
        let selected = selectors("automations/a.yaml", &args(&["a", "b"], &[], None)).unwrap();
        assert_eq!(
            selected,
            vec![
                ItemSelector::ListId {
                    id: Some("a".into()),
                    fingerprint: None
                },
                ItemSelector::ListId {
                    id: Some("b".into()),
                    fingerprint: None
                },
            ]
        );
    }

    #[test]
    fn keyed_files_select_by_key() {
        let selected = selectors("packages/kitchen/script.yaml", &args(&[], &["reset"], None)).unwrap();
        assert_eq!(selected, vec![ItemSelector::MapKey { key: "reset".into() }]);
    }

    #[test]
    fn helper_files_need_a_type() {
        let err = selectors("packages/kitchen/helpers.yaml", &args(&[], &["guest"], None)).unwrap_err();
        assert!(err.to_string().contains("--helper-type"));

        let selected = selectors(
            "packages/kitchen/helpers.yaml",
            &args(&[], &["guest"], Some("input_boolean")),
        )
        .unwrap();
        assert_eq!(
            selected,
            vec![ItemSelector::Helper {
                helper_type: "input_boolean".into(),
                key: "guest".into()
            }]
        );
    }

    #[test]
    fn empty_selection_is_rejected() {
        let err = selectors("scripts/a.yaml", &args(&["ignored"], &[], None)).unwrap_err();
        assert!(err.to_string().contains("--key"));
    }
}
