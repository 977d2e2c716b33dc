//! Operator scenarios: UI-created items, identity rewrites by Home
//! Assistant and item moves between module files.

use confsync_core::{Error, ItemOperation, ItemRef, ItemSelector, SyncEngine};
use confsync_test_utils::ConfigTree;
use serde_yaml::Value;

fn ids(tree: &ConfigTree, rel_path: &str) -> Vec<String> {
    tree.load_yaml(rel_path)
        .as_sequence()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn test_wake_up_scenario() {
    let tree = ConfigTree::new();
    tree.write(
        "packages/wakeup/automation.yaml",
        "- alias: Wake up\n  trigger: []\n  action: []\n",
    );
    tree.write("automations.yaml", "- alias: UI only\n  trigger: []\n  action: []\n");
    let engine = SyncEngine::open(tree.path()).unwrap();

    engine.sync().unwrap();

    assert_eq!(ids(&tree, "packages/wakeup/automation.yaml"), vec!["wake_up"]);
    assert_eq!(ids(&tree, "packages/unassigned/automation.yaml"), vec!["ui_only"]);
    assert_eq!(ids(&tree, "automations.yaml"), vec!["ui_only", "wake_up"]);

    let mapping = tree.load_yaml(".gitops/mappings/automation.yaml");
    let entries = mapping["entries"].as_sequence().map(Vec::len);
    assert_eq!(entries, Some(2));
    assert_eq!(
        mapping["unassigned_path"],
        Value::String("packages/unassigned/automation.yaml".into())
    );

    let again = engine.sync().unwrap();
    assert!(again.is_clean(), "second sync changed {:?}", again.changed_files);
}

#[test]
fn test_reconcile_after_home_assistant_rewrites_ids() {
    let tree = ConfigTree::new();
    tree.write(
        "packages/bedroom/automation.yaml",
        "- id: morning\n  alias: Morning\n  trigger: []\n  action: []\n",
    );
    let engine = SyncEngine::open(tree.path()).unwrap();
    engine.sync().unwrap();

    let rewritten = tree.read("automations.yaml").replace("id: morning", "id: '1700000000009'");
    tree.write("automations.yaml", &rewritten);
    let report = engine.reconcile_automation_ids().unwrap();

    assert_eq!(report.status, "reconciled");
    assert_eq!(report.changed_files, vec!["packages/bedroom/automation.yaml"]);
    assert_eq!(ids(&tree, "packages/bedroom/automation.yaml"), vec!["1700000000009"]);

    let after = engine.sync().unwrap();
    assert!(after.is_clean(), "sync after reconcile changed {:?}", after.changed_files);
    tree.assert_file_not_exists("packages/unassigned/automation.yaml");
}

#[test]
fn test_ambiguous_fingerprints_are_left_alone() {
    let tree = ConfigTree::new();
    tree.write(
        "packages/bedroom/automation.yaml",
        "- id: one\n  alias: Same\n  trigger: []\n  action: []\n",
    );
    tree.write(
        "automations.yaml",
        "- id: '1'\n  alias: Same\n  trigger: []\n  action: []\n- id: '2'\n  alias: Same\n  trigger: []\n  action: []\n",
    );
    let engine = SyncEngine::open(tree.path()).unwrap();

    let report = engine.reconcile_automation_ids().unwrap();

    assert_eq!(report.status, "no_changes");
    assert!(report.warnings.iter().any(|w| w.starts_with("Ambiguous automation ID reconciliation")));
    assert_eq!(ids(&tree, "packages/bedroom/automation.yaml"), vec!["one"]);
}

#[test]
fn test_unassign_moves_item_into_bundle() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/script.yaml", "kitchen_off:\n  sequence: []\nkitchen_on:\n  sequence: []\n");
    let engine = SyncEngine::open(tree.path()).unwrap();
    engine.sync().unwrap();

    let selector = ItemSelector::MapKey { key: "kitchen_on".into() };
    engine
        .operate_module_items(
            &ItemOperation::Unassign,
            &[ItemRef::new("packages/kitchen/script.yaml", selector)],
        )
        .unwrap();

    tree.assert_file_contains("packages/unassigned/script.yaml", "kitchen_on:");
    assert!(!tree.read("packages/kitchen/script.yaml").contains("kitchen_on"));
    tree.assert_file_contains("scripts.yaml", "kitchen_on:");
    tree.assert_file_contains(".gitops/mappings/script.yaml", "packages/unassigned/script.yaml");
}

#[test]
fn test_deleting_last_helper_removes_domain_file() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/helpers.yaml", "input_boolean:\n  guest:\n    name: Guest\n");
    let engine = SyncEngine::open(tree.path()).unwrap();
    engine.sync().unwrap();
    tree.assert_file_exists("input_boolean.yaml");

    let selector = ItemSelector::Helper {
        helper_type: "input_boolean".into(),
        key: "guest".into(),
    };
    let report = engine
        .operate_module_items(
            &ItemOperation::Delete,
            &[ItemRef::new("packages/kitchen/helpers.yaml", selector)],
        )
        .unwrap();

    assert!(report.changed_files.contains(&"input_boolean.yaml".to_string()));
    tree.assert_file_not_exists("input_boolean.yaml");
    assert!(!tree.read("packages/kitchen/helpers.yaml").contains("guest"));
}

#[test]
fn test_written_item_reaches_domain_on_next_sync() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/script.yaml", "kitchen_off:\n  sequence: []\n");
    let engine = SyncEngine::open(tree.path()).unwrap();
    engine.sync().unwrap();

    let selector = ItemSelector::MapKey { key: "kitchen_off".into() };
    let saved = engine
        .write_module_item(
            "packages/kitchen/script.yaml",
            &selector,
            "alias: Kitchen off\nsequence:\n  - service: light.turn_off\n",
        )
        .unwrap();
    assert_eq!(saved.status, "saved");
    assert_eq!(saved.file_kind, "mapping");

    engine.sync().unwrap();
    tree.assert_file_contains("scripts.yaml", "service: light.turn_off");
}

#[test]
fn test_module_file_editing() {
    let tree = ConfigTree::new();
    tree.mkdir("scripts");
    let engine = SyncEngine::open(tree.path()).unwrap();

    let saved = engine
        .write_module_file("scripts/night.yaml", "lights_out:\n  sequence: []\n")
        .unwrap();
    assert_eq!(saved.status, "saved");
    assert!(saved.hash.is_some_and(|hash| hash.starts_with("sha256:")));

    let file = engine.read_module_file("scripts/night.yaml").unwrap();
    assert_eq!(file.content, "lights_out:\n  sequence: []\n");

    let missing_dir = engine.write_module_file("scenes/new.yaml", "[]\n");
    assert!(matches!(missing_dir, Err(Error::NotFound(_))));

    let outside = engine.read_module_file("../secrets.yaml");
    assert!(matches!(outside, Err(Error::InvalidArgument(_))));

    engine.delete_module_file("scripts/night.yaml").unwrap();
    tree.assert_file_not_exists("scripts/night.yaml");
}
