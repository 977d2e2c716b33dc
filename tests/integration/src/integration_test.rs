//! End-to-end tests over a complete configuration directory
//!
//! Every domain is exercised in one cycle: modules are built into domain
//! files, the domain side is edited, and the edits flow back.

use std::time::Duration;

use confsync_core::SyncEngine;
use confsync_fs::{CycleLock, Error as FsError};
use confsync_test_utils::ConfigTree;
use serde_yaml::Value;

/// A small house split into two packages plus one-off files.
fn house() -> ConfigTree {
    let tree = ConfigTree::new();
    tree.write(
        "packages/kitchen/automation.yaml",
        "- id: kitchen_motion\n  alias: Kitchen motion\n  trigger: []\n  action: []\n",
    );
    tree.write("packages/kitchen/script.yaml", "kitchen_off:\n  sequence: []\n");
    tree.write(
        "packages/kitchen/helpers.yaml",
        "input_boolean:\n  kitchen_guest:\n    name: Guest\n",
    );
    tree.write("packages/kitchen/groups.yaml", "kitchen:\n  entities:\n  - light.kitchen\n");
    tree.write(
        "packages/garden/scene.yaml",
        "- id: garden_evening\n  name: Garden evening\n  entities: {}\n",
    );
    tree.write(
        "automations/porch.yaml",
        "- alias: Porch at dusk\n  trigger: []\n  action: []\n",
    );
    tree.write(
        "lovelace/main.yaml",
        "views:\n- title: Home\n  path: home\n  cards: []\ntitle: House\n",
    );
    tree
}

fn map_keys(value: &Value) -> Vec<String> {
    value
        .as_mapping()
        .map(|map| map.keys().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn list_field(value: &Value, field: &str) -> Vec<String> {
    value
        .as_sequence()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(field).and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn test_full_house_sync() {
    let tree = house();
    let engine = SyncEngine::open(tree.path()).unwrap();

    let report = engine.sync().unwrap();

    assert_eq!(
        report.changed_files,
        vec![
            "automations.yaml",
            "automations/porch.yaml",
            "groups.yaml",
            "input_boolean.yaml",
            "scenes.yaml",
            "scripts.yaml",
            "ui-lovelace.yaml",
        ]
    );
    assert_eq!(
        list_field(&tree.load_yaml("automations.yaml"), "id"),
        vec!["porch_at_dusk", "kitchen_motion"]
    );
    assert_eq!(map_keys(&tree.load_yaml("scripts.yaml")), vec!["kitchen_off"]);
    assert_eq!(map_keys(&tree.load_yaml("groups.yaml")), vec!["kitchen"]);
    assert_eq!(list_field(&tree.load_yaml("scenes.yaml"), "id"), vec!["garden_evening"]);
    assert_eq!(map_keys(&tree.load_yaml("input_boolean.yaml")), vec!["kitchen_guest"]);

    let dashboard = tree.load_yaml("ui-lovelace.yaml");
    assert_eq!(dashboard["title"], Value::String("House".into()));
    assert_eq!(list_field(&dashboard["views"], "path"), vec!["home"]);

    let again = engine.sync().unwrap();
    assert!(again.is_clean(), "second sync changed {:?}", again.changed_files);
}

#[test]
fn test_ui_edits_flow_back_to_modules() {
    let tree = house();
    let engine = SyncEngine::open(tree.path()).unwrap();
    engine.sync().unwrap();

    let scripts = tree.read("scripts.yaml").replace("sequence: []", "sequence:\n  - delay: 5");
    tree.write("scripts.yaml", &scripts);
    let mut automations = tree.read("automations.yaml");
    automations.push_str("- id: '1700000000003'\n  alias: Wake up\n  trigger: []\n  action: []\n");
    tree.write("automations.yaml", &automations);

    let report = engine.sync().unwrap();

    assert!(report.changed_files.contains(&"packages/kitchen/script.yaml".to_string()));
    assert!(report.changed_files.contains(&"packages/unassigned/automation.yaml".to_string()));
    tree.assert_file_contains("packages/kitchen/script.yaml", "delay: 5");
    assert_eq!(
        list_field(&tree.load_yaml("packages/unassigned/automation.yaml"), "alias"),
        vec!["Wake up"]
    );
    tree.assert_file_contains(".gitops/mappings/automation.yaml", "packages/unassigned/automation.yaml");
}

#[test]
fn test_template_edit_writes_diff_artifact() {
    let tree = ConfigTree::new();
    let template = "packages/common/lights.template.yaml";
    tree.write(template, "- service: light.turn_on\n  target:\n    entity_id: light.porch\n");
    tree.write(
        "packages/porch/automation.yaml",
        "- id: porch\n  alias: Porch\n  trigger: []\n  action: !/packages/common/lights.template.yaml\n",
    );
    let engine = SyncEngine::open(tree.path()).unwrap();
    engine.sync().unwrap();
    tree.assert_file_contains("automations.yaml", "entity_id: light.porch");

    let edited = tree.read("automations.yaml").replace("light.porch", "light.porch_2");
    tree.write("automations.yaml", &edited);
    let report = engine.sync().unwrap();

    let diff_path = format!("{}.diff", template);
    assert!(report.changed_files.contains(&diff_path));
    let diff = tree.read(&diff_path);
    assert!(diff.starts_with("# TEMPLATE EDIT DETECTED for packages/common/lights.template.yaml"));
    assert!(diff.contains("+    entity_id: light.porch_2"));
    tree.assert_file_contains(template, "entity_id: light.porch\n");
    tree.assert_file_contains(
        "packages/porch/automation.yaml",
        "!/packages/common/lights.template.yaml",
    );
}

#[test]
fn test_cycle_lock_blocks_concurrent_writers() {
    let tree = ConfigTree::new();
    let engine = SyncEngine::open(tree.path()).unwrap();

    let held = CycleLock::acquire(engine.root(), Duration::from_secs(1)).unwrap();
    let contended = CycleLock::acquire(engine.root(), Duration::from_millis(100));
    assert!(matches!(contended, Err(FsError::LockFailed { .. })));

    drop(held);
    assert!(CycleLock::acquire(engine.root(), Duration::from_secs(1)).is_ok());
}
