//! Scenario tests for SyncEngine cycles

use confsync_core::{ItemOperation, ItemRef, ItemSelector, MoveTarget, SyncEngine};
use confsync_test_utils::ConfigTree;
use pretty_assertions::assert_eq;
use serde_yaml::Value;

fn engine(tree: &ConfigTree) -> SyncEngine {
    SyncEngine::open(tree.path()).unwrap()
}

/// Ids of a list-shaped YAML file.
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

const LIGHTS: &str = "- id: kitchen_lights\n  alias: Kitchen Lights\n  trigger: []\n  action: []\n";

#[test]
fn test_first_sync_builds_domain_from_modules() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", LIGHTS);

    let report = engine(&tree).sync().unwrap();

    assert_eq!(report.status, "synced");
    assert_eq!(report.changed_files, vec!["automations.yaml"]);
    assert_eq!(ids(&tree, "automations.yaml"), vec!["kitchen_lights"]);
    tree.assert_file_exists(".gitops/sync-state.yaml");
    tree.assert_file_contains(".gitops/mappings/automation.yaml", "packages/kitchen/automation.yaml");
}

#[test]
fn test_sync_is_idempotent() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", LIGHTS);
    tree.write("packages/kitchen/script.yaml", "reset:\n  alias: Reset\n  sequence: []\n");
    let engine = engine(&tree);

    engine.sync().unwrap();
    let domain = tree.read("automations.yaml");
    let second = engine.sync().unwrap();

    assert!(second.is_clean(), "unexpected changes: {:?}", second.changed_files);
    assert_eq!(tree.read("automations.yaml"), domain);
}

#[test]
fn test_alias_ids_are_injected_and_unique() {
    let tree = ConfigTree::new();
    tree.write(
        "automations/lights.yaml",
        "- alias: Kitchen Lights\n  trigger: []\n  action: []\n- alias: KitchenLights\n  trigger: []\n  action: [{delay: 1}]\n",
    );

    let report = engine(&tree).sync().unwrap();

    assert!(report.changed_files.contains(&"automations/lights.yaml".to_string()));
    assert_eq!(ids(&tree, "automations/lights.yaml"), vec!["kitchen_lights", "kitchen_lights_2"]);
    assert_eq!(ids(&tree, "automations.yaml"), vec!["kitchen_lights", "kitchen_lights_2"]);
}

#[test]
fn test_bare_template_tags_are_left_untouched() {
    let tree = ConfigTree::new();
    tree.write(
        "packages/common/lights.template.yaml",
        "- service: light.turn_on\n  target:\n    entity_id: light.porch\n",
    );
    let module = "- id: porch\n  alias: Porch\n  trigger: []\n  action: !/packages/common/lights.template.yaml\n";
    tree.write("packages/porch/automation.yaml", module);

    let report = engine(&tree).sync().unwrap();

    assert_eq!(report.changed_files, vec!["automations.yaml"]);
    assert_eq!(tree.read("packages/porch/automation.yaml"), module);
    tree.assert_file_contains("automations.yaml", "entity_id: light.porch");
}

#[test]
fn test_domain_only_items_land_in_unassigned() {
    let tree = ConfigTree::new();
    tree.write(
        "automations.yaml",
        "- id: '1700000000001'\n  alias: Wake up\n  trigger: []\n  action: []\n",
    );

    engine(&tree).sync().unwrap();

    assert_eq!(ids(&tree, "packages/unassigned/automation.yaml"), vec!["1700000000001"]);
    tree.assert_file_contains("packages/unassigned/automation.yaml", "Wake up");
    tree.assert_file_contains("automations.yaml", "Wake up");
}

#[test]
fn test_domain_edit_flows_back_into_owning_module() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", LIGHTS);
    let engine = engine(&tree);
    engine.sync().unwrap();

    let edited = tree.read("automations.yaml").replace("Kitchen Lights", "Kitchen Lamps");
    tree.write("automations.yaml", &edited);
    let report = engine.sync().unwrap();

    assert_eq!(report.changed_files, vec!["packages/kitchen/automation.yaml"]);
    tree.assert_file_contains("packages/kitchen/automation.yaml", "alias: Kitchen Lamps");
}

#[test]
fn test_edits_on_both_sides_survive_the_same_cycle() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", "- id: a\n  alias: A\n  trigger: []\n  action: []\n");
    let engine = engine(&tree);
    engine.sync().unwrap();

    tree.write("packages/kitchen/automation.yaml", "- id: a\n  alias: A2\n  trigger: []\n  action: []\n");
    let domain = tree.read("automations.yaml") + "- id: ui2\n  alias: UI2\n  trigger: []\n  action: []\n";
    tree.write("automations.yaml", &domain);
    let report = engine.sync().unwrap();

    assert_eq!(report.status, "synced");
    assert_eq!(ids(&tree, "packages/kitchen/automation.yaml"), vec!["a"]);
    tree.assert_file_contains("packages/kitchen/automation.yaml", "alias: A2");
    assert_eq!(ids(&tree, "packages/unassigned/automation.yaml"), vec!["ui2"]);
    let mut domain_ids = ids(&tree, "automations.yaml");
    domain_ids.sort();
    assert_eq!(domain_ids, vec!["a", "ui2"]);
    tree.assert_file_contains("automations.yaml", "alias: A2");

    let third = engine.sync().unwrap();
    assert!(third.is_clean(), "unexpected changes: {:?}", third.changed_files);
}

#[test]
fn test_domain_edit_of_positional_item_moves_it_to_unassigned() {
    let tree = ConfigTree::new();
    tree.write(
        "templates/a.yaml",
        "- sensor:\n  - name: A\n    state: '1'\n- sensor:\n  - name: B\n    state: '2'\n",
    );
    let engine = engine(&tree);
    engine.sync().unwrap();

    let edited = tree.read("templates.yaml").replace("name: B\n", "name: B2\n");
    tree.write("templates.yaml", &edited);
    engine.sync().unwrap();

    tree.assert_file_contains("packages/unassigned/template.yaml", "name: B2");
    tree.assert_file_contains("templates/a.yaml", "name: A\n");
    assert!(!tree.read("templates/a.yaml").contains("name: B"));

    // domain order follows module discovery once, then settles
    engine.sync().unwrap();
    let next = engine.sync().unwrap();
    assert!(next.is_clean(), "unexpected changes: {:?}", next.changed_files);
}

#[test]
fn test_build_then_update_round_trip() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", LIGHTS);
    let engine = engine(&tree);

    let built = engine.build().unwrap();
    assert_eq!(built.status, "built");
    assert_eq!(built.changed_files, vec!["automations.yaml"]);

    let edited = tree.read("automations.yaml").replace("trigger: []", "trigger: [{platform: sun}]");
    tree.write("automations.yaml", &edited);
    let updated = engine.update().unwrap();

    assert_eq!(updated.status, "updated");
    assert_eq!(updated.changed_files, vec!["packages/kitchen/automation.yaml"]);
    tree.assert_file_contains("packages/kitchen/automation.yaml", "platform: sun");
}

#[test]
fn test_item_missing_from_modules_is_restored_from_domain() {
    let tree = ConfigTree::new();
    tree.write(
        "packages/kitchen/automation.yaml",
        "- id: a\n  alias: A\n  trigger: []\n  action: []\n- id: b\n  alias: B\n  trigger: []\n  action: []\n",
    );
    let engine = engine(&tree);
    engine.sync().unwrap();

    tree.write("packages/kitchen/automation.yaml", "- id: a\n  alias: A\n  trigger: []\n  action: []\n");
    let report = engine.sync().unwrap();

    assert_eq!(ids(&tree, "automations.yaml"), vec!["a", "b"]);
    assert_eq!(ids(&tree, "packages/kitchen/automation.yaml"), vec!["a", "b"]);
    assert!(
        report.warnings.iter().any(|w| w.contains("b missing from modules")),
        "warnings: {:?}",
        report.warnings
    );
}

#[test]
fn test_keyed_scripts_sync() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/script.yaml", "reset:\n  alias: Reset\n  sequence: []\n");
    tree.write("scripts/night.yaml", "lights_out:\n  sequence: []\n");

    engine(&tree).sync().unwrap();

    let domain = tree.load_yaml("scripts.yaml");
    let keys: Vec<&str> = domain
        .as_mapping()
        .map(|map| map.keys().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    assert_eq!(keys, vec!["reset", "lights_out"]);
}

#[test]
fn test_helpers_are_split_by_type() {
    let tree = ConfigTree::new();
    tree.write(
        "packages/kitchen/helpers.yaml",
        "input_boolean:\n  guest_mode:\n    name: Guest mode\ntimer:\n  tea:\n    duration: '00:04:00'\n",
    );

    engine(&tree).sync().unwrap();

    tree.assert_file_contains("input_boolean.yaml", "guest_mode:");
    tree.assert_file_contains("timer.yaml", "tea:");
    tree.assert_file_not_exists("counter.yaml");
}

#[test]
fn test_lovelace_views_combine_into_dashboard() {
    let tree = ConfigTree::new();
    tree.write("lovelace/home.yaml", "- title: Home\n  path: home\n  cards: []\n");
    tree.write("packages/garden/lovelace.yaml", "- title: Garden\n  path: garden\n  cards: []\n");

    engine(&tree).sync().unwrap();

    let dashboard = tree.load_yaml("ui-lovelace.yaml");
    let paths: Vec<&str> = dashboard
        .get("views")
        .and_then(Value::as_sequence)
        .map(|views| views.iter().filter_map(|v| v.get("path").and_then(Value::as_str)).collect())
        .unwrap_or_default();
    assert_eq!(paths, vec!["home", "garden"]);
}

#[test]
fn test_disabled_engine_does_nothing() {
    let tree = ConfigTree::with_settings("merge_automations: false\n");
    tree.write("packages/kitchen/automation.yaml", LIGHTS);

    let report = engine(&tree).sync().unwrap();

    assert_eq!(report.status, "disabled");
    tree.assert_file_not_exists("automations.yaml");
}

#[test]
fn test_legacy_unassigned_file_is_migrated() {
    let tree = ConfigTree::new();
    tree.write("automations/automations.unassigned.yaml", LIGHTS);

    let report = engine(&tree).sync().unwrap();

    tree.assert_file_not_exists("automations/automations.unassigned.yaml");
    assert_eq!(ids(&tree, "packages/unassigned/automation.yaml"), vec!["kitchen_lights"]);
    assert!(report.warnings.iter().any(|w| w.starts_with("Migrated")));
}

#[test]
fn test_preview_writes_nothing() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", LIGHTS);

    let preview = engine(&tree).preview().unwrap();

    assert_eq!(preview.status, "preview");
    let paths: Vec<&str> = preview.build_diffs.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(paths, vec!["automations.yaml"]);
    assert!(preview.update_diffs.is_empty());
    tree.assert_file_not_exists("automations.yaml");
    tree.assert_file_not_exists(".gitops/sync-state.yaml");
}

#[test]
fn test_validate_reports_broken_module_per_domain() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", "- alias: [unclosed\n");

    let report = engine(&tree).validate().unwrap();

    assert!(report.has_issues());
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.starts_with("automation: packages/kitchen/automation.yaml")),
        "warnings: {:?}",
        report.warnings
    );
    tree.assert_file_not_exists("automations.yaml");
}

#[test]
fn test_validate_clean_directory() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", LIGHTS);
    let engine = engine(&tree);
    engine.sync().unwrap();

    let report = engine.validate().unwrap();

    assert_eq!(report.status, "ok");
    assert_eq!(report.build.count, 0);
    assert_eq!(report.update.count, 0);
}

#[test]
fn test_reconcile_adopts_domain_ids() {
    let tree = ConfigTree::new();
    tree.write(
        "packages/kitchen/automation.yaml",
        "- id: morning\n  alias: Morning\n  trigger: []\n  action: []\n",
    );
    tree.write(
        "automations.yaml",
        "- id: '1700000000002'\n  alias: Morning\n  trigger: []\n  action: []\n",
    );

    let report = engine(&tree).reconcile_automation_ids().unwrap();

    assert_eq!(report.status, "reconciled");
    assert_eq!(report.reconciled_ids.len(), 1);
    assert_eq!(report.reconciled_ids[0].old_id, "morning");
    assert_eq!(report.reconciled_ids[0].new_id, "1700000000002");
    assert_eq!(ids(&tree, "packages/kitchen/automation.yaml"), vec!["1700000000002"]);
}

#[test]
fn test_reconcile_skips_without_modules() {
    let tree = ConfigTree::new();

    let report = engine(&tree).reconcile_automation_ids().unwrap();

    assert_eq!(report.status, "skipped");
    assert_eq!(report.reason.as_deref(), Some("No automation module files found."));
}

#[test]
fn test_move_item_to_new_package() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", LIGHTS);
    let engine = engine(&tree);
    engine.sync().unwrap();

    let selector = ItemSelector::ListId {
        id: Some("kitchen_lights".into()),
        fingerprint: None,
    };
    let report = engine
        .operate_module_items(
            &ItemOperation::Move(MoveTarget::NewPackage {
                package_name: "lighting".into(),
            }),
            &[ItemRef::new("packages/kitchen/automation.yaml", selector)],
        )
        .unwrap();

    assert_eq!(report.status, "ok");
    assert_eq!(ids(&tree, "packages/lighting/automation.yaml"), vec!["kitchen_lights"]);
    assert!(ids(&tree, "packages/kitchen/automation.yaml").is_empty());
    assert_eq!(ids(&tree, "automations.yaml"), vec!["kitchen_lights"]);
}

#[test]
fn test_move_to_missing_package_is_rejected() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", LIGHTS);

    let selector = ItemSelector::ListId {
        id: Some("kitchen_lights".into()),
        fingerprint: None,
    };
    let result = engine(&tree).operate_module_items(
        &ItemOperation::Move(MoveTarget::ExistingPackage {
            package_name: "nowhere".into(),
        }),
        &[ItemRef::new("packages/kitchen/automation.yaml", selector)],
    );

    assert!(result.is_err());
    tree.assert_file_contains("packages/kitchen/automation.yaml", "kitchen_lights");
}

#[test]
fn test_module_index_groups_files() {
    let tree = ConfigTree::new();
    tree.write("packages/kitchen/automation.yaml", LIGHTS);
    tree.write("scripts/night.yaml", "lights_out:\n  sequence: []\n");
    tree.write("packages/unassigned/script.yaml", "misc:\n  sequence: []\n");

    let index = engine(&tree).list_module_index().unwrap();

    let ids: Vec<&str> = index.modules.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["package:kitchen", "one_offs:scripts", "unassigned:scripts"]);
}
