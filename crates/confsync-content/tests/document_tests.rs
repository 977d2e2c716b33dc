use confsync_content::{
    ExpandOptions, Expander, contains_template_tags, fingerprint, load_document, render,
};
use confsync_fs::ConfigRoot;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_yaml::Value;

fn root_with(files: &[(&str, &str)]) -> (tempfile::TempDir, ConfigRoot) {
    let dir = tempfile::tempdir().unwrap();
    let root = ConfigRoot::new(dir.path()).unwrap();
    for (rel, content) in files {
        root.write(rel, content).unwrap();
    }
    (dir, root)
}

#[test]
fn load_document_records_item_lines_for_lists() {
    let (_dir, root) = root_with(&[(
        "automations.yaml",
        "- id: a\n  alias: A\n- id: b\n  alias: B\n",
    )]);

    let doc = load_document(&root, "automations.yaml").unwrap();

    assert_eq!(doc.item_lines, Some(vec![1, 3]));
    assert_eq!(doc.item_line(1), Some(3));
}

#[rstest]
#[case("kitchen:\n  name: Kitchen\n")]
#[case("[{alias: A}, {alias: B}]\n")]
fn load_document_has_no_lines_without_block_items(#[case] content: &str) {
    let (_dir, root) = root_with(&[("groups.yaml", content)]);
    let doc = load_document(&root, "groups.yaml").unwrap();
    assert_eq!(doc.item_lines, None);
}

#[test]
fn missing_file_loads_as_null() {
    let (_dir, root) = root_with(&[]);
    let doc = load_document(&root, "scenes.yaml").unwrap();
    assert_eq!(doc.data, Value::Null);
    assert_eq!(doc.text, "");
}

#[test]
fn expanded_module_fingerprints_like_its_domain_copy() {
    let (_dir, root) = root_with(&[
        (
            "packages/common/notify.template.yaml",
            "- service: notify.phone\n  data:\n    message: Door opened\n",
        ),
        (
            "packages/hall/automation.yaml",
            "- id: door\n  alias: Door\n  action: !/packages/common/notify.template.yaml\n",
        ),
        (
            "automations.yaml",
            "- id: door\n  alias: Door\n  action:\n  - service: notify.phone\n    data:\n      message: Door opened\n",
        ),
    ]);
    let module = load_document(&root, "packages/hall/automation.yaml").unwrap();
    let domain = load_document(&root, "automations.yaml").unwrap();
    assert!(contains_template_tags(&module.data));

    let mut warnings = Vec::new();
    let expander = Expander::new(&root, ExpandOptions::templates_only());
    let expanded = expander
        .expand(&module.data[0], "packages/hall/automation.yaml", &mut warnings)
        .unwrap();

    assert_eq!(
        fingerprint(Some(&expanded), &["id"]),
        fingerprint(Some(&domain.data[0]), &["id"])
    );
    assert!(warnings.is_empty());
    assert_eq!(render(&expanded).unwrap(), render(&domain.data[0]).unwrap());
}
