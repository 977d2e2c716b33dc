//! Byte-comparing writes with an optional in-memory preview

use std::collections::BTreeMap;

use confsync_content::render;
use confsync_fs::ConfigRoot;
use serde_yaml::Value;
use tracing::info;

use crate::Result;

/// Writes files only when their content changes.
///
/// In preview mode nothing touches the disk: the new content of every file
/// that would change is recorded instead, with deletions recorded as empty
/// text.
#[derive(Debug)]
pub struct Writer<'a> {
    root: &'a ConfigRoot,
    preview: Option<BTreeMap<String, String>>,
}

impl<'a> Writer<'a> {
    pub fn new(root: &'a ConfigRoot, preview: bool) -> Self {
        Self {
            root,
            preview: preview.then(BTreeMap::new),
        }
    }

    pub fn is_preview(&self) -> bool {
        self.preview.is_some()
    }

    /// Recorded writes, when previewing.
    pub fn into_preview(self) -> BTreeMap<String, String> {
        self.preview.unwrap_or_default()
    }

    /// Render and write `data`. Returns `true` when the file changed.
    pub fn write_yaml(&mut self, rel_path: &str, data: &Value) -> Result<bool> {
        let rendered = render(data)?;
        self.write_text(rel_path, &rendered)
    }

    /// Like [`write_yaml`](Self::write_yaml), but a structurally empty payload
    /// deletes the file.
    pub fn write_domain_yaml(&mut self, rel_path: &str, data: &Value) -> Result<bool> {
        if !is_empty_payload(data) {
            return self.write_yaml(rel_path, data);
        }
        if !self.root.exists(rel_path) {
            return Ok(false);
        }
        match &mut self.preview {
            Some(preview) => {
                preview.insert(rel_path.to_string(), String::new());
                Ok(true)
            }
            None => {
                info!(path = rel_path, "removing empty domain file");
                Ok(self.root.remove(rel_path)?)
            }
        }
    }

    /// Write raw text. Returns `true` when the file changed.
    pub fn write_text(&mut self, rel_path: &str, content: &str) -> Result<bool> {
        if self.root.read(rel_path)? == content {
            return Ok(false);
        }
        match &mut self.preview {
            Some(preview) => {
                preview.insert(rel_path.to_string(), content.to_string());
            }
            None => {
                info!(path = rel_path, "writing file");
                self.root.write(rel_path, content)?;
            }
        }
        Ok(true)
    }
}

/// `null`, `[]`, `{}` or `{views: []}`.
pub fn is_empty_payload(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Sequence(items) => items.is_empty(),
        Value::Mapping(map) => {
            map.is_empty()
                || (map.len() == 1
                    && map
                        .get("views")
                        .and_then(Value::as_sequence)
                        .is_some_and(|views| views.is_empty()))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsync_test_utils::ConfigTree;
    use rstest::rstest;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[rstest]
    #[case("[]", true)]
    #[case("{}", true)]
    #[case("views: []", true)]
    #[case("views: []\ntitle: Home", false)]
    #[case("[1]", false)]
    #[case("a: 1", false)]
    fn empty_payloads(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(is_empty_payload(&yaml(text)), expected);
    }

    #[test]
    fn unchanged_content_is_not_rewritten() {
        let tree = ConfigTree::new();
        tree.write("scripts.yaml", "a: 1\n");
        let mut writer = Writer::new(tree.root(), false);
        assert!(!writer.write_yaml("scripts.yaml", &yaml("a: 1")).unwrap());
        assert!(writer.write_yaml("scripts.yaml", &yaml("a: 2")).unwrap());
        assert_eq!(tree.read("scripts.yaml"), "a: 2\n");
    }

    #[test]
    fn empty_domain_payload_deletes_the_file() {
        let tree = ConfigTree::new();
        tree.write("groups.yaml", "a: {}\n");
        let mut writer = Writer::new(tree.root(), false);
        assert!(writer.write_domain_yaml("groups.yaml", &yaml("{}")).unwrap());
        assert!(!tree.exists("groups.yaml"));
        assert!(!writer.write_domain_yaml("groups.yaml", &yaml("{}")).unwrap());
    }

    #[test]
    fn preview_records_without_touching_disk() {
        let tree = ConfigTree::new();
        tree.write("groups.yaml", "a: {}\n");
        let mut writer = Writer::new(tree.root(), true);
        assert!(writer.write_domain_yaml("groups.yaml", &yaml("{}")).unwrap());
        assert!(writer.write_yaml("scenes.yaml", &yaml("[{id: s}]")).unwrap());
        assert!(tree.exists("groups.yaml"));
        assert!(!tree.exists("scenes.yaml"));

        let preview = writer.into_preview();
        assert_eq!(preview.get("groups.yaml").map(String::as_str), Some(""));
        assert!(preview["scenes.yaml"].contains("id: s"));
    }
}
