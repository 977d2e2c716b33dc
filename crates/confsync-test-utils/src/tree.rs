//! [`ConfigTree`] fixture for configuration-directory scenarios.

use std::fs;
use std::path::Path;

use confsync_fs::ConfigRoot;
use serde_yaml::Value;
use tempfile::TempDir;

/// A temporary configuration directory.
///
/// # Example
///
/// ```rust,no_run
/// use confsync_test_utils::ConfigTree;
///
/// let tree = ConfigTree::new();
/// tree.write("automations/lights.yaml", "- alias: Lights\n");
/// tree.assert_file_contains("automations/lights.yaml", "alias: Lights");
/// ```
pub struct ConfigTree {
    temp_dir: TempDir,
    root: ConfigRoot,
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigTree {
    /// Create an empty configuration directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = ConfigRoot::new(temp_dir.path()).unwrap();
        Self { temp_dir, root }
    }

    /// Create a directory with `.gitops/config.yaml` holding `settings`.
    pub fn with_settings(settings: &str) -> Self {
        let tree = Self::new();
        tree.write(".gitops/config.yaml", settings);
        tree
    }

    /// Filesystem path of the directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn root(&self) -> &ConfigRoot {
        &self.root
    }

    /// Write `content` to `rel_path`, creating parent directories.
    pub fn write(&self, rel_path: &str, content: &str) {
        let full_path = self.path().join(rel_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content)
            .unwrap_or_else(|e| panic!("Could not write {}: {}", full_path.display(), e));
    }

    /// Create an empty directory.
    pub fn mkdir(&self, rel_path: &str) {
        fs::create_dir_all(self.path().join(rel_path)).unwrap();
    }

    /// Contents of `rel_path`.
    ///
    /// # Panics
    /// Panics if the file cannot be read.
    pub fn read(&self, rel_path: &str) -> String {
        let full_path = self.path().join(rel_path);
        fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()))
    }

    /// Parsed YAML of `rel_path`.
    pub fn load_yaml(&self, rel_path: &str) -> Value {
        serde_yaml::from_str(&self.read(rel_path))
            .unwrap_or_else(|e| panic!("Invalid YAML in {}: {}", rel_path, e))
    }

    pub fn exists(&self, rel_path: &str) -> bool {
        self.path().join(rel_path).exists()
    }

    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, rel_path: &str) {
        assert!(self.exists(rel_path), "Expected file to exist: {}", rel_path);
    }

    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, rel_path: &str) {
        assert!(!self.exists(rel_path), "Expected file NOT to exist: {}", rel_path);
    }

    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(&self, rel_path: &str, content: &str) {
        let file_content = self.read(rel_path);
        assert!(
            file_content.contains(content),
            "File {} does not contain expected content.\nExpected: {}\nActual: {}",
            rel_path,
            content,
            file_content
        );
    }
}
