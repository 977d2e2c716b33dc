//! Filesystem access scoped to a configuration directory.
//!
//! Every path that crosses this boundary is relative to the root and uses
//! forward slashes. Paths that would resolve outside the root are rejected
//! before any I/O happens.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::io::{self, RobustnessConfig};
use crate::path::normalize_relative;
use crate::{Error, NormalizedPath, Result};

/// A configuration directory and the byte-level operations the engine needs.
#[derive(Debug, Clone)]
pub struct ConfigRoot {
    base: NormalizedPath,
    robustness: RobustnessConfig,
}

impl ConfigRoot {
    /// Open a configuration root. The directory does not have to exist yet.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let base = if path.exists() {
            dunce::canonicalize(path).map_err(|e| Error::io(path, e))?
        } else {
            path.to_path_buf()
        };
        Ok(Self {
            base: NormalizedPath::new(base),
            robustness: RobustnessConfig::default(),
        })
    }

    /// Override write robustness settings.
    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    /// Absolute path of the root.
    pub fn path(&self) -> &NormalizedPath {
        &self.base
    }

    /// Resolve a relative path to an absolute one inside the root.
    pub fn resolve(&self, rel_path: &str) -> Result<NormalizedPath> {
        let rel = normalize_relative(rel_path).ok_or_else(|| Error::OutsideRoot {
            path: rel_path.to_string(),
        })?;
        Ok(self.base.join(&rel))
    }

    /// Express an absolute path relative to the root.
    pub fn relative(&self, path: impl AsRef<Path>) -> Option<String> {
        NormalizedPath::new(path).strip_root(&self.base)
    }

    /// Read a file as text; missing files read as empty text.
    pub fn read(&self, rel_path: &str) -> Result<String> {
        io::read_text(&self.resolve(rel_path)?)
    }

    /// Atomically replace a file's content, creating parent directories.
    pub fn write(&self, rel_path: &str, content: &str) -> Result<()> {
        let path = self.resolve(rel_path)?;
        debug!(path = rel_path, bytes = content.len(), "writing file");
        io::write_atomic(&path, content.as_bytes(), self.robustness)
    }

    /// Delete a file. Returns `false` when it was already absent.
    pub fn remove(&self, rel_path: &str) -> Result<bool> {
        let path = self.resolve(rel_path)?;
        debug!(path = rel_path, "removing file");
        io::remove_file(&path)
    }

    /// Move a file within the root, creating the destination directory.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let source = self.resolve(from)?.to_native();
        let target = self.resolve(to)?.to_native();
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::rename(&source, &target).map_err(|e| Error::io(&source, e))
    }

    /// Create a directory and all of its parents.
    pub fn create_dir_all(&self, rel_path: &str) -> Result<()> {
        let path = self.resolve(rel_path)?.to_native();
        fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))
    }

    pub fn exists(&self, rel_path: &str) -> bool {
        self.resolve(rel_path).is_ok_and(|p| p.exists())
    }

    pub fn is_file(&self, rel_path: &str) -> bool {
        self.resolve(rel_path).is_ok_and(|p| p.is_file())
    }

    pub fn is_dir(&self, rel_path: &str) -> bool {
        self.resolve(rel_path).is_ok_and(|p| p.is_dir())
    }

    /// Names of the immediate subdirectories of `rel_dir`, sorted.
    pub fn list_dirs(&self, rel_dir: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .entries(rel_dir)?
            .into_iter()
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Files directly inside `rel_dir` whose names match `pattern`, sorted.
    ///
    /// Results are relative to the root, e.g. `automations/lights.yaml`.
    pub fn list_files(&self, rel_dir: &str, pattern: &str) -> Result<Vec<String>> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| Error::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let dir = normalize_relative(rel_dir).unwrap_or_default();
        let mut files: Vec<String> = self
            .entries(rel_dir)?
            .into_iter()
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| matcher.matches(name))
            .map(|name| format!("{}/{}", dir, name))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Files matching a root-relative glob pattern, sorted.
    pub fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let full = format!(
            "{}/{}",
            glob::Pattern::escape(self.base.as_str().trim_end_matches('/')),
            pattern
        );
        let paths = glob::glob(&full).map_err(|e| Error::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let mut files: Vec<String> = paths
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .filter_map(|path| self.relative(&path))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Every file below `rel_dir`, recursively, sorted.
    pub fn walk_files(&self, rel_dir: &str) -> Result<Vec<String>> {
        let dir = self.resolve(rel_dir)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(dir.to_native()) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                Error::io(path, std::io::Error::other(e.to_string()))
            })?;
            if entry.file_type().is_file()
                && let Some(rel) = self.relative(entry.path())
            {
                files.push(rel);
            }
        }
        files.sort();
        Ok(files)
    }

    fn entries(&self, rel_dir: &str) -> Result<Vec<fs::DirEntry>> {
        let dir = self.resolve(rel_dir)?.to_native();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let reader = fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))?;
        reader
            .map(|entry| entry.map_err(|e| Error::io(&dir, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixture() -> (tempfile::TempDir, ConfigRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = ConfigRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn rejects_paths_escaping_the_root() {
        let (_dir, root) = fixture();
        assert!(matches!(
            root.read("../outside.yaml"),
            Err(Error::OutsideRoot { .. })
        ));
        assert!(root.write("packages/../../x.yaml", "x").is_err());
    }

    #[test]
    fn write_then_read_round_trips_and_creates_parents() {
        let (_dir, root) = fixture();
        root.write("packages/kitchen/automation.yaml", "- alias: A\n")
            .unwrap();
        assert_eq!(
            root.read("packages/kitchen/automation.yaml").unwrap(),
            "- alias: A\n"
        );
        assert_eq!(root.read("missing.yaml").unwrap(), "");
    }

    #[test]
    fn list_files_filters_by_pattern_and_sorts() {
        let (_dir, root) = fixture();
        root.write("automations/b.yaml", "[]\n").unwrap();
        root.write("automations/a.yml", "[]\n").unwrap();
        root.write("automations/notes.txt", "x").unwrap();
        assert_eq!(
            root.list_files("automations", "*.y*ml").unwrap(),
            vec!["automations/a.yml", "automations/b.yaml"]
        );
        assert!(root.list_files("scripts", "*.y*ml").unwrap().is_empty());
    }

    #[test]
    fn glob_returns_root_relative_files() {
        let (_dir, root) = fixture();
        root.write("packages/common/b.template.yaml", "{}\n").unwrap();
        root.write("packages/common/a.template.yaml", "{}\n").unwrap();
        assert_eq!(
            root.glob("packages/common/*.template.yaml").unwrap(),
            vec![
                "packages/common/a.template.yaml",
                "packages/common/b.template.yaml"
            ]
        );
    }

    #[test]
    fn remove_reports_whether_file_existed() {
        let (_dir, root) = fixture();
        root.write("scripts.yaml", "{}\n").unwrap();
        assert!(root.remove("scripts.yaml").unwrap());
        assert!(!root.remove("scripts.yaml").unwrap());
    }
}
