//! Module browser: grouping of module files, whole-file reads and writes

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use confsync_fs::ConfigPath;
use confsync_fs::checksum::file_checksum;
use tracing::info;

use super::context::{is_yaml_path, resolve_module_path};
use crate::engine::SyncEngine;
use crate::registry::{
    HELPERS_MODULE_DIR, HELPERS_PACKAGE_FILENAME, MODULE_BROWSER_DIRS, legacy_unassigned_path,
    spec_by_package_filename,
};
use crate::report::{ModuleEntry, ModuleFile, ModuleFileStatus, ModuleIndex};
use crate::{Error, Result};

const UNASSIGNED_PACKAGE: &str = "unassigned";

fn entry(kind: &str, name: &str, files: Vec<String>) -> ModuleEntry {
    ModuleEntry {
        id: format!("{}:{}", kind, name),
        name: name.to_string(),
        kind: kind.to_string(),
        files,
    }
}

/// Package a file under `packages/` belongs to: its directory, or its stem
/// for files placed directly in `packages/`.
fn package_name(rel_path: &str) -> Option<String> {
    let parts: Vec<&str> = rel_path.split('/').collect();
    match parts.as_slice() {
        [_, file] => Path::new(file)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string),
        [_, package, _, ..] => Some(package.to_string()),
        _ => None,
    }
}

impl SyncEngine {
    /// Module files grouped as packages, one-off directories and unassigned
    /// bundles, each group sorted by name.
    pub fn list_module_index(&self) -> Result<ModuleIndex> {
        let root = self.root();
        let packages_dir = ConfigPath::PackagesDir.as_str();

        let mut packages: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for rel_path in root.walk_files(packages_dir)? {
            if !is_yaml_path(&rel_path) {
                continue;
            }
            let Some(name) = package_name(&rel_path) else {
                continue;
            };
            if name != UNASSIGNED_PACKAGE {
                packages.entry(name).or_default().insert(rel_path);
            }
        }

        let mut unassigned_by_dir: BTreeMap<&str, String> = BTreeMap::new();
        for rel_path in root.walk_files(&format!("{}/{}", packages_dir, UNASSIGNED_PACKAGE))? {
            if !is_yaml_path(&rel_path) {
                continue;
            }
            let filename = rel_path.rsplit('/').next().unwrap_or_default();
            let module_dir = if filename == HELPERS_PACKAGE_FILENAME {
                Some(HELPERS_MODULE_DIR)
            } else {
                spec_by_package_filename(filename).map(|spec| spec.module_dir)
            };
            if let Some(module_dir) = module_dir {
                unassigned_by_dir.insert(module_dir, rel_path);
            }
        }

        let mut one_offs = Vec::new();
        let mut unassigned = Vec::new();
        for dir in MODULE_BROWSER_DIRS {
            let legacy = legacy_unassigned_path(dir);
            let files: Vec<String> = root
                .walk_files(dir)?
                .into_iter()
                .filter(|rel_path| is_yaml_path(rel_path))
                .collect();
            let has_legacy = files.contains(&legacy);
            let loose: Vec<String> = files.into_iter().filter(|rel_path| *rel_path != legacy).collect();
            if !loose.is_empty() {
                one_offs.push(entry("one_offs", dir, loose));
            }
            let bundle = unassigned_by_dir
                .remove(dir)
                .or_else(|| has_legacy.then_some(legacy));
            if let Some(bundle) = bundle {
                unassigned.push(entry("unassigned", dir, vec![bundle]));
            }
        }
        one_offs.sort_by(|a, b| a.name.cmp(&b.name));
        unassigned.sort_by(|a, b| a.name.cmp(&b.name));

        let modules = packages
            .into_iter()
            .map(|(name, files)| entry("package", &name, files.into_iter().collect()))
            .chain(one_offs)
            .chain(unassigned)
            .collect();
        Ok(ModuleIndex { modules })
    }

    pub fn read_module_file(&self, rel_path: &str) -> Result<ModuleFile> {
        let root = self.root();
        let rel_path = resolve_module_path(rel_path)?;
        if !root.is_file(&rel_path) {
            return Err(Error::not_found("Module file not found."));
        }
        Ok(ModuleFile {
            content: root.read(&rel_path)?,
            hash: file_checksum(root, &rel_path)?,
            path: rel_path,
        })
    }

    /// Replace a module file's text. Its directory must already exist.
    pub fn write_module_file(&self, rel_path: &str, content: &str) -> Result<ModuleFileStatus> {
        let root = self.root();
        let rel_path = resolve_module_path(rel_path)?;
        let parent = rel_path.rsplit_once('/').map_or("", |(parent, _)| parent);
        if !parent.is_empty() && !root.is_dir(parent) {
            return Err(Error::not_found("Module directory not found."));
        }
        root.write(&rel_path, content)?;
        info!(path = %rel_path, "saved module file");
        Ok(ModuleFileStatus {
            status: "saved".to_string(),
            hash: Some(file_checksum(root, &rel_path)?),
            path: rel_path,
        })
    }

    pub fn delete_module_file(&self, rel_path: &str) -> Result<ModuleFileStatus> {
        let root = self.root();
        let rel_path = resolve_module_path(rel_path)?;
        if !root.is_file(&rel_path) {
            return Err(Error::not_found("Module file not found."));
        }
        root.remove(&rel_path)?;
        info!(path = %rel_path, "deleted module file");
        Ok(ModuleFileStatus {
            status: "deleted".to_string(),
            path: rel_path,
            hash: None,
        })
    }
}
