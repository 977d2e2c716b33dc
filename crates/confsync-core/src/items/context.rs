//! Module path validation and file classification

use std::path::Path;

use confsync_fs::{ConfigPath, has_parent_segment, normalize_relative};

use crate::registry::{
    DomainKind, DomainSpec, MODULE_BROWSER_DIRS, Target, spec_by_module_dir,
    spec_by_package_filename,
};
use crate::{Error, Result};

/// How a module file stores its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    List(&'static DomainSpec),
    Mapping(&'static DomainSpec),
    Lovelace(&'static DomainSpec),
    Helpers,
}

impl FileKind {
    pub fn for_target(target: Target) -> Self {
        match target {
            Target::Helpers => Self::Helpers,
            Target::Domain(spec) => match spec.kind {
                DomainKind::List => Self::List(spec),
                DomainKind::Keyed => Self::Mapping(spec),
                DomainKind::ViewList => Self::Lovelace(spec),
            },
        }
    }

    pub fn target(&self) -> Target {
        match self {
            Self::List(spec) | Self::Mapping(spec) | Self::Lovelace(spec) => Target::Domain(spec),
            Self::Helpers => Target::Helpers,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::Mapping(_) => "mapping",
            Self::Lovelace(_) => "lovelace",
            Self::Helpers => "helpers",
        }
    }
}

pub(crate) fn is_yaml_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Validate a caller-supplied module path and normalize it.
///
/// # Errors
///
/// Rejects empty, absolute and non-YAML paths, `..` segments and paths
/// outside `packages/` and the module directories.
pub fn resolve_module_path(rel_path: &str) -> Result<String> {
    let trimmed = rel_path.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid("Module path must be a non-empty string."));
    }
    if Path::new(trimmed).is_absolute() || trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return Err(Error::invalid("Module path must be relative to the config directory."));
    }
    if has_parent_segment(trimmed) {
        return Err(Error::invalid("Module path cannot include parent directory segments."));
    }
    if !is_yaml_path(trimmed) {
        return Err(Error::invalid("Module path must point to a .yaml or .yml file."));
    }
    let normalized = normalize_relative(trimmed)
        .ok_or_else(|| Error::invalid("Module path must stay within the config directory."))?;
    let first = normalized.split('/').next().unwrap_or_default();
    if first != ConfigPath::PackagesDir.as_str() && !MODULE_BROWSER_DIRS.contains(&first) {
        return Err(Error::invalid(
            "Module path must live in packages or a YAML Modules domain folder.",
        ));
    }
    Ok(normalized)
}

/// Classify a normalized module path.
pub fn module_file_context(rel_path: &str) -> Result<FileKind> {
    let mut parts = rel_path.split('/');
    let first = parts.next().unwrap_or_default();
    let filename = rel_path.rsplit('/').next().unwrap_or_default();

    if first == ConfigPath::PackagesDir.as_str() {
        if filename == crate::registry::HELPERS_PACKAGE_FILENAME {
            return Ok(FileKind::Helpers);
        }
        let spec = spec_by_package_filename(filename)
            .ok_or_else(|| Error::unsupported("Unsupported package module filename."))?;
        return supported(spec);
    }
    if first == crate::registry::HELPERS_MODULE_DIR {
        return Ok(FileKind::Helpers);
    }
    match spec_by_module_dir(first) {
        Some(spec) => supported(spec),
        None => Err(Error::unsupported("Unsupported module path.")),
    }
}

fn supported(spec: &'static DomainSpec) -> Result<FileKind> {
    if spec.key == "template" {
        return Err(Error::unsupported("Template modules are not supported yet."));
    }
    Ok(FileKind::for_target(Target::Domain(spec)))
}

/// Validate a one-off filename, appending `.yaml` when it has no extension.
pub fn ensure_yaml_filename(name: &str) -> Result<String> {
    if name.contains('/') || name.contains('\\') {
        return Err(Error::invalid("One-off filename must be a simple filename."));
    }
    let candidate = name.trim();
    if candidate.is_empty() {
        return Err(Error::invalid("Filename is required."));
    }
    let candidate = if Path::new(candidate).extension().is_none() {
        format!("{}.yaml", candidate)
    } else {
        candidate.to_string()
    };
    if !is_yaml_path(&candidate) {
        return Err(Error::invalid("Filename must end with .yaml or .yml."));
    }
    Ok(candidate)
}
