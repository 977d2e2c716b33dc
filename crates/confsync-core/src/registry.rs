//! Domain registry
//!
//! Static description of every configuration domain the engine reconciles:
//! where its domain file and module files live, what shape its items have
//! and how items are identified.

use std::collections::BTreeSet;

use confsync_fs::{ConfigPath, ConfigRoot, Result};

/// Top-level shape of a domain's items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    /// A sequence of maps, optionally carrying an identity field
    List,
    /// A map from identity to item
    Keyed,
    /// A sequence of views, optionally wrapped as `{views: [...], ...meta}`
    ViewList,
}

/// Static description of one domain.
#[derive(Debug, PartialEq, Eq)]
pub struct DomainSpec {
    pub key: &'static str,
    pub domain_file: &'static str,
    pub module_dir: &'static str,
    pub package_filename: &'static str,
    pub kind: DomainKind,
    pub id_field: Option<&'static str>,
    pub auto_id: bool,
    pub reload_domain: Option<&'static str>,
    pub platform_includes: bool,
}

impl DomainSpec {
    /// Keys excluded from item fingerprints.
    pub fn exclude_keys(&self) -> &[&'static str] {
        self.id_field.as_slice()
    }

    /// Noun used for the domain's items in warnings.
    pub fn item_label(&self) -> &'static str {
        match self.kind {
            DomainKind::ViewList => "lovelace view",
            _ => self.key,
        }
    }

    /// Whether missing identities are derived from the item's alias.
    pub fn uses_alias_ids(&self) -> bool {
        self.key == "automation"
    }

    pub fn unassigned_path(&self) -> String {
        format!("{}/unassigned/{}", ConfigPath::PackagesDir, self.package_filename)
    }

    pub fn legacy_unassigned_path(&self) -> String {
        legacy_unassigned_path(self.module_dir)
    }

    /// Module files in discovery order: package bundles, then one-offs.
    pub fn module_files(&self, root: &ConfigRoot) -> Result<Vec<String>> {
        discover_module_files(root, self.package_filename, self.module_dir)
    }
}

pub static DOMAINS: [DomainSpec; 6] = [
    DomainSpec {
        key: "automation",
        domain_file: "automations.yaml",
        module_dir: "automations",
        package_filename: "automation.yaml",
        kind: DomainKind::List,
        id_field: Some("id"),
        auto_id: true,
        reload_domain: Some("automation"),
        platform_includes: false,
    },
    DomainSpec {
        key: "script",
        domain_file: "scripts.yaml",
        module_dir: "scripts",
        package_filename: "script.yaml",
        kind: DomainKind::Keyed,
        id_field: None,
        auto_id: false,
        reload_domain: Some("script"),
        platform_includes: false,
    },
    DomainSpec {
        key: "group",
        domain_file: "groups.yaml",
        module_dir: "groups",
        package_filename: "groups.yaml",
        kind: DomainKind::Keyed,
        id_field: None,
        auto_id: false,
        reload_domain: None,
        platform_includes: true,
    },
    DomainSpec {
        key: "scene",
        domain_file: "scenes.yaml",
        module_dir: "scenes",
        package_filename: "scene.yaml",
        kind: DomainKind::List,
        id_field: Some("id"),
        auto_id: true,
        reload_domain: Some("scene"),
        platform_includes: false,
    },
    DomainSpec {
        key: "template",
        domain_file: "templates.yaml",
        module_dir: "templates",
        package_filename: "template.yaml",
        kind: DomainKind::List,
        id_field: None,
        auto_id: false,
        reload_domain: Some("template"),
        platform_includes: false,
    },
    DomainSpec {
        key: "lovelace",
        domain_file: "ui-lovelace.yaml",
        module_dir: "lovelace",
        package_filename: "lovelace.yaml",
        kind: DomainKind::ViewList,
        id_field: Some("path"),
        auto_id: true,
        reload_domain: None,
        platform_includes: false,
    },
];

/// Helper types, in the order their sections are written.
pub static HELPER_TYPES: [&str; 9] = [
    "input_boolean",
    "input_button",
    "input_datetime",
    "input_number",
    "input_select",
    "input_text",
    "counter",
    "timer",
    "schedule",
];

pub const HELPERS_KEY: &str = "helpers";
pub const HELPERS_MODULE_DIR: &str = "helpers";
pub const HELPERS_PACKAGE_FILENAME: &str = "helpers.yaml";

/// Top-level directories that hold one-off module files.
pub static MODULE_BROWSER_DIRS: [&str; 7] = [
    "automations",
    "scripts",
    "groups",
    "scenes",
    "templates",
    "helpers",
    "lovelace",
];

/// What a reconciliation pass operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Domain(&'static DomainSpec),
    Helpers,
}

impl Target {
    /// Every target, in cycle order.
    pub fn all() -> impl Iterator<Item = Target> {
        DOMAINS.iter().map(Target::Domain).chain([Target::Helpers])
    }

    pub fn key(&self) -> &'static str {
        match self {
            Target::Domain(spec) => spec.key,
            Target::Helpers => HELPERS_KEY,
        }
    }

    /// Noun for one item in warnings, e.g. `lovelace view`.
    pub fn item_label(&self) -> &'static str {
        match self {
            Target::Domain(spec) => spec.item_label(),
            Target::Helpers => "helper",
        }
    }

    /// Noun for duplicate-identity warnings, e.g. `automation id`.
    pub fn duplicate_label(&self) -> String {
        match self {
            Target::Domain(spec) if spec.kind == DomainKind::ViewList => spec.item_label().to_string(),
            Target::Domain(spec) => format!("{} id", spec.key),
            Target::Helpers => "helper".to_string(),
        }
    }

    pub fn module_dir(&self) -> &'static str {
        match self {
            Target::Domain(spec) => spec.module_dir,
            Target::Helpers => HELPERS_MODULE_DIR,
        }
    }

    pub fn package_filename(&self) -> &'static str {
        match self {
            Target::Domain(spec) => spec.package_filename,
            Target::Helpers => HELPERS_PACKAGE_FILENAME,
        }
    }

    pub fn unassigned_path(&self) -> String {
        format!("{}/unassigned/{}", ConfigPath::PackagesDir, self.package_filename())
    }

    pub fn legacy_unassigned_path(&self) -> String {
        legacy_unassigned_path(self.module_dir())
    }

    pub fn module_files(&self, root: &ConfigRoot) -> Result<Vec<String>> {
        discover_module_files(root, self.package_filename(), self.module_dir())
    }
}

pub fn spec_by_key(key: &str) -> Option<&'static DomainSpec> {
    DOMAINS.iter().find(|spec| spec.key == key)
}

pub fn spec_by_package_filename(filename: &str) -> Option<&'static DomainSpec> {
    DOMAINS.iter().find(|spec| spec.package_filename == filename)
}

pub fn spec_by_module_dir(dir: &str) -> Option<&'static DomainSpec> {
    DOMAINS.iter().find(|spec| spec.module_dir == dir)
}

/// The registry's static name for a helper type.
pub fn helper_type(name: &str) -> Option<&'static str> {
    HELPER_TYPES.iter().copied().find(|helper| *helper == name)
}

pub fn helper_domain_file(helper_type: &str) -> String {
    format!("{}.yaml", helper_type)
}

/// Every domain file the engine writes, helpers included.
pub fn domain_paths() -> BTreeSet<String> {
    DOMAINS
        .iter()
        .map(|spec| spec.domain_file.to_string())
        .chain(HELPER_TYPES.iter().map(|helper| helper_domain_file(helper)))
        .collect()
}

pub(crate) fn legacy_unassigned_path(module_dir: &str) -> String {
    format!("{0}/{0}.unassigned.yaml", module_dir)
}

fn discover_module_files(
    root: &ConfigRoot,
    package_filename: &str,
    module_dir: &str,
) -> Result<Vec<String>> {
    let packages = ConfigPath::PackagesDir.as_str();
    let mut files: Vec<String> = root
        .list_dirs(packages)?
        .into_iter()
        .map(|package| format!("{}/{}/{}", packages, package, package_filename))
        .filter(|rel| root.is_file(rel))
        .collect();
    files.extend(root.list_files(module_dir, "*.y*ml")?);
    Ok(files)
}

/// Domains whose files appear among `paths`.
///
/// Helper types are reported by their own name, e.g. `input_boolean`.
pub fn changed_domains<'a>(paths: impl IntoIterator<Item = &'a str>) -> BTreeSet<&'static str> {
    let mut domains = BTreeSet::new();
    for path in paths {
        let lowered = path.to_lowercase();
        for spec in &DOMAINS {
            if lowered.ends_with(spec.domain_file)
                || lowered.starts_with(&format!("{}/", spec.module_dir))
            {
                domains.insert(spec.key);
            }
        }
        for helper in HELPER_TYPES {
            if lowered.ends_with(&helper_domain_file(helper)) {
                domains.insert(helper);
            }
        }
    }
    domains
}

/// Whether any of `paths` is a module file, a domain file or a helper file.
pub fn touches_managed_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> bool {
    paths.into_iter().any(|path| {
        let lowered = path.to_lowercase();
        let in_module_dir = MODULE_BROWSER_DIRS
            .iter()
            .copied()
            .chain([ConfigPath::PackagesDir.as_str()])
            .any(|dir| lowered.starts_with(&format!("{}/", dir)));
        in_module_dir
            || DOMAINS.iter().any(|spec| lowered.ends_with(spec.domain_file))
            || HELPER_TYPES
                .iter()
                .any(|helper| lowered.ends_with(&helper_domain_file(helper)))
    })
}

/// Platform domains to reload after `paths` were written.
///
/// Only domain files count; helper types reload under their own name.
pub fn reload_domains<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<&'static str> {
    let domain_files = domain_paths();
    let written = paths.into_iter().filter(|path| domain_files.contains(*path));
    changed_domains(written)
        .into_iter()
        .filter_map(|domain| match spec_by_key(domain) {
            Some(spec) => spec.reload_domain,
            None => helper_type(domain),
        })
        .collect()
}
