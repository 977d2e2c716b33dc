//! Well-known locations inside a configuration directory.

use std::path::Path;

/// Reserved paths relative to the configuration root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPath {
    /// The `.gitops` bookkeeping directory
    GitopsDir,
    /// Per-domain identity mappings
    MappingsDir,
    /// Last-observed domain and module hashes
    SyncState,
    /// Engine settings
    Settings,
    /// Advisory lock serializing cycles
    CycleLock,
    /// Per-package module bundles
    PackagesDir,
}

impl ConfigPath {
    /// Get the string representation of the path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitopsDir => ".gitops",
            Self::MappingsDir => ".gitops/mappings",
            Self::SyncState => ".gitops/sync-state.yaml",
            Self::Settings => ".gitops/config.yaml",
            Self::CycleLock => ".gitops/.lock",
            Self::PackagesDir => "packages",
        }
    }
}

impl AsRef<Path> for ConfigPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for ConfigPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
