//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for the
//! per-domain change detection recorded in the sync state.

use sha2::{Digest, Sha256};

use crate::{ConfigRoot, Result};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of string content.
pub fn compute_content_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Checksum of a file under the root. Missing files hash as empty text.
pub fn file_checksum(root: &ConfigRoot, rel_path: &str) -> Result<String> {
    Ok(compute_content_checksum(&root.read(rel_path)?))
}

/// Combined checksum over a set of files.
///
/// Paths are visited in sorted order and each contributes
/// `rel_path \0 content \0`, so renaming a file changes the result even when
/// its content does not.
pub fn combined_checksum<'a>(
    root: &ConfigRoot,
    rel_paths: impl IntoIterator<Item = &'a str>,
) -> Result<String> {
    let mut paths: Vec<&str> = rel_paths.into_iter().collect();
    paths.sort_unstable();
    paths.dedup();

    let mut hasher = Sha256::new();
    for rel_path in paths {
        hasher.update(rel_path.as_bytes());
        hasher.update(b"\0");
        hasher.update(root.read(rel_path)?.as_bytes());
        hasher.update(b"\0");
    }
    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}
