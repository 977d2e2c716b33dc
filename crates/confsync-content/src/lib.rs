//! YAML content handling for confsync
//!
//! - [`yaml`]: parse and render documents while keeping `!tag` nodes intact
//! - [`expand`]: resolve template fragments and platform include tags
//! - [`fingerprint`]: content hashes that ignore key order and identity fields
//! - [`diff`]: unified diffs for preview output and template edit artifacts

pub mod diff;
pub mod error;
pub mod expand;
pub mod fingerprint;
pub mod yaml;

pub use diff::unified_diff;
pub use error::{Error, Result};
pub use expand::{ExpandOptions, Expander, template_candidates};
pub use fingerprint::{fingerprint, normalize};
pub use yaml::{
    PLATFORM_INCLUDE_TAGS, YamlDocument, contains_template_tags, deep_merge, is_template_tag,
    load_document, parse_document, render, scalar_string, sequence_item_lines, tag_line,
};
