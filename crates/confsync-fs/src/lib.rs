//! Filesystem layer for confsync
//!
//! Scopes every read and write to a configuration directory, and provides
//! atomic writes, checksums, format-agnostic settings files and the advisory
//! lock that serializes reconciliation cycles.

pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod lock;
pub mod path;
pub mod root;

pub use config::ConfigStore;
pub use constants::ConfigPath;
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use lock::CycleLock;
pub use path::{NormalizedPath, has_parent_segment, normalize_relative};
pub use root::ConfigRoot;
