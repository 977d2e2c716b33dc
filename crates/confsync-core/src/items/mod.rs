//! Item-level editing of module files
//!
//! Selectors address single items inside a module file. Edits are validated
//! and computed in memory, written, and followed by a sync.

pub(crate) mod context;
pub(crate) mod edit;
mod index;
mod ops;
mod selector;

pub use context::{FileKind, ensure_yaml_filename, module_file_context, resolve_module_path};
pub use selector::{ItemOperation, ItemRef, ItemSelector, MoveTarget};
