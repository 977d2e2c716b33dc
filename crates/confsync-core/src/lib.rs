//! Reconciliation engine for YAML module files
//!
//! Home Assistant reads one file per domain (`automations.yaml`,
//! `scripts.yaml`, ...). Users keep the same items split across module files
//! under `packages/<name>/` and per-domain directories. This crate keeps both
//! sides consistent:
//!
//! - **Registry**: the managed domains, their file layout and identity rules
//! - **Engine**: per-domain reconciliation driven by recorded hashes and a
//!   `modules` / `domain` / `mixed` preference
//! - **Template merge**: domain-side edits to templated items become `.diff`
//!   proposals next to the template instead of overwriting it
//! - **Items**: selector-based reading, editing, moving and deleting of
//!   single items, and a browser index of module files
//!
//! # Example
//!
//! ```ignore
//! use confsync_core::{Result, SyncEngine};
//!
//! fn example() -> Result<()> {
//!     let engine = SyncEngine::open("/config")?;
//!     let report = engine.sync()?;
//!     println!("{} files changed", report.changed_files.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod item;
pub mod items;
pub mod mapping;
pub mod parse;
pub mod preference;
mod reconcile_ids;
pub mod registry;
pub mod report;
pub mod state;
pub mod template_merge;
pub mod unassigned;
mod validate;

pub use config::{EngineConfig, Settings};
pub use engine::SyncEngine;
pub use error::{Error, Result};
pub use item::{Catalog, ModuleItem};
pub use items::{FileKind, ItemOperation, ItemRef, ItemSelector, MoveTarget};
pub use mapping::{MappingEntry, MappingFile};
pub use preference::{Preference, WriteMode};
pub use registry::{DOMAINS, DomainKind, DomainSpec, HELPER_TYPES, Target};
pub use report::{
    DomainReport, FileDiff, ItemList, ItemSaved, ItemSummary, ItemText, ModuleEntry, ModuleFile,
    ModuleFileStatus, ModuleIndex, OperationReport, PlanReport, PreviewReport, ReconcileReport,
    ReconciledId, Summary, SyncReport, ValidationReport,
};
pub use state::{DomainState, SyncState};
