//! Command implementations for confsync-cli

pub mod check;
pub mod items;
pub mod output;
pub mod sync;

use std::path::Path;
use std::time::Duration;

use confsync_core::SyncEngine;
use confsync_fs::CycleLock;

use crate::error::Result;

pub use check::{run_modules, run_preview, run_validate};
pub use items::{
    run_items_delete, run_items_list, run_items_move, run_items_show, run_items_unassign,
    run_items_write,
};
pub use sync::{run_build, run_reconcile_ids, run_sync, run_update};

/// How long a mutating command waits for another cycle to finish.
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// The engine for the configuration directory a command runs against.
pub struct Context {
    pub engine: SyncEngine,
}

impl Context {
    pub fn open(config_dir: &Path) -> Result<Self> {
        Ok(Self {
            engine: SyncEngine::open(config_dir)?,
        })
    }

    /// Serialize mutating commands on the configuration directory.
    pub fn lock(&self) -> Result<CycleLock> {
        Ok(CycleLock::acquire(self.engine.root(), LOCK_TIMEOUT)?)
    }
}
