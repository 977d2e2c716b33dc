//! Reconciliation engine
//!
//! A cycle runs every domain, then the helpers, against one loaded
//! [`SyncState`]. Each target pass parses both sides, resolves which side
//! wins, writes what changed and records the new hashes.

mod helpers;
mod keyed;
mod list;
mod resolve;
mod view_list;
mod writer;

use std::collections::BTreeMap;
use std::path::Path;

use confsync_fs::ConfigRoot;
use tracing::{debug, info, warn};

pub use writer::{Writer, is_empty_payload};

use crate::config::EngineConfig;
use crate::preference::{Preference, WriteMode};
use crate::registry::{DomainKind, Target};
use crate::report::SyncReport;
use crate::state::SyncState;
use crate::unassigned::ensure_unassigned;
use crate::Result;

/// One pass over some targets with a fixed preference override and write mode.
pub(crate) struct Cycle<'a> {
    root: &'a ConfigRoot,
    writer: Writer<'a>,
    state: &'a mut SyncState,
    preference: Option<Preference>,
    mode: WriteMode,
}

impl<'a> Cycle<'a> {
    pub(crate) fn new(root: &'a ConfigRoot, state: &'a mut SyncState, preview: bool) -> Self {
        Self {
            root,
            writer: Writer::new(root, preview),
            state,
            preference: None,
            mode: WriteMode::All,
        }
    }

    pub(crate) fn with_plan(mut self, preference: Option<Preference>, mode: WriteMode) -> Self {
        self.preference = preference;
        self.mode = mode;
        self
    }

    /// Recorded writes of a preview cycle.
    pub(crate) fn into_preview(self) -> BTreeMap<String, String> {
        self.writer.into_preview()
    }

    /// Run every target in order. Returns the files that changed.
    pub(crate) fn run_all(&mut self, warnings: &mut Vec<String>) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        for target in Target::all() {
            changed.extend(self.run_target(target, warnings)?);
        }
        Ok(changed)
    }

    pub(crate) fn run_target(&mut self, target: Target, warnings: &mut Vec<String>) -> Result<Vec<String>> {
        let unassigned = ensure_unassigned(self.root, target, self.writer.is_preview(), warnings)?;
        debug!(target = target.key(), preview = self.writer.is_preview(), "reconciling target");
        match target {
            Target::Helpers => self.sync_helpers(&unassigned, warnings),
            Target::Domain(spec) => match spec.kind {
                DomainKind::List => self.sync_list(spec, &unassigned, warnings),
                DomainKind::Keyed => self.sync_keyed(spec, &unassigned, warnings),
                DomainKind::ViewList => self.sync_view_list(spec, &unassigned, warnings),
            },
        }
    }
}

/// Entry point for every engine operation.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    config: EngineConfig,
}

impl SyncEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Open a configuration directory with its settings.
    pub fn open(config_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(EngineConfig::load(config_dir)?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn root(&self) -> &ConfigRoot {
        self.config.root()
    }

    pub(crate) fn enabled(&self) -> bool {
        self.config.settings().yaml_modules_enabled
    }

    /// Reconcile both sides, letting each target's preference decide.
    pub fn sync(&self) -> Result<SyncReport> {
        self.run_cycle("synced", None, WriteMode::All)
    }

    /// Regenerate domain files from module files.
    pub fn build(&self) -> Result<SyncReport> {
        self.run_cycle("built", Some(Preference::Modules), WriteMode::Domain)
    }

    /// Pull domain file edits back into module files.
    pub fn update(&self) -> Result<SyncReport> {
        self.run_cycle("updated", Some(Preference::Domain), WriteMode::Modules)
    }

    fn run_cycle(
        &self,
        status: &str,
        preference: Option<Preference>,
        mode: WriteMode,
    ) -> Result<SyncReport> {
        if !self.enabled() {
            debug!(status, "module reconciliation disabled in settings");
            return Ok(SyncReport::new("disabled", Vec::new(), Vec::new()));
        }
        let root = self.root();
        let mut warnings = Vec::new();
        let mut state = SyncState::load(root, &mut warnings)?;
        let changed = Cycle::new(root, &mut state, false)
            .with_plan(preference, mode)
            .run_all(&mut warnings)?;
        if state.save(root)? {
            debug!("sync state updated");
        }
        for warning in &warnings {
            warn!("{}", warning);
        }
        let report = SyncReport::new(status, changed, warnings);
        info!(
            status,
            changed = report.changed_files.len(),
            warnings = report.warnings.len(),
            "cycle finished"
        );
        Ok(report)
    }
}
