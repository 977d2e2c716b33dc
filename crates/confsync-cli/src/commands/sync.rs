//! Sync, build, update and reconcile-ids command implementations
//!
//! These commands write files and hold the cycle lock while they run.

use colored::Colorize;

use confsync_core::SyncReport;
use confsync_core::registry::reload_domains;

use super::Context;
use super::output::{print_changed, print_header, print_json, print_warnings};
use crate::error::Result;

fn report_cycle(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    if report.status == "disabled" {
        println!(
            "{} YAML modules are disabled in .gitops/config.yaml.",
            "SKIPPED".yellow().bold()
        );
        return Ok(());
    }
    print_changed(&report.changed_files);
    let reloads = reload_domains(report.changed_files.iter().map(String::as_str));
    if !reloads.is_empty() {
        println!("{} reload {}", "=>".blue().bold(), reloads.join(", ").cyan());
    }
    print_warnings(&report.warnings);
    Ok(())
}

/// Run the sync command
///
/// Reconciles both sides, letting recorded hashes decide which side wins.
pub fn run_sync(ctx: &Context, json: bool) -> Result<()> {
    if !json {
        print_header("Synchronizing YAML modules...");
    }
    let _lock = ctx.lock()?;
    let report = ctx.engine.sync()?;
    report_cycle(&report, json)
}

/// Run the build command
pub fn run_build(ctx: &Context, json: bool) -> Result<()> {
    if !json {
        print_header("Building domain files from modules...");
    }
    let _lock = ctx.lock()?;
    let report = ctx.engine.build()?;
    report_cycle(&report, json)
}

/// Run the update command
pub fn run_update(ctx: &Context, json: bool) -> Result<()> {
    if !json {
        print_header("Updating modules from domain files...");
    }
    let _lock = ctx.lock()?;
    let report = ctx.engine.update()?;
    report_cycle(&report, json)
}

/// Run the reconcile-ids command
pub fn run_reconcile_ids(ctx: &Context, json: bool) -> Result<()> {
    let _lock = ctx.lock()?;
    let report = ctx.engine.reconcile_automation_ids()?;
    if json {
        return print_json(&report);
    }
    print_header("Reconciling automation ids...");
    if let Some(reason) = &report.reason {
        println!("{} {}", "SKIPPED".yellow().bold(), reason);
    } else if report.reconciled_ids.is_empty() {
        println!("{} Automation ids already match.", "OK".green().bold());
    } else {
        for reconciled in &report.reconciled_ids {
            println!(
                "   {} {} -> {} ({})",
                "~".cyan(),
                reconciled.old_id.dimmed(),
                reconciled.new_id.green(),
                reconciled.source
            );
        }
        print_changed(&report.changed_files);
    }
    print_warnings(&report.warnings);
    Ok(())
}
