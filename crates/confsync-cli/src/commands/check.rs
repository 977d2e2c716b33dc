//! Read-only commands: preview, validate and the module index

use colored::Colorize;

use confsync_core::FileDiff;

use super::Context;
use super::output::{print_header, print_json, print_warnings};
use crate::error::{CliError, Result};

fn print_diffs(title: &str, diffs: &[FileDiff]) {
    if diffs.is_empty() {
        return;
    }
    println!("{} {} ({})", "##".blue().bold(), title, diffs.len());
    for diff in diffs {
        for line in diff.diff.lines() {
            if line.starts_with("+++") || line.starts_with("---") || line.starts_with("diff ") {
                println!("{}", line.bold());
            } else if line.starts_with('+') {
                println!("{}", line.green());
            } else if line.starts_with('-') {
                println!("{}", line.red());
            } else if line.starts_with("@@") {
                println!("{}", line.cyan());
            } else {
                println!("{}", line);
            }
        }
    }
}

/// Run the preview command
pub fn run_preview(ctx: &Context, json: bool) -> Result<()> {
    let report = ctx.engine.preview()?;
    if json {
        return print_json(&report);
    }
    print_header("Previewing sync...");
    if report.build_diffs.is_empty() && report.update_diffs.is_empty() {
        println!("{} Modules and domain files are in sync.", "OK".green().bold());
    }
    print_diffs("Domain files", &report.build_diffs);
    print_diffs("Module files", &report.update_diffs);
    print_warnings(&report.warnings);
    Ok(())
}

/// Run the validate command
///
/// Fails when the dry run reports errors or warnings.
pub fn run_validate(ctx: &Context, json: bool) -> Result<()> {
    let report = ctx.engine.validate()?;
    if json {
        print_json(&report)?;
    } else {
        print_header("Validating YAML modules...");
        for error in &report.errors {
            println!("   {} {}", "x".red().bold(), error);
        }
        print_warnings(&report.warnings);
        println!();
        println!(
            "Build would change {} file(s); update would change {} file(s).",
            report.build.count, report.update.count
        );
    }
    if report.has_issues() {
        return Err(CliError::user(format!(
            "validation found {} error(s) and {} warning(s)",
            report.summary.errors, report.summary.warnings
        )));
    }
    if !json {
        println!("{} No issues found.", "OK".green().bold());
    }
    Ok(())
}

/// Run the modules command
pub fn run_modules(ctx: &Context, json: bool) -> Result<()> {
    let index = ctx.engine.list_module_index()?;
    if json {
        return print_json(&index);
    }
    if index.modules.is_empty() {
        println!("No module files found.");
        return Ok(());
    }
    for module in &index.modules {
        println!("{} {}", module.kind.dimmed(), module.name.bold());
        for file in &module.files {
            println!("   {}", file.cyan());
        }
    }
    Ok(())
}
