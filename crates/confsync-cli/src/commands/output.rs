//! Shared terminal output helpers

use colored::Colorize;
use serde::Serialize;

use crate::error::Result;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_header(message: &str) {
    println!("{} {}", "=>".blue().bold(), message);
}

pub fn print_changed(changed_files: &[String]) {
    if changed_files.is_empty() {
        println!("{} Nothing to change.", "OK".green().bold());
        return;
    }
    println!("{} {} file(s) changed:", "OK".green().bold(), changed_files.len());
    for path in changed_files {
        println!("   {} {}", "+".green(), path.cyan());
    }
}

pub fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("{} {} warning(s):", "WARN".yellow().bold(), warnings.len());
    for warning in warnings {
        println!("   {} {}", "!".yellow(), warning);
    }
}
