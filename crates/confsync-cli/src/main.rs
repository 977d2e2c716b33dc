//! confsync CLI
//!
//! Command-line interface for reconciling Home Assistant YAML module files
//! with the domain files Home Assistant reads.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands, ItemsAction};
use commands::Context;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(cmd) => execute_command(&Context::open(&cli.config_dir)?, cmd),
        None => {
            println!(
                "{} Home Assistant YAML module sync",
                "confsync".green().bold()
            );
            println!();
            println!("Run {} for available commands.", "confsync --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(ctx: &Context, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Sync { json } => commands::run_sync(ctx, json),
        Commands::Build { json } => commands::run_build(ctx, json),
        Commands::Update { json } => commands::run_update(ctx, json),
        Commands::Preview { json } => commands::run_preview(ctx, json),
        Commands::Validate { json } => commands::run_validate(ctx, json),
        Commands::ReconcileIds { json } => commands::run_reconcile_ids(ctx, json),
        Commands::Modules { json } => commands::run_modules(ctx, json),
        Commands::Items { action } => execute_items(ctx, action),
    }
}

fn execute_items(ctx: &Context, action: ItemsAction) -> Result<()> {
    match action {
        ItemsAction::List { path, json } => commands::run_items_list(ctx, &path, json),
        ItemsAction::Show { path, selector } => commands::run_items_show(ctx, &path, &selector),
        ItemsAction::Write {
            path,
            selector,
            from,
        } => commands::run_items_write(ctx, &path, &selector, &from),
        ItemsAction::Delete { path, selector } => commands::run_items_delete(ctx, &path, &selector),
        ItemsAction::Unassign { path, selector } => {
            commands::run_items_unassign(ctx, &path, &selector)
        }
        ItemsAction::Move {
            path,
            selector,
            package,
            new,
            one_off,
        } => commands::run_items_move(ctx, &path, &selector, package, new, one_off),
    }
}
