//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// confsync - Keep Home Assistant YAML modules and domain files in sync
#[derive(Parser, Debug)]
#[command(name = "confsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Home Assistant configuration directory
    #[arg(long, global = true, env = "HASS_CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Reconcile module files and domain files in both directions
    Sync {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Regenerate domain files from module files
    Build {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Pull domain file edits back into module files
    Update {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show the diffs a sync would apply
    Preview {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Dry-run every domain and report problems
    ///
    /// Exits with status 1 when errors or warnings are found.
    Validate {
        /// Output as JSON for CI/CD integration
        #[arg(long)]
        json: bool,
    },

    /// Adopt automation ids written by Home Assistant into module files
    ReconcileIds {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List module files grouped by package
    Modules {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Inspect and edit single items of a module file
    Items {
        #[command(subcommand)]
        action: ItemsAction,
    },
}

/// Selects items of a module file.
///
/// List and dashboard files select by `--id` and/or `--fingerprint`, keyed
/// files by `--key`, helper files by `--helper-type` and `--key`.
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorArgs {
    /// Item id (repeatable)
    #[arg(long = "id")]
    pub ids: Vec<String>,

    /// Item fingerprint
    #[arg(long)]
    pub fingerprint: Option<String>,

    /// Map or helper key (repeatable)
    #[arg(long = "key")]
    pub keys: Vec<String>,

    /// Helper type, e.g. input_boolean
    #[arg(long)]
    pub helper_type: Option<String>,
}

/// Item actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ItemsAction {
    /// List the items of a module file
    List {
        /// Module file, relative to the configuration directory
        path: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Print one item as YAML
    Show {
        /// Module file, relative to the configuration directory
        path: String,

        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Replace one item with YAML read from a file
    Write {
        /// Module file, relative to the configuration directory
        path: String,

        #[command(flatten)]
        selector: SelectorArgs,

        /// File holding the new item YAML
        #[arg(long)]
        from: PathBuf,
    },

    /// Remove items from a module file and from the domain file
    Delete {
        /// Module file, relative to the configuration directory
        path: String,

        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Move items into the domain's unassigned bundle
    Unassign {
        /// Module file, relative to the configuration directory
        path: String,

        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Move items into a package or a one-off module file
    ///
    /// Examples:
    ///   confsync items move automations/a.yaml --id porch --package outdoor
    ///   confsync items move automations/a.yaml --id porch --package garden --new
    ///   confsync items move scripts/a.yaml --key reset --one-off maintenance
    Move {
        /// Module file, relative to the configuration directory
        path: String,

        #[command(flatten)]
        selector: SelectorArgs,

        /// Destination package
        #[arg(long, conflicts_with = "one_off", required_unless_present = "one_off")]
        package: Option<String>,

        /// Create the package when it does not exist
        #[arg(long, requires = "package")]
        new: bool,

        /// Destination one-off filename in the domain's module directory
        #[arg(long)]
        one_off: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_sync_with_config_dir() {
        let cli = Cli::try_parse_from(["confsync", "--config-dir", "/config", "sync"]).unwrap();
        assert_eq!(cli.config_dir, PathBuf::from("/config"));
        assert_eq!(cli.command, Some(Commands::Sync { json: false }));
    }

    #[test]
    fn parse_items_move_to_new_package() {
        let cli = Cli::try_parse_from([
            "confsync",
            "items",
            "move",
            "automations/a.yaml",
            "--id",
            "porch",
            "--id",
            "garage",
            "--package",
            "outdoor",
            "--new",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Items {
                action:
                    ItemsAction::Move {
                        path,
                        selector,
                        package,
                        new,
                        one_off,
                    },
            }) => {
                assert_eq!(path, "automations/a.yaml");
                assert_eq!(selector.ids, vec!["porch", "garage"]);
                assert_eq!(package.as_deref(), Some("outdoor"));
                assert!(new);
                assert_eq!(one_off, None);
            }
            other => panic!("Expected items move, got {:?}", other),
        }
    }

    #[test]
    fn move_requires_a_destination() {
        let result = Cli::try_parse_from(["confsync", "items", "move", "scripts/a.yaml", "--key", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn move_rejects_two_destinations() {
        let result = Cli::try_parse_from([
            "confsync",
            "items",
            "move",
            "scripts/a.yaml",
            "--key",
            "x",
            "--package",
            "p",
            "--one-off",
            "f",
        ]);
        assert!(result.is_err());
    }
}
