//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

use crate::domain::{GlobalKey, GroupKey};

/// Clone hierarchical menu link trees into a new group
#[derive(Parser, Debug)]
#[command(name = "linkclone")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity: -v info, -vv debug, -vvv trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Extra config file layered over the global config
    #[arg(long = "config", global = true, value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    /// Link store (overrides configured store_path)
    #[arg(long, global = true, env = "LINKCLONE_STORE", value_hint = ValueHint::FilePath)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clone all links of a group into a new group
    Clone {
        /// Group to copy from
        source: GroupKey,
        /// Group to copy into
        target: GroupKey,
        /// Display name of the target group used in messages
        #[arg(long)]
        label: Option<String>,
        /// Show what would be created without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether a group has links
    Check {
        group: GroupKey,
    },

    /// List links of a group
    List {
        group: GroupKey,
    },

    /// Show links of a group as a tree
    Tree {
        group: GroupKey,
    },

    /// Add a link to a group
    Add {
        group: GroupKey,
        /// Link title
        title: String,
        /// Link target
        #[arg(long, default_value = "internal:/")]
        uri: String,
        /// Global key of the parent link
        #[arg(long)]
        parent: Option<GlobalKey>,
        /// Sort weight among siblings
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        weight: i64,
        /// Show children expanded
        #[arg(long)]
        expanded: bool,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Show config file locations
    Path,
    /// Print a commented config template
    Template,
}
