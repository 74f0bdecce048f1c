//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};

/// Root system architecture: RSML parsing, node-chain geometry and phenotyping statistics
#[derive(Parser, Debug)]
#[command(name = "rootarch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity: -d info, -dd debug, -ddd trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Directory holding a local .rootarch.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    /// Output format for reports
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned columns for the terminal
    Table,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Whole-image summary of a document
    Stats {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// One row per root
    Roots {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// One row per node
    Nodes {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Marks with origin and length rows per root
    Marks {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Branching hierarchy as a tree
    Tree {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Convex hull polygon of all roots (cm)
    Hull {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Summarise every document in a directory
    Batch {
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
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
    /// Show merged config
    Show,

    /// Show config paths
    Path,

    /// Print a commented config template
    Template,
}
