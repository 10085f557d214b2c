//! Command-line argument definitions using clap derive.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// repodeck - manage many local git repositories from one place
#[derive(Parser, Debug)]
#[command(name = "repodeck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (default: $XDG_CONFIG_HOME/repodeck/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Storage root to scan instead of the configured roots (repeatable)
    #[arg(long = "root", global = true, value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Concurrency flags shared by multi-repository commands
#[derive(Args, Debug, Clone, Default)]
pub struct ConcurrencyArgs {
    /// Number of repositories processed at once
    #[arg(short, long, value_name = "N", conflicts_with = "sequential")]
    pub jobs: Option<usize>,

    /// Process one repository at a time
    #[arg(long)]
    pub sequential: bool,
}

/// Repository selection: explicit keys, or every non-ignored repository
#[derive(Args, Debug, Clone, Default)]
pub struct Selection {
    /// Repository ids, names or owner/name pairs (default: all non-ignored)
    #[arg(value_name = "REPO")]
    pub repos: Vec<String>,

    /// Include ignored repositories when selecting all
    #[arg(long)]
    pub include_ignored: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List known repositories
    List {
        /// Include ignored repositories
        #[arg(long)]
        all: bool,
    },

    /// Scan storage roots and report newly found repositories
    Scan,

    /// Show branch, ahead/behind and changed files
    Status {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        concurrency: ConcurrencyArgs,
    },

    /// Stage a file
    Stage { repo: String, file: String },

    /// Unstage a file
    Unstage { repo: String, file: String },

    /// Stage a file with changes, or unstage a fully staged one
    Toggle { repo: String, file: String },

    /// Commit staged changes
    Commit {
        repo: String,
        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Switch to a local or remote branch
    Checkout { repo: String, branch: String },

    /// List local and remote branches
    Branches { repo: String },

    /// Push local commits to the upstream
    Push {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        concurrency: ConcurrencyArgs,
    },

    /// Fetch and merge upstream changes
    Pull {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        concurrency: ConcurrencyArgs,
    },

    /// Show the diff of one file
    Diff {
        repo: String,
        file: String,
        /// Diff the index against HEAD instead of the working tree against the index
        #[arg(long)]
        staged: bool,
    },

    /// Forget a repository (and delete its directory if configured)
    Delete { repo: String },

    /// Exclude a repository from "all" selections
    Ignore { repo: String },

    /// Undo `ignore`
    Unignore { repo: String },

    /// Run shell commands in each selected repository
    #[command(after_help = "\
EXAMPLES:
    # Run two commands in every repository, stopping each at its first failure
    repodeck exec -c 'git fetch' -c 'git status -sb'

    # Only in two repositories, one at a time
    repodeck exec --sequential -c 'cargo test' api web")]
    Exec {
        /// Command line to run (repeatable, run in order)
        #[arg(short = 'c', long = "command", value_name = "CMD", required = true)]
        commands: Vec<String>,
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        concurrency: ConcurrencyArgs,
    },

    /// Show recent GitHub Actions workflow runs
    Runs { repo: String },

    /// Open a pull request on GitHub
    Pr {
        repo: String,
        #[arg(long)]
        title: String,
        /// Branch with the changes (default: current branch)
        #[arg(long)]
        head: Option<String>,
        /// Branch to merge into
        #[arg(long, default_value = "main")]
        base: String,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        draft: bool,
    },

    /// Open an issue on GitHub
    Issue {
        repo: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: Option<String>,
        /// Label to apply (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,
    },
}
