use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Score local tasks and keep them in sync with a Notion database.
#[derive(Parser, Debug)]
#[command(name = "tasksync", about = "Task scoring and Notion sync")]
pub struct CliArgs {
    /// Config profile (overrides TASKSYNC_PROFILE)
    #[arg(long, global = true, env = "TASKSYNC_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score a JSON task file and print the ranking
    Score {
        /// JSON array of tasks
        file: PathBuf,

        /// Print scored tasks as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Reconcile a local task file with the remote database
    Sync(SyncArgs),

    /// Score and create tasks from a JSON file in the remote database
    Migrate {
        file: PathBuf,

        #[arg(long)]
        dry_run: bool,

        /// Tasks listed in the report ranking
        #[arg(long, default_value = "5")]
        top: usize,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Recompute scores for every task already in the remote database
    Rescore {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Remote database id (overrides NOTION_TASKS_DATABASE_ID)
    #[arg(long)]
    pub database_id: Option<String>,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Local JSON task file
    #[arg(long)]
    pub tasks: PathBuf,

    /// Keep running and sync on an interval until Ctrl-C
    #[arg(long, conflicts_with = "once")]
    pub watch: bool,

    /// Run a single cycle and exit (default)
    #[arg(long)]
    pub once: bool,

    /// Minutes between cycles in watch mode
    #[arg(long)]
    pub interval: Option<u64>,

    /// Conflict policy: local-wins, remote-wins or merge
    #[arg(long)]
    pub policy: Option<String>,

    #[command(flatten)]
    pub target: TargetArgs,
}
