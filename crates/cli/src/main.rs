mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use tasksync_core::config::{load_dotenv, Config};

use crate::cli::{CliArgs, Command};
use crate::commands::App;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let config = match args.profile.as_deref() {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    config.log_summary();

    let app = App::new(config);
    match &args.command {
        Command::Score { file, json } => app.score(file, *json).await,
        Command::Sync(sync) => app.sync(sync).await,
        Command::Migrate {
            file,
            dry_run,
            top,
            target,
        } => app.migrate(file, *dry_run, *top, target).await,
        Command::Rescore { target } => app.rescore(target).await,
    }
}
