mod checkpoints;
mod cli;
mod context;
mod plan;
mod progress;
mod run;

use clap::Parser;
use cli::{Cli, Commands};
use context::AppContext;
use eyre::Result;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(dir) = &cli.config_dir {
        shuttle_core::config::set_config_dir(dir);
    }
    let ctx = AppContext::load(cli.connections.as_deref())?;

    match &cli.command {
        Commands::Plan(args) => plan::run_plan(&ctx, args)?,
        Commands::Run(args) => run::run_sync(&ctx, args)?,
        Commands::Checkpoint { command } => checkpoints::run_checkpoint(&ctx, command)?,
    }

    Ok(())
}
