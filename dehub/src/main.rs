use anyhow::Result;
use clap::Parser;
use tracing::info;

mod cli;
mod commands;
mod config;
mod logging;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    cli.log_format = cli.log_format.or(config.log_format);
    logging::init_logging(&cli);

    info!("dehub starting");
    match cli.command {
        Commands::Hub(args) => commands::hub::run(args, config).await,
        Commands::Servant(args) => commands::servant::run_command(args, config).await,
        Commands::Master(args) => commands::master::run(args, config).await,
    }
}
