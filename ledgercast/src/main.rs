mod cmds;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ledgercast")]
#[command(version = "0.1.0")]
#[command(about = "Livestream over an append-only ledger", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Stream(cmds::stream::Opts),
    Watch(cmds::watch::Opts),
    Ping(cmds::ping::Opts),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    match &cli.command {
        Commands::Stream(opts) => cmds::stream::run(opts).await?,
        Commands::Watch(opts) => cmds::watch::run(opts).await?,
        Commands::Ping(opts) => cmds::ping::run(opts).await?,
    }

    Ok(())
}
