//! Ledger connectivity probe.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use ledgercast_ledger::{LedgerClient, RpcLedgerClient};
use ledgercast_node::SessionConfig;

#[derive(Debug, Parser)]
#[command(about = "Check ledger connectivity")]
pub struct Opts {
    /// Path to the session configuration file
    #[clap(long)]
    config: PathBuf,

    #[clap(long, default_value = "1")]
    times: u32,
}

pub async fn run(opts: &Opts) -> Result<()> {
    let config = SessionConfig::from_filepath(&opts.config)?;
    let creds = config.credentials()?;
    let ledger = RpcLedgerClient::new(&creds);

    let start = Instant::now();
    for _ in 0..opts.times {
        let latest = ledger.latest_index().await?;
        log::info!(
            "Ledger reachable; stream '{}' has {} committed chunk(s)",
            config.stream,
            latest
        );
    }
    let duration = start.elapsed();
    log::info!("Time taken to ping {} times: {:?}", opts.times, duration);

    Ok(())
}
