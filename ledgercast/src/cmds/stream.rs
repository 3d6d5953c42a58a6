//! Capture and publish a stream to the ledger.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;

use ledgercast_ledger::RpcLedgerClient;
use ledgercast_node::{SessionConfig, SessionEvent, SessionManager};

#[derive(Debug, Parser)]
#[command(about = "Capture and publish a stream to the ledger")]
pub struct Opts {
    /// Path to the session configuration file
    #[clap(long)]
    config: PathBuf,
}

pub async fn run(opts: &Opts) -> Result<()> {
    let config = SessionConfig::from_filepath(&opts.config)?;
    let creds = config.credentials()?;
    let ledger = Arc::new(RpcLedgerClient::new(&creds));

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let manager = SessionManager::new(ledger, events_tx);
    manager.start_session(&config).await?;
    log::info!("Streaming '{}'; press Ctrl-C to stop", config.stream);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events_rx.recv() => match event {
                Some(event) => report(event),
                None => break,
            }
        }
    }

    manager.stop_session().await;
    log::info!("Streaming stopped");
    Ok(())
}

fn report(event: SessionEvent) {
    match event {
        SessionEvent::Log(line) => log::debug!("{}", line),
        SessionEvent::ChunkDetected(path) => log::debug!("New chunk {}", path.display()),
        SessionEvent::ChunkCommitted {
            index,
            size,
            confirmation,
        } => log::info!(
            "Committed chunk {} ({} bytes, confirmation {})",
            index,
            size,
            confirmation
        ),
        // The file stays on disk; re-enqueueing it is a deliberate
        // operator decision, not something we do implicitly.
        SessionEvent::ChunkFailed { filename, reason } => {
            log::warn!("Failed to upload {}: {}", filename, reason)
        }
        SessionEvent::EncoderExited { status } => {
            log::warn!("Encoder exited (status {:?})", status)
        }
        SessionEvent::Error(message) => log::error!("{}", message),
    }
}
