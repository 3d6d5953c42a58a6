//! Tail a stream from the ledger into a file or stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use ledgercast_ledger::RpcLedgerClient;
use ledgercast_node::SessionConfig;
use ledgercast_viewer::{ChannelSink, ReaderConfig, ReaderEvent, TailingReader};

#[derive(Debug, Parser)]
#[command(about = "Tail a stream from the ledger and write it to a file or stdout")]
pub struct Opts {
    /// Path to the session configuration file
    #[clap(long)]
    config: PathBuf,

    /// Output file; defaults to stdout (pipe into a media player)
    #[clap(long)]
    out: Option<PathBuf>,
}

pub async fn run(opts: &Opts) -> Result<()> {
    let config = SessionConfig::from_filepath(&opts.config)?;
    let creds = config.credentials()?;
    let ledger = Arc::new(RpcLedgerClient::new(&creds));

    let (sink, mut payload_rx) = ChannelSink::new(8);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let reader = TailingReader::new(
        ledger,
        Arc::new(sink),
        ReaderConfig {
            stream: config.stream.clone(),
            poll_interval: config.poll_interval(),
            lookback: config.lookback(),
        },
    )
    .with_events(events_tx);

    let mut out: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = match &opts.out {
        Some(path) => Box::new(tokio::fs::File::create(path).await?),
        None => Box::new(tokio::io::stdout()),
    };

    reader.start();
    log::info!("Watching '{}'; press Ctrl-C to stop", config.stream);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            payload = payload_rx.recv() => match payload {
                Some(payload) => {
                    out.write_all(&payload).await?;
                    out.flush().await?;
                }
                None => break,
            },
            event = events_rx.recv() => {
                if let Some(event) = event {
                    report(event);
                }
            }
        }
    }

    reader.stop();
    Ok(())
}

fn report(event: ReaderEvent) {
    match event {
        ReaderEvent::Delivered { index, size } => {
            log::debug!("Chunk {} delivered ({} bytes)", index, size)
        }
        ReaderEvent::Skipped { index, reason } => {
            log::warn!("Chunk {} skipped: {}", index, reason)
        }
        ReaderEvent::SinkStalled { index, reason } => {
            log::debug!("Sink stalled at chunk {}: {}", index, reason)
        }
    }
}
