//! Session lifecycle.
//!
//! A `Session` is created, runs, and is stopped; nothing about it lives
//! in process-wide state. The `SessionManager` enforces the control
//! surface contract: starting while a session is active is rejected, and
//! stopping tears down the encoder and watcher while letting an in-flight
//! submission finish or fail cleanly.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use ledgercast_ledger::LedgerClient;
use ledgercast_sequencer::{ChunkWatcher, Sequencer, SequencerConfig, WatcherConfig};

use crate::config::SessionConfig;
use crate::encoder::{Encoder, EncoderConfig};
use crate::error::SessionError;
use crate::events::{EventSender, SessionEvent};

const CHUNK_EXTENSION: &str = "mp4";

pub struct Session<L: LedgerClient + 'static> {
    sequencer: Sequencer<L>,
    watcher: ChunkWatcher,
    cancel: CancellationToken,
    stream: String,
}

impl<L: LedgerClient + 'static> Session<L> {
    /// Start a session: verify connectivity, claim the staging directory,
    /// resynchronize the sequence counter, then bring up the watcher,
    /// upload pump and (if a device is configured) the encoder.
    pub async fn start(
        ledger: Arc<L>,
        config: &SessionConfig,
        events: EventSender,
    ) -> Result<Self, SessionError> {
        // Fail fast on an unreachable ledger instead of discovering it
        // mid-stream.
        if let Err(e) = ledger.latest_index().await {
            return Err(SessionError::Connectivity(e.to_string()));
        }

        let chunks_dir = config.chunks_dir();
        tokio::fs::create_dir_all(&chunks_dir).await?;
        clear_stale_chunks(&chunks_dir).await?;

        let sequencer = Sequencer::connect(
            ledger,
            SequencerConfig {
                stream: config.stream.clone(),
                pass_delay: config.pass_delay(),
            },
        )
        .await?;

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let watcher = ChunkWatcher::spawn(
            WatcherConfig {
                dir: chunks_dir.clone(),
                extension: CHUNK_EXTENSION.to_string(),
                scan_interval: config.scan_interval(),
            },
            chunk_tx,
        );

        let cancel = CancellationToken::new();
        spawn_upload_pump(sequencer.clone(), chunk_rx, events.clone(), cancel.clone());

        if let Some(device) = config.device.clone() {
            let encoder = Encoder::spawn(
                &EncoderConfig {
                    ffmpeg_path: config.ffmpeg_path(),
                    input_format: config.input_format(),
                    device,
                    chunks_dir,
                    segment_secs: config.segment_secs(),
                    video_bitrate_kbps: config.video_bitrate_kbps(),
                },
                events.clone(),
            )?;
            spawn_encoder_monitor(encoder, events.clone(), cancel.clone());
        }

        let _ = events.send(SessionEvent::Log(format!(
            "Session for '{}' started",
            config.stream
        )));
        Ok(Self {
            sequencer,
            watcher,
            cancel,
            stream: config.stream.clone(),
        })
    }

    pub fn sequencer(&self) -> &Sequencer<L> {
        &self.sequencer
    }

    /// Tear the session down. The encoder and watcher stop immediately;
    /// an in-flight submission finishes or fails cleanly so the sequence
    /// counter is never left desynchronized.
    pub async fn stop(self) {
        log::info!("Stopping session for '{}'", self.stream);
        self.cancel.cancel();
        self.watcher.stop();
        self.sequencer.shutdown();
    }
}

/// Pump watcher detections into the sequencer and ticket resolutions into
/// session events.
fn spawn_upload_pump<L: LedgerClient + 'static>(
    sequencer: Sequencer<L>,
    mut chunk_rx: mpsc::UnboundedReceiver<std::path::PathBuf>,
    events: EventSender,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let path = tokio::select! {
                _ = cancel.cancelled() => break,
                path = chunk_rx.recv() => match path {
                    Some(path) => path,
                    None => break,
                },
            };

            let _ = events.send(SessionEvent::ChunkDetected(path.clone()));
            let ticket = sequencer.enqueue(path).await;
            let events = events.clone();
            tokio::spawn(async move {
                match ticket.wait().await {
                    Ok(receipt) => {
                        let _ = events.send(SessionEvent::ChunkCommitted {
                            index: receipt.index,
                            size: receipt.size,
                            confirmation: receipt.confirmation,
                        });
                    }
                    Err(failure) => {
                        let _ = events.send(SessionEvent::ChunkFailed {
                            filename: failure.filename,
                            reason: failure.error.to_string(),
                        });
                    }
                }
            });
        }
        log::debug!("Upload pump stopped");
    });
}

fn spawn_encoder_monitor(mut encoder: Encoder, events: EventSender, cancel: CancellationToken) {
    tokio::spawn(async move {
        let status = tokio::select! {
            _ = cancel.cancelled() => None,
            status = encoder.wait() => Some(status),
        };
        match status {
            None => encoder.stop().await,
            Some(result) => {
                let code = result.ok().and_then(|s| s.code());
                log::warn!("Encoder exited on its own (status {:?})", code);
                let _ = events.send(SessionEvent::EncoderExited { status: code });
            }
        }
    });
}

/// Remove leftover segments from a previous run so they are not replayed
/// into the new session's stream.
async fn clear_stale_chunks(dir: &Path) -> std::io::Result<()> {
    let mut removed = 0usize;
    let mut rd = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(CHUNK_EXTENSION) {
            tokio::fs::remove_file(&path).await?;
            removed += 1;
        }
    }
    if removed > 0 {
        log::info!("Cleared {} stale chunk(s) from {}", removed, dir.display());
    }
    Ok(())
}

/// Host-facing control surface. Holds at most one active session.
pub struct SessionManager<L: LedgerClient + 'static> {
    ledger: Arc<L>,
    events: EventSender,
    active: Mutex<Option<Session<L>>>,
}

impl<L: LedgerClient + 'static> SessionManager<L> {
    pub fn new(ledger: Arc<L>, events: EventSender) -> Self {
        Self {
            ledger,
            events,
            active: Mutex::new(None),
        }
    }

    /// Start a session. Rejected with `AlreadyActive` while one is
    /// running.
    pub async fn start_session(&self, config: &SessionConfig) -> Result<(), SessionError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(SessionError::AlreadyActive);
        }
        let session = Session::start(self.ledger.clone(), config, self.events.clone()).await?;
        *active = Some(session);
        Ok(())
    }

    /// Stop the active session, if any. Returns whether one was stopped.
    pub async fn stop_session(&self) -> bool {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(session) => {
                session.stop().await;
                true
            }
            None => {
                log::debug!("No active session to stop");
                false
            }
        }
    }

    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }
}
