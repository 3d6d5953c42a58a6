//! Tailing reader: polls the ledger and drains new indices into the sink.
//!
//! Cycles never overlap. Within a cycle, indices are consumed strictly in
//! order; the cursor only moves forward. A read failure advances the
//! cursor past the index permanently, a sink failure ends the cycle
//! without advancing so the same index is retried next cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use ledgercast_ledger::LedgerClient;

use crate::sink::PlaybackSink;

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Stream identity being tailed, for logging only.
    pub stream: String,
    /// Interval between polling cycles. Chosen to approximate the chunk
    /// production rate: over-polling wastes ledger reads, under-polling
    /// adds perceived latency.
    pub poll_interval: Duration,
    /// When first observing a ledger that already has committed chunks,
    /// start this many indices behind the tip instead of at 0.
    pub lookback: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            stream: "default".to_string(),
            poll_interval: Duration::from_secs(1),
            lookback: 10,
        }
    }
}

/// Advisory events emitted while tailing. None of these halt the reader.
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    Delivered { index: u64, size: usize },
    Skipped { index: u64, reason: String },
    SinkStalled { index: u64, reason: String },
}

pub struct TailingReader<L, S> {
    ledger: Arc<L>,
    sink: Arc<S>,
    config: ReaderConfig,
    /// Next index to read. `None` until the first successful poll fixes
    /// the catch-up starting point.
    next_index: Arc<Mutex<Option<u64>>>,
    skipped: Arc<Mutex<Vec<u64>>>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<ReaderEvent>>,
}

impl<L, S> TailingReader<L, S>
where
    L: LedgerClient + 'static,
    S: PlaybackSink + 'static,
{
    pub fn new(ledger: Arc<L>, sink: Arc<S>, config: ReaderConfig) -> Self {
        Self {
            ledger,
            sink,
            config,
            next_index: Arc::new(Mutex::new(None)),
            skipped: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Emit `ReaderEvent`s on `tx` in addition to logging them.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<ReaderEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Begin polling. Returns false (and does nothing) if a polling loop
    /// is already outstanding: playback order is only guaranteed under
    /// non-overlapping cycles.
    pub fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("Reader for '{}' already polling", self.config.stream);
            return false;
        }

        let ledger = self.ledger.clone();
        let sink = self.sink.clone();
        let config = self.config.clone();
        let next_index = self.next_index.clone();
        let skipped = self.skipped.clone();
        let running = self.running.clone();
        let cancel = self.cancel.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            log::info!("Tailing reader for '{}' started", config.stream);
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                poll_cycle(&*ledger, &*sink, &config, &next_index, &skipped, &events, &cancel)
                    .await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
            running.store(false, Ordering::SeqCst);
            log::info!("Tailing reader for '{}' stopped", config.stream);
        });
        true
    }

    /// Halt polling. Reads are non-destructive, so there is nothing to
    /// clean up on the ledger.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Highest index consumed so far (delivered or skipped), if any.
    pub async fn cursor(&self) -> Option<u64> {
        let next = self.next_index.lock().await;
        match *next {
            Some(n) if n > 0 => Some(n - 1),
            _ => None,
        }
    }

    /// Indices permanently skipped because they could not be read.
    pub async fn skipped(&self) -> Vec<u64> {
        self.skipped.lock().await.clone()
    }
}

/// One polling cycle: fetch the committed length, then drain every
/// unconsumed index in order.
async fn poll_cycle<L: LedgerClient, S: PlaybackSink>(
    ledger: &L,
    sink: &S,
    config: &ReaderConfig,
    next_index: &Mutex<Option<u64>>,
    skipped: &Mutex<Vec<u64>>,
    events: &Option<mpsc::UnboundedSender<ReaderEvent>>,
    cancel: &CancellationToken,
) {
    let latest = match ledger.latest_index().await {
        Ok(latest) => latest,
        Err(e) => {
            log::warn!("Poll failed for '{}': {}", config.stream, e);
            return;
        }
    };

    let mut next = {
        let guard = next_index.lock().await;
        match *guard {
            Some(n) => n,
            None => {
                let start = latest.saturating_sub(config.lookback);
                if start > 0 {
                    log::info!(
                        "Catching up '{}' from index {} (latest {}, lookback {})",
                        config.stream,
                        start,
                        latest,
                        config.lookback
                    );
                }
                start
            }
        }
    };

    while next < latest {
        // A stalled sink must not outlive a stop request.
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sink.ready() => {}
        }

        match ledger.read_at(next).await {
            Ok(record) => {
                let size = record.payload.len();
                match sink.append(record.payload).await {
                    Ok(()) => {
                        log::debug!("Delivered chunk {} ({} bytes)", next, size);
                        emit(events, ReaderEvent::Delivered { index: next, size });
                        next += 1;
                    }
                    Err(e) => {
                        // Do not advance: the same index is retried on the
                        // next cycle once the sink recovers.
                        log::warn!("Sink refused chunk {}: {}", next, e);
                        emit(
                            events,
                            ReaderEvent::SinkStalled {
                                index: next,
                                reason: e.to_string(),
                            },
                        );
                        break;
                    }
                }
            }
            Err(e) => {
                // Liveness over completeness: blocking here would stall
                // every later, already-available chunk.
                log::warn!("Skipping unreadable chunk {}: {}", next, e);
                skipped.lock().await.push(next);
                emit(
                    events,
                    ReaderEvent::Skipped {
                        index: next,
                        reason: e.to_string(),
                    },
                );
                next += 1;
            }
        }

        let mut guard = next_index.lock().await;
        *guard = Some(next);
    }

    let mut guard = next_index.lock().await;
    *guard = Some(next);
}

fn emit(events: &Option<mpsc::UnboundedSender<ReaderEvent>>, event: ReaderEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
