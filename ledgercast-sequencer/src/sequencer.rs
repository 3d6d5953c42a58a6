//! The Sequencer submits chunk files to the ledger in detection order.
//!
//! The ledger is single-writer: each append must carry the writer's next
//! sequence number, and two appends in flight at once risk committing out
//! of order or colliding on the counter. The Sequencer therefore keeps a
//! FIFO pending queue and a `processing` re-entry guard so at most one
//! append is ever outstanding, and it resynchronizes its counter from the
//! ledger on every construction.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio_util::sync::CancellationToken;

use ledgercast_ledger::{validate_chunk, CommitReceipt, LedgerClient, LedgerError};

use crate::error::{Result, SequencerError};

/// Delay between queue-processing passes. Lets transient network state
/// settle and keeps the single ledger connection from being starved.
const DEFAULT_PASS_DELAY_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Stream identity chunks are appended under.
    pub stream: String,
    /// Fixed delay between queue-processing passes.
    pub pass_delay: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            stream: "default".to_string(),
            pass_delay: Duration::from_millis(DEFAULT_PASS_DELAY_MS),
        }
    }
}

/// Per-chunk submission failure, reported to the enqueue caller.
/// The chunk file is left on disk; re-submission is the caller's decision.
#[derive(Debug, Error)]
#[error("Failed to submit {filename}: {error}")]
pub struct SubmitFailure {
    pub filename: String,
    #[source]
    pub error: LedgerError,
}

type SubmitResult = std::result::Result<CommitReceipt, SubmitFailure>;

/// Pending result of an enqueued chunk. Resolves once the chunk is
/// durably committed or its submission fails. Dropping the ticket does
/// not disturb the queue.
pub struct CommitTicket {
    filename: String,
    rx: oneshot::Receiver<SubmitResult>,
}

impl CommitTicket {
    pub async fn wait(self) -> SubmitResult {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(SubmitFailure {
                filename: self.filename,
                error: LedgerError::Rejected("sequencer shut down before submission".to_string()),
            }),
        }
    }
}

struct PendingChunk {
    path: PathBuf,
    done: oneshot::Sender<SubmitResult>,
}

struct State {
    queue: VecDeque<PendingChunk>,
    /// Re-entry guard: true while a submission is in flight.
    processing: bool,
    /// Mirror of the ledger's per-writer counter; the next append uses
    /// this value.
    sequence: u64,
}

pub struct Sequencer<L: LedgerClient + 'static> {
    ledger: Arc<L>,
    state: Arc<Mutex<State>>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    config: SequencerConfig,
}

impl<L: LedgerClient + 'static> Clone for Sequencer<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            state: self.state.clone(),
            wake: self.wake.clone(),
            cancel: self.cancel.clone(),
            config: self.config.clone(),
        }
    }
}

impl<L: LedgerClient + 'static> Sequencer<L> {
    /// Connect to the ledger and adopt its outstanding-write count as the
    /// starting sequence counter. Resynchronization happens on every
    /// construction so a restarted producer neither replays nor skips
    /// sequence numbers.
    pub async fn connect(ledger: Arc<L>, config: SequencerConfig) -> Result<Self> {
        let sequence = ledger
            .writer_sequence()
            .await
            .map_err(|e| SequencerError::Resync(e.to_string()))?;
        log::info!(
            "Sequencer for stream '{}' starting at sequence {}",
            config.stream,
            sequence
        );

        let sequencer = Self {
            ledger,
            state: Arc::new(Mutex::new(State {
                queue: VecDeque::new(),
                processing: false,
                sequence,
            })),
            wake: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            config,
        };
        sequencer.spawn_worker();
        Ok(sequencer)
    }

    /// Queue a chunk file for submission. Never blocks on the ledger; the
    /// returned ticket resolves when the chunk commits or fails.
    pub async fn enqueue(&self, path: PathBuf) -> CommitTicket {
        let (done, rx) = oneshot::channel();
        let filename = file_name_of(&path);
        {
            let mut state = self.state.lock().await;
            state.queue.push_back(PendingChunk { path, done });
        }
        self.wake.notify_one();
        CommitTicket { filename, rx }
    }

    /// Read-through query of the ledger's committed length.
    pub async fn latest_index(&self) -> std::result::Result<u64, LedgerError> {
        self.ledger.latest_index().await
    }

    /// Reachability probe. Does not mutate any state; used to fail fast
    /// before a session starts rather than mid-stream.
    pub async fn test_connection(&self) -> bool {
        match self.latest_index().await {
            Ok(latest) => {
                log::debug!("Ledger reachable, latest index {}", latest);
                true
            }
            Err(e) => {
                log::warn!("Ledger unreachable: {}", e);
                false
            }
        }
    }

    /// Number of chunks waiting for submission.
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Current value of the sequence counter.
    pub async fn sequence(&self) -> u64 {
        self.state.lock().await.sequence
    }

    /// Stop processing. An in-flight submission finishes or fails cleanly;
    /// queued chunks are abandoned and their tickets reject.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.wake.notify_one();
    }

    fn spawn_worker(&self) {
        let ledger = self.ledger.clone();
        let state = self.state.clone();
        let wake = self.wake.clone();
        let cancel = self.cancel.clone();
        let pass_delay = self.config.pass_delay;

        tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let worked = process_pass(ledger.as_ref(), &state).await;
                if worked {
                    // Fixed settle delay between passes, success or failure.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(pass_delay) => {}
                    }
                } else {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = wake.notified() => {}
                    }
                }
            }
            log::debug!("Sequencer worker stopped");
        });
    }
}

/// One queue-processing pass. Idempotent re-entry: a no-op while another
/// pass holds the `processing` guard or when the queue is empty. Returns
/// true if a chunk was taken from the queue.
async fn process_pass<L: LedgerClient>(ledger: &L, state: &Mutex<State>) -> bool {
    let (pending, sequence) = {
        let mut st = state.lock().await;
        if st.processing {
            return false;
        }
        match st.queue.pop_front() {
            Some(pending) => {
                st.processing = true;
                (pending, st.sequence)
            }
            None => return false,
        }
    };

    let filename = file_name_of(&pending.path);
    match submit_one(ledger, sequence, &pending.path).await {
        Ok(receipt) => {
            // Reclaim disk only after the durable commit.
            if let Err(e) = tokio::fs::remove_file(&pending.path).await {
                log::warn!("Committed {} but could not remove it: {}", filename, e);
            }
            {
                let mut st = state.lock().await;
                st.sequence = sequence + 1;
                st.processing = false;
            }
            log::info!(
                "Committed {} at index {} ({} bytes, confirmation {})",
                filename,
                receipt.index,
                receipt.size,
                receipt.confirmation
            );
            let _ = pending.done.send(Ok(receipt));
        }
        Err(error) => {
            {
                let mut st = state.lock().await;
                st.processing = false;
            }
            log::warn!("Failed to submit {}: {}", filename, error);
            let _ = pending.done.send(Err(SubmitFailure { filename, error }));
        }
    }
    true
}

/// Read, validate and append a single chunk file. Validation failures
/// never reach the ledger.
async fn submit_one<L: LedgerClient>(
    ledger: &L,
    sequence: u64,
    path: &Path,
) -> std::result::Result<CommitReceipt, LedgerError> {
    let payload = tokio::fs::read(path).await?;
    validate_chunk(&payload)?;
    ledger.append(sequence, &payload).await
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
