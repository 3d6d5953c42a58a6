//! In-process ledger used by tests and local development.
//!
//! Enforces the same contract as the remote ledger: the 256 KiB payload
//! cap, strict per-writer sequence checking, and dense FIFO index
//! assignment. Fault injection hooks let tests exercise read failures and
//! observe call patterns without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::chunk::{validate_chunk, ChunkRecord, CommitReceipt};
use crate::client::LedgerClient;
use crate::error::{LedgerError, Result};

struct StoredChunk {
    submitted_at: i64,
    payload: Vec<u8>,
}

struct MemoryState {
    /// Index assigned to the first locally stored chunk. Indices below
    /// this belong to history that predates this instance.
    base: u64,
    chunks: Vec<StoredChunk>,
    /// Remaining injected failures per index.
    read_failures: HashMap<u64, u32>,
}

pub struct MemoryLedger {
    state: Mutex<MemoryState>,
    append_calls: AtomicUsize,
    appends_in_flight: AtomicUsize,
    max_appends_in_flight: AtomicUsize,
    append_delay: Duration,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_base(0)
    }

    /// Start with `base` prior committed writes, as if the writer already
    /// appended that many chunks before this instance was created. The
    /// next accepted sequence number and the next assigned index are both
    /// `base`.
    pub fn with_base(base: u64) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                base,
                chunks: Vec::new(),
                read_failures: HashMap::new(),
            }),
            append_calls: AtomicUsize::new(0),
            appends_in_flight: AtomicUsize::new(0),
            max_appends_in_flight: AtomicUsize::new(0),
            append_delay: Duration::ZERO,
        }
    }

    /// Hold each append for `delay` before committing, widening the window
    /// in which overlapping submissions would be observable.
    pub fn with_append_delay(mut self, delay: Duration) -> Self {
        self.append_delay = delay;
        self
    }

    /// Inject `times` consecutive read failures at `index`.
    pub async fn fail_reads_at(&self, index: u64, times: u32) {
        let mut state = self.state.lock().await;
        state.read_failures.insert(index, times);
    }

    /// Total number of `append` calls received, including rejected ones.
    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    /// Highest number of appends that were ever in flight simultaneously.
    pub fn max_appends_in_flight(&self) -> usize {
        self.max_appends_in_flight.load(Ordering::SeqCst)
    }

    /// Payload committed at `index`, if locally stored.
    pub async fn payload_at(&self, index: u64) -> Option<Vec<u8>> {
        let state = self.state.lock().await;
        let slot = index.checked_sub(state.base)? as usize;
        state.chunks.get(slot).map(|c| c.payload.clone())
    }

    fn now_unix() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn append(&self, sequence: u64, payload: &[u8]) -> Result<CommitReceipt> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.appends_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_appends_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let result = async {
            validate_chunk(payload)?;
            if !self.append_delay.is_zero() {
                tokio::time::sleep(self.append_delay).await;
            }

            let mut state = self.state.lock().await;
            let expected = state.base + state.chunks.len() as u64;
            if sequence != expected {
                return Err(LedgerError::StaleSequence {
                    expected,
                    got: sequence,
                });
            }

            let index = expected;
            state.chunks.push(StoredChunk {
                submitted_at: Self::now_unix(),
                payload: payload.to_vec(),
            });
            Ok(CommitReceipt {
                index,
                size: payload.len(),
                confirmation: format!("mem-{}", index),
            })
        }
        .await;

        self.appends_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn latest_index(&self) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state.base + state.chunks.len() as u64)
    }

    async fn read_at(&self, index: u64) -> Result<ChunkRecord> {
        let mut state = self.state.lock().await;
        if let Some(remaining) = state.read_failures.get_mut(&index) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LedgerError::Transport(format!(
                    "injected read failure at index {}",
                    index
                )));
            }
        }

        let slot = index
            .checked_sub(state.base)
            .ok_or(LedgerError::NotFound(index))? as usize;
        let chunk = state.chunks.get(slot).ok_or(LedgerError::NotFound(index))?;
        Ok(ChunkRecord {
            index,
            submitted_at: chunk.submitted_at,
            payload: chunk.payload.clone(),
        })
    }

    async fn writer_sequence(&self) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state.base + state.chunks.len() as u64)
    }
}
