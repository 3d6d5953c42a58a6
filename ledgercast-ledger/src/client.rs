use async_trait::async_trait;

use crate::chunk::{ChunkRecord, CommitReceipt};
use crate::error::Result;

/// Client interface to the append-only ledger.
///
/// The ledger assigns sequence indices densely from 0 in append order and
/// enforces a monotonic per-writer sequence counter: an append whose
/// `sequence` does not match the ledger's expected next value for this
/// writer fails with `LedgerError::StaleSequence`, distinguishable from a
/// transport failure.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Append a chunk with the writer's current sequence number.
    /// Returns only after the write is durably committed.
    async fn append(&self, sequence: u64, payload: &[u8]) -> Result<CommitReceipt>;

    /// Number of committed chunks. Readable indices are `0..latest`.
    async fn latest_index(&self) -> Result<u64>;

    /// Read the committed chunk at `index`.
    async fn read_at(&self, index: u64) -> Result<ChunkRecord>;

    /// The writer's current outstanding-write count. A restarted producer
    /// adopts this as its starting sequence counter so it neither replays
    /// nor skips sequence numbers.
    async fn writer_sequence(&self) -> Result<u64>;
}
