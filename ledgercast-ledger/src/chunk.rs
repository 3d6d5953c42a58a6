//! Shared chunk policy.
//!
//! Both the producer and the ledger implementations enforce the same size
//! contract, so an oversized or empty chunk is rejected locally and never
//! costs a ledger round trip.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Hard upper bound on a single chunk payload, in bytes.
/// Appends above this limit are rejected by the ledger.
pub const MAX_CHUNK_BYTES: usize = 256 * 1024;

/// Validate a chunk payload against the ledger's append contract.
pub fn validate_chunk(payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        return Err(LedgerError::EmptyChunk);
    }
    if payload.len() > MAX_CHUNK_BYTES {
        return Err(LedgerError::ChunkTooLarge {
            size: payload.len(),
            max: MAX_CHUNK_BYTES,
        });
    }
    Ok(())
}

/// A committed chunk read back from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub index: u64,
    /// Unix timestamp (seconds) recorded by the ledger at submission.
    pub submitted_at: i64,
    pub payload: Vec<u8>,
}

/// Result of a durably committed append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Sequence index assigned by the ledger.
    pub index: u64,
    /// Payload size in bytes.
    pub size: usize,
    /// Opaque confirmation identifier from the ledger.
    pub confirmation: String,
}
