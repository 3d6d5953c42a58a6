//! Ledger client wrapper for Ledgercast.
//!
//! The ledger is an external append-only, index-addressed store with
//! single-writer sequencing. It is the sole transport between the producer
//! and its viewers: the producer appends chunks with a strictly increasing
//! sequence number, viewers read back by index. This crate provides:
//!
//! - the `LedgerClient` trait both sides program against
//! - `RpcLedgerClient`, a JSON-RPC over HTTP implementation
//! - `MemoryLedger`, an in-process implementation enforcing the same
//!   contract, used by tests and local development
//! - the shared chunk validation policy (size limits)

pub mod chunk;
pub mod client;
pub mod error;
pub mod memory;
pub mod rpc;

pub use chunk::{validate_chunk, ChunkRecord, CommitReceipt, MAX_CHUNK_BYTES};
pub use client::LedgerClient;
pub use error::{LedgerError, Result};
pub use memory::MemoryLedger;
pub use rpc::{LedgerCredentials, RpcLedgerClient};
