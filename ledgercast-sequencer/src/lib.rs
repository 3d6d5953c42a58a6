//! Producer-side sequencing for Ledgercast.
//!
//! The encoder drops finalized chunk files into a staging directory; this
//! crate watches that directory, queues each settled file in detection
//! order, and submits them to the ledger one at a time under the ledger's
//! single-writer sequencing contract. Local files are deleted only after
//! a durable commit.

pub mod error;
pub mod sequencer;
pub mod watcher;

pub use error::{Result, SequencerError};
pub use sequencer::{CommitTicket, Sequencer, SequencerConfig, SubmitFailure};
pub use watcher::{ChunkWatcher, WatcherConfig};
