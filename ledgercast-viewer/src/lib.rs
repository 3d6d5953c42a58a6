//! Consumer-side tailing for Ledgercast.
//!
//! The reader polls the ledger's committed length and reconstructs the
//! longest gapless prefix of the stream it can, feeding payloads to a
//! playback sink in strict index order. Liveness wins over completeness:
//! an index that cannot be read is skipped permanently rather than
//! stalling every chunk behind it.

pub mod reader;
pub mod sink;

pub use reader::{ReaderConfig, ReaderEvent, TailingReader};
pub use sink::{ChannelSink, PlaybackSink, SinkError};
