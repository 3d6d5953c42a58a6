//! Typed session events.
//!
//! The core emits these over a channel instead of calling back into a UI
//! layer; the host decides how to render them. Mid-session failures are
//! advisory and never halt the session.

use std::path::PathBuf;

use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Free-form advisory output, including encoder stderr lines.
    Log(String),
    /// The watcher found a settled chunk file.
    ChunkDetected(PathBuf),
    /// A chunk was durably committed to the ledger.
    ChunkCommitted {
        index: u64,
        size: usize,
        confirmation: String,
    },
    /// A chunk submission failed; the file is retained on disk.
    ChunkFailed { filename: String, reason: String },
    /// The encoder subprocess exited on its own.
    EncoderExited { status: Option<i32> },
    /// A failure worth surfacing that is not tied to a single chunk.
    Error(String),
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
