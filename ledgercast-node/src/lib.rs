//! Producer session lifecycle for Ledgercast.
//!
//! A `Session` owns everything a live capture needs: the encoder
//! subprocess dropping segment files into a staging directory, the
//! watcher detecting settled files, and the sequencer committing them to
//! the ledger. Sessions are explicit objects with an owned lifecycle;
//! the `SessionManager` is the host-facing control surface and enforces
//! the single-active-session rule. Everything the host needs to observe
//! arrives as typed `SessionEvent`s over a channel.

pub mod config;
pub mod encoder;
pub mod error;
pub mod events;
pub mod session;

pub use config::SessionConfig;
pub use encoder::{ffmpeg_args, Encoder, EncoderConfig};
pub use error::SessionError;
pub use events::{EventSender, SessionEvent};
pub use session::{Session, SessionManager};
