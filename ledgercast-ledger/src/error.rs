use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Empty chunk")]
    EmptyChunk,

    #[error("Chunk too large: {size} bytes (max {max})")]
    ChunkTooLarge { size: usize, max: usize },

    #[error("Stale sequence number: ledger expected {expected}, got {got}")]
    StaleSequence { expected: u64, got: u64 },

    #[error("No chunk at index {0}")]
    NotFound(u64),

    #[error("Ledger rejected request: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// True for failures caught by local validation, before any ledger call.
    pub fn is_validation(&self) -> bool {
        matches!(self, LedgerError::EmptyChunk | LedgerError::ChunkTooLarge { .. })
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        LedgerError::Transport(err.to_string())
    }
}
