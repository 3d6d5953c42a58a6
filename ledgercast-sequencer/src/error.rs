use thiserror::Error;

use ledgercast_ledger::LedgerError;

#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("Failed to resynchronize sequence counter: {0}")]
    Resync(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SequencerError>;
