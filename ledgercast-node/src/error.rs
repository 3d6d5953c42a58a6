use thiserror::Error;

use ledgercast_ledger::LedgerError;
use ledgercast_sequencer::SequencerError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A session is already active")]
    AlreadyActive,

    #[error("Ledger unreachable: {0}")]
    Connectivity(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Sequencer error: {0}")]
    Sequencer(#[from] SequencerError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
