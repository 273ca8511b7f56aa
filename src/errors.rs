//! Error types for the Paddock round service
//!
//! One enum per concern, aggregated into [`PaddockError`] for the places that
//! need a single error surface (configuration loading, the binary, the API).

use crate::round::state::RoundStatus;

/// Root error type for all Paddock operations
#[derive(Debug, thiserror::Error)]
pub enum PaddockError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Round error: {0}")]
    Round(#[from] RoundError),

    #[error("Trajectory error: {0}")]
    Trajectory(#[from] TrajectoryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Failures talking to the settlement ledger
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum LedgerError {
    /// The ledger could not be reached at all (connection refused, timeout)
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger answered but refused or failed the call
    #[error("Ledger call {call} failed: {reason}")]
    CallFailed { call: &'static str, reason: String },

    /// The ledger's own commitment check rejected the revealed seed
    #[error("Ledger rejected revealed seed for round {round_id}")]
    CommitmentRejected { round_id: u64 },

    #[error("Round {0} not known to the ledger")]
    UnknownRound(u64),
}

impl LedgerError {
    pub fn call_failed(call: &'static str, reason: impl Into<String>) -> Self {
        LedgerError::CallFailed {
            call,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_) | LedgerError::CallFailed { .. })
    }
}

/// Best-effort persistence failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database open failed: {0}")]
    OpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::WriteFailed(e.to_string())
    }
}

/// Round state machine and fairness errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RoundError {
    #[error("Illegal round transition {from:?} -> {to:?}")]
    IllegalTransition { from: RoundStatus, to: RoundStatus },

    #[error("Round {round_id} already has a {field}")]
    AlreadySet { round_id: u64, field: &'static str },

    #[error("Round {round_id} has no {field}")]
    Missing { round_id: u64, field: &'static str },

    /// The revealed seed no longer hashes to the published commitment
    #[error("Revealed seed does not match commitment {commitment} for round {round_id}")]
    CommitmentMismatch { round_id: u64, commitment: String },

    #[error("Participant index {index} out of range for roster of {roster_len}")]
    ParticipantOutOfRange { index: usize, roster_len: usize },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrajectoryError {
    #[error("Race duration must be positive")]
    ZeroDuration,

    #[error("Empty roster")]
    EmptyRoster,

    #[error("Winner index {winner} out of range for roster of {roster_len}")]
    WinnerOutOfRange { winner: usize, roster_len: usize },
}

/// Convenience type alias for Results
pub type PaddockResult<T> = Result<T, PaddockError>;
