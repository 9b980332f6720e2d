//! Export error definitions.

use thiserror::Error;

/// Errors raised by the export pipeline.
///
/// Only the lifecycle variants reach callers; the rest are logged inside the
/// flush task.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// `start` was called on an exporter that already left the idle phase.
    #[error("exporter already started")]
    AlreadyStarted,

    /// The flush interval must be non-zero.
    #[error("flush interval must be greater than zero")]
    InvalidInterval,

    /// The batch could not be encoded.
    #[error("failed to serialize batch: {0}")]
    Serialization(String),

    /// The upload could not be delivered.
    #[error("failed to send batch: {0}")]
    Transport(String),

    /// The collector answered with a non-2xx status.
    #[error("collector rejected batch with status {0}")]
    Rejected(u16),
}

impl ExportError {
    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ExportError::AlreadyStarted => "already_started",
            ExportError::InvalidInterval => "invalid_interval",
            ExportError::Serialization(_) => "serialization",
            ExportError::Transport(_) => "transport",
            ExportError::Rejected(_) => "rejected",
        }
    }
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;
