use std::io;

use lexdec_core::ConfigError;
use thiserror::Error;

/// Ends the session. No partial trial record is appended when one is returned.
#[derive(Debug, Error)]
pub enum ExperimentError {
    /// The experiment definition is malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session was terminated while a trial was running.
    #[error("session aborted during trial `{trial}`")]
    Aborted { trial: String },

    #[error("input source failed: {0}")]
    Input(#[source] io::Error),

    #[error("stimulus display failed: {0}")]
    Display(#[source] io::Error),

    /// `poll` was called on a timeline that already returned its record.
    #[error("trial `{0}` has already completed")]
    TimelineFinished(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("results rejected: {0}")]
    Rejected(String),
}
