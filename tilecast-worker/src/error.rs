use reqwest::StatusCode;
use thiserror::Error;

use tilecast_core::{TranscodeError, WireError};

#[derive(Error, Debug)]
pub enum WorkerError {
    /// The poll loop observed its cancellation signal.
    #[error("canceled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server answered with unexpected status {0}")]
    Rejected(StatusCode),

    #[error("malformed job: {0}")]
    Wire(#[from] WireError),

    #[error("encode failed: {0}")]
    Encode(#[from] TranscodeError),
}

impl WorkerError {
    /// Failures talking to the dispatch server that are worth retrying after
    /// a pause.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Rejected(_))
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
