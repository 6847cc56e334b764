use thiserror::Error;

/// Failures surfaced by the [`DispatchCoordinator`](crate::DispatchCoordinator).
///
/// The coordinator never retries; each error reaches its immediate caller
/// exactly once.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("invalid encode request: {0}")]
    Validation(String),

    #[error("file: {0} is not found in a storage")]
    SourceNotFound(String),

    /// No tile became available within the dispatch window. Benign.
    #[error("dispatch timeout")]
    Timeout,

    #[error("job queue closed")]
    QueueClosed,

    #[error("tile producer aborted: {0}")]
    ProducerAborted(String),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl DispatchError {
    /// Errors caused by the triggering caller rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::SourceNotFound(_))
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue closed")]
    Closed,

    #[error("timed out waiting for a job")]
    Timeout,
}

impl From<QueueError> for DispatchError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Closed => Self::QueueClosed,
            QueueError::Timeout => Self::Timeout,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("x-tile header is missing or empty")]
    MissingTileName,

    #[error("not a valid tile name: {0:?}")]
    InvalidTileName(String),

    #[error("{field} header is not a valid dimension: {value:?}")]
    MalformedDimension { field: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("failed to write object {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} stdout was not captured")]
    MissingStdout(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
