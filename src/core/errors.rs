use crate::core::stream::{StreamId, Version};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("context cancelled"),
            CancelReason::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Failures raised by a stream storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("version mismatch: expected {expected}, actual {actual}")]
    Conflict { expected: Version, actual: Version },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupted stream: {0}")]
    Corrupted(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("storage task failed: {0}")]
    Join(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoEventsToAppend,
    VersionConflict,
    MismatchedAggregate,
    Storage,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("no events to append")]
    NoEventsToAppend,

    #[error("version conflict on {stream}: expected {expected}, actual {actual}")]
    VersionConflict {
        stream: StreamId,
        expected: Version,
        actual: Version,
    },

    #[error("event for {found} in a batch for {expected}")]
    MismatchedAggregate { expected: StreamId, found: StreamId },

    #[error("storage failure on {stream}: {source}")]
    Storage {
        stream: StreamId,
        #[source]
        source: StorageError,
    },

    #[error("{reason}")]
    Cancelled { reason: CancelReason },
}

impl EventStoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventStoreError::NoEventsToAppend => ErrorKind::NoEventsToAppend,
            EventStoreError::VersionConflict { .. } => ErrorKind::VersionConflict,
            EventStoreError::MismatchedAggregate { .. } => ErrorKind::MismatchedAggregate,
            EventStoreError::Storage { .. } => ErrorKind::Storage,
            EventStoreError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Lift a backend failure into the store taxonomy. A backend-detected
    /// version mismatch is a conflict, not a storage failure.
    pub fn from_storage(stream: &StreamId, source: StorageError) -> Self {
        match source {
            StorageError::Conflict { expected, actual } => EventStoreError::VersionConflict {
                stream: stream.clone(),
                expected,
                actual,
            },
            source => EventStoreError::Storage {
                stream: stream.clone(),
                source,
            },
        }
    }
}
