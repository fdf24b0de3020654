//! Errors of the sync engine

use thiserror::Error;

use crate::note::Partition;

/// Result type for all sync engine interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Sync engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// A remote mutation was attempted without an active session
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The remote document store could not be reached
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    /// The remote document store answered with an error
    #[error("Remote rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status code of the answer
        status: u16,

        /// Message from the error body
        message: String,
    },

    /// A remote call did not complete in time
    #[error("Remote call timed out")]
    Timeout,

    /// No note with this ID in either partition
    #[error("Note not found: {0}")]
    NoteNotFound(String),

    /// The note did not pass validation
    #[error("Invalid note: {0}")]
    InvalidNote(String),

    /// A document could not be mapped to or from a note
    #[error("Codec error: {0}")]
    Codec(String),

    /// A value kind the document codec does not support
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    /// The privacy flag of a document disagrees with its collection
    #[error("Document {name} does not belong in the {partition} partition")]
    PartitionMismatch {
        /// Full document name
        name: String,

        /// Partition the document claims via its `isPrivate` field
        partition: Partition,
    },

    /// A batch upsert stopped halfway, earlier chunks are committed
    #[error("Batch upsert stopped after {committed} of {total} notes: {source}")]
    PartialBatch {
        /// Number of notes committed before the failure
        committed: usize,

        /// Number of notes in the batch
        total: usize,

        /// Failure of the chunk that stopped the batch
        source: Box<Error>,
    },

    /// The change was applied locally, the remote store did not take it
    #[error("Saved locally, cloud sync did not complete: {source}")]
    NotSynced {
        /// Reason the remote side failed
        source: Box<Error>,
    },

    /// The local store could not be written
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The PIN is not 4 to 8 digits
    #[error("PIN must be 4 to 8 digits")]
    InvalidPin,

    /// Invalid credentials before contacting the remote
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a remote failure whose mutation was still applied locally
    pub(crate) fn not_synced(source: Error) -> Self {
        Error::NotSynced {
            source: Box::new(source),
        }
    }

    /// Is this a failure of the remote side (as opposed to local bookkeeping)?
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::NotAuthenticated
                | Error::Unreachable(_)
                | Error::Rejected { .. }
                | Error::Timeout
                | Error::PartialBatch { .. }
                | Error::NotSynced { .. }
        )
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::Storage(err.to_string())
    }
}
