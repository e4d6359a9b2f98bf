//! Error types for the Tessera library.
//!
//! Every fallible operation in the crate returns [`Result`], whose error type
//! is the [`TesseraError`] enum. The variants fall into four families that
//! callers are expected to treat differently:
//!
//! - **not found** ([`TesseraError::DocNotFound`]): a recoverable data
//!   condition. Posting-list scans swallow it and keep going; explicit
//!   document requests surface it.
//! - **contract violations** ([`TesseraError::Unsupported`],
//!   [`TesseraError::InvalidOperation`], [`TesseraError::InvalidArgument`]):
//!   the caller used the API wrongly. Never retried.
//! - **backend unavailable** ([`TesseraError::Unavailable`]): a remote
//!   backend could not be reached. Retry policy belongs to the caller.
//! - **invalid state** ([`TesseraError::Corrupt`], [`TesseraError::Closed`]):
//!   fatal, no recovery is defined.
//!
//! # Examples
//!
//! ```
//! use tessera::error::{Result, TesseraError};
//!
//! fn fetch(did: u32) -> Result<()> {
//!     Err(TesseraError::DocNotFound(did))
//! }
//!
//! match fetch(7) {
//!     Err(e) if e.is_not_found() => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;

use thiserror::Error;

use crate::types::DocId;

/// The main error type for Tessera operations.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// I/O errors (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested document does not exist (or has been deleted).
    #[error("Document {0} not found")]
    DocNotFound(DocId),

    /// The backend does not implement this operation, e.g. a mutation on a
    /// read-only database.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The operation is not valid in the current state (no transaction in
    /// progress, cursor not positioned, ...).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// An argument is outside the accepted domain (empty term, docid 0, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A networked backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Stored data failed validation.
    #[error("Database corrupt: {0}")]
    Corrupt(String),

    /// The database handle has been closed.
    #[error("Database is closed")]
    Closed,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with TesseraError.
pub type Result<T> = std::result::Result<T, TesseraError>;

impl TesseraError {
    /// Create a new unsupported-operation error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        TesseraError::Unsupported(msg.into())
    }

    /// Create a new invalid-operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        TesseraError::InvalidOperation(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        TesseraError::InvalidArgument(msg.into())
    }

    /// Create a new backend-unavailable error.
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        TesseraError::Unavailable(msg.into())
    }

    /// Create a new corruption error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        TesseraError::Corrupt(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        TesseraError::Serialization(msg.into())
    }

    /// True for the "document does not exist" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TesseraError::DocNotFound(_))
    }

    /// True when the caller may reasonably retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TesseraError::Unavailable(_))
    }

    /// True for contract violations and invalid state: misuse of the API or
    /// data that cannot be trusted any more.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TesseraError::Unsupported(_)
                | TesseraError::InvalidOperation(_)
                | TesseraError::InvalidArgument(_)
                | TesseraError::Corrupt(_)
                | TesseraError::Closed
        )
    }
}

impl From<bincode::Error> for TesseraError {
    fn from(err: bincode::Error) -> Self {
        TesseraError::Serialization(err.to_string())
    }
}
