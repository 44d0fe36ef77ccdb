//! Error types for store operations
//!
//! All store errors are represented by the `StoreError` enum. "Not found" is an
//! ordinary variant so that callers can tell an absent key apart from a failed
//! lookup via [`StoreError::is_not_found`].

use std::path::PathBuf;

use thiserror::Error;

/// Store error types with detailed context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The requested key has no visible value in the transaction's snapshot
    #[error("key not found")]
    NotFound,

    /// Zero-length values cannot be stored
    #[error("cannot set an empty value")]
    EmptyValue,

    /// Another transaction committed a newer version of a key in our write set
    #[error("write conflict on key {}", hex(.key))]
    WriteConflict {
        /// The first conflicting key found
        key: Vec<u8>,
        /// Start timestamp of the losing transaction
        start_ts: u64,
        /// Commit timestamp of the newer version
        conflict_ts: u64,
    },

    /// Entry size exceeds maximum allowed
    #[error("entry {component} too large: {entry_size} bytes exceeds limit of {max_size} bytes")]
    OversizedEntry {
        /// Size of the oversized entry
        entry_size: u64,
        /// Maximum allowed size
        max_size: u64,
        /// Whether it's the key or value that's oversized
        component: &'static str,
    },

    /// The transaction was already committed or rolled back
    #[error("transaction already finished")]
    TransactionClosed,

    /// No endpoint was supplied to connect to
    #[error("no store endpoints configured")]
    NoEndpoints,

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O operation failed
    #[error("I/O error{}: {message} ({kind})", .path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// Commit log is corrupted and cannot be recovered
    #[error("commit log corrupted in {} at offset {offset}: {reason}", .path.display())]
    LogCorrupted {
        /// Path to the corrupted log file
        path: PathBuf,
        /// Byte offset where corruption was detected
        offset: u64,
        /// Description of the corruption
        reason: String,
    },

    /// Checksum verification failed
    #[error("checksum mismatch in {} at offset {offset}: expected 0x{expected:08x}, got 0x{actual:08x}", .path.display())]
    ChecksumMismatch {
        /// File where checksum failed
        path: PathBuf,
        /// Expected checksum value
        expected: u32,
        /// Actual checksum computed
        actual: u32,
        /// Byte offset of the corrupted data
        offset: u64,
    },

    /// Torn write detected (partial record at end of file)
    #[error("torn write in {} at offset {offset}: expected {expected_size} bytes, only {available_bytes} available", .path.display())]
    TornWrite {
        /// File with torn write
        path: PathBuf,
        /// Expected record size
        expected_size: u32,
        /// Actual bytes available
        available_bytes: u64,
        /// Offset where torn write begins
        offset: u64,
    },

    /// Magic bytes not found at expected location
    #[error("magic bytes not found in {} at offset {offset}: found {}", .path.display(), hex(.found_bytes))]
    NoMagicFound {
        /// File being read
        path: PathBuf,
        /// Offset where magic was expected
        offset: u64,
        /// Bytes actually found
        found_bytes: [u8; 4],
    },
}

impl StoreError {
    /// True when the error only reports an absent key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    /// Build an `Io` error with path context.
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error, what: &str) -> Self {
        StoreError::Io {
            path: Some(path.into()),
            kind: err.kind(),
            message: format!("{}: {}", what, err),
        }
    }
}

/// Convert std::io::Error to StoreError::Io
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Lowercase hex rendering used in error messages.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
