//! Error types for namespaced database operations

use nskv_core::error::hex;
use nskv_core::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    /// A key was required but a zero-length one was given
    #[error("key cannot be empty")]
    KeyEmpty,

    /// A value was required but none was given
    #[error("value cannot be nil")]
    ValueNil,

    /// The store yielded a key outside this instance's namespace
    #[error("received invalid key from backend: {} (expected prefix {})", hex(.key), hex(.prefix))]
    NamespaceViolation { key: Vec<u8>, prefix: Vec<u8> },

    /// Another handle holds the coordination marker for this instance
    #[error("database '{dir}/{name}' is already in use")]
    InstanceInUse { dir: String, name: String },

    /// The store rejected an operation
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The operation succeeded but its transaction failed to commit
    #[error("commit failed: {0}")]
    Commit(#[source] StoreError),
}

impl DbError {
    /// The underlying store error, whether it came from the operation or its commit.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            DbError::Store(e) | DbError::Commit(e) => Some(e),
            _ => None,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
