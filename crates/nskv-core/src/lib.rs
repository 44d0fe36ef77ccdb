//! nskv core: transactional MVCC key-value store
//!
//! The capability set a namespaced database is built on: snapshot-isolated
//! transactions with buffered writes, ordered forward and reverse cursors, and
//! atomic commits.
//!
//! # Architecture
//!
//! - **Reads**: snapshot reads at the transaction's start timestamp
//! - **Writes**: buffered per transaction, checked first-committer-wins at commit
//! - **Durability**: optional commit log, one checksummed record per commit
//!
//! The traits in [`client`] are the seam: adapters are written against them,
//! and [`LocalStore`] is the in-process implementation.

pub mod client;
pub mod config;
pub mod cursor;
pub mod error;
pub mod format;
pub mod log;
pub mod mvcc;
pub mod platform_durability;
pub mod store;
pub mod txn;

// Re-export key types for convenience
pub use client::{Connect, Cursor, Transaction, TxnClient};
pub use config::{StoreConfig, SyncMode, MEMORY_ENDPOINT};
pub use cursor::LocalCursor;
pub use error::{StoreError, StoreResult};
pub use format::{Mutation, Operation};
pub use store::LocalStore;
pub use txn::LocalTxn;
