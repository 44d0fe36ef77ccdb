//! Namespaced key-value databases over a shared transactional store
//!
//! Presents many isolated, ordered byte-key databases on top of one
//! transactional MVCC store, for example [`nskv_core::LocalStore`].
//!
//! # Architecture
//!
//! Each logical database is identified by a `(name, dir)` pair and owns the
//! key prefix `dir/name/` in the shared keyspace:
//! - Point reads and writes run in one short transaction each
//! - Iterators own a transaction from open to close and never leave their
//!   namespace or their `[start, end)` bounds
//! - Batches buffer writes and apply them in one transaction
//! - Empty values are stored as the sentinel `NULL`, since the store rejects
//!   zero-length values

pub mod api;
pub mod batch;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod iterator;
mod scope;

pub use api::{Batch, Database, DbIterator};
pub use batch::WriteBatch;
pub use codec::{KeyCodec, EMPTY_VALUE_SENTINEL, NAMESPACE_SENTINEL};
pub use config::{DbConfig, NamespaceBound, ENDPOINTS_ENV};
pub use db::NamespacedDb;
pub use error::{DbError, DbResult};
pub use iterator::{Direction, RangeIterator};
