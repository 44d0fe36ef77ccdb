//! Capability traits of a transactional key-value store.
//!
//! Anything that can begin transactions, read and buffer writes inside them,
//! open ordered cursors, and commit atomically can back a namespaced database.
//! [`LocalStore`](crate::LocalStore) is the in-process implementation.

use crate::config::StoreConfig;
use crate::error::StoreResult;

/// Positioned cursor over a sorted key range.
///
/// `key` and `value` return empty slices once the cursor is invalid.
pub trait Cursor {
    fn valid(&self) -> bool;
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
    /// Advance one entry in the cursor's direction.
    fn next(&mut self) -> StoreResult<()>;
    /// Release the cursor; it is invalid afterwards.
    fn close(&mut self);
}

/// A snapshot-isolated transaction.
///
/// Writes are buffered until [`commit`](Transaction::commit); dropping an
/// unfinished transaction rolls it back.
pub trait Transaction {
    type Cursor: Cursor;

    /// Snapshot timestamp this transaction reads at.
    fn start_ts(&self) -> u64;

    /// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) when
    /// the key has no visible value.
    fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>>;

    /// Buffer a write. Zero-length values are rejected.
    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Buffer a delete. Deleting an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> StoreResult<()>;

    /// Ascending cursor over `[start, end)`; `None` leaves the range open above.
    fn iter(&self, start: &[u8], end: Option<&[u8]>) -> StoreResult<Self::Cursor>;

    /// Descending cursor over keys strictly below `upper`.
    fn iter_reverse(&self, upper: &[u8]) -> StoreResult<Self::Cursor>;

    /// Apply every buffered write atomically, or none of them.
    fn commit(self) -> StoreResult<()>;

    /// Discard every buffered write.
    fn rollback(self);
}

/// A handle that starts transactions. Shared by many callers.
pub trait TxnClient: Send + Sync {
    type Txn: Transaction;

    fn begin(&self) -> StoreResult<Self::Txn>;
}

/// Clients that can be built from an endpoint list.
pub trait Connect: TxnClient + Sized {
    /// Fails with [`StoreError::NoEndpoints`](crate::StoreError::NoEndpoints)
    /// when `config.endpoints` is empty.
    fn connect(config: &StoreConfig) -> StoreResult<Self>;
}
