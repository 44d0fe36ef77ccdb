//! Database-facing interface.
//!
//! These are the traits a pluggable backend registry consumes: a keyed
//! database with point operations, bounded iteration and write batches.
//! [`NamespacedDb`](crate::NamespacedDb) implements them over any
//! [`TxnClient`](nskv_core::TxnClient).

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::DbResult;

/// A logical, ordered byte-key database.
///
/// Values are `Option<&[u8]>` on the write side: `None` is rejected with
/// [`DbError::ValueNil`](crate::DbError::ValueNil) while `Some(&[])` stores an
/// empty value. Bounds are `None` for "unbounded"; a zero-length bound is
/// rejected with [`DbError::KeyEmpty`](crate::DbError::KeyEmpty).
pub trait Database {
    type Iterator: DbIterator;
    type Batch: Batch;

    /// `None` when the key is absent.
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>>;

    fn has(&self, key: &[u8]) -> DbResult<bool>;

    fn set(&self, key: &[u8], value: Option<&[u8]>) -> DbResult<()>;

    fn set_sync(&self, key: &[u8], value: Option<&[u8]>) -> DbResult<()>;

    /// Deleting an absent key succeeds.
    fn delete(&self, key: &[u8]) -> DbResult<()>;

    fn delete_sync(&self, key: &[u8]) -> DbResult<()>;

    /// Ascending over `[start, end)`.
    fn iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> DbResult<Self::Iterator>;

    /// Descending over `[start, end)`.
    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<Self::Iterator>;

    fn new_batch(&self) -> Self::Batch;

    /// Write every entry to `out`, one hex-encoded `[key]:\t[value]` line each.
    fn print<W: Write>(&self, out: &mut W) -> DbResult<()>;

    fn stats(&self) -> BTreeMap<String, String>;

    fn close(&self) -> DbResult<()>;
}

/// Cursor over a bounded range of one database.
///
/// `key`, `value` and `next` panic unless [`valid`](DbIterator::valid) is true.
pub trait DbIterator {
    /// The logical bounds the iterator was created with.
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>);
    fn valid(&self) -> bool;
    fn next(&mut self);
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
    /// Error that stopped iteration, if any.
    fn error(&self) -> Option<&crate::DbError>;
    /// Release the cursor and finish the iterator's transaction.
    fn close(&mut self) -> DbResult<()>;
}

/// Writes buffered in order and applied in one transaction.
pub trait Batch {
    fn set(&mut self, key: &[u8], value: Option<&[u8]>) -> DbResult<()>;
    fn delete(&mut self, key: &[u8]) -> DbResult<()>;
    fn write(&mut self) -> DbResult<()>;
    /// Same as [`write`](Batch::write); no separate durability level exists.
    fn write_sync(&mut self) -> DbResult<()>;
    /// Drop pending writes. The batch may be reused.
    fn close(&mut self);
}
