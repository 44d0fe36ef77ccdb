//! Bounded range iterator over one instance's namespace.
//!
//! The iterator owns a transaction for its whole life and a raw cursor over
//! the shared keyspace opened in it. After positioning and after every
//! advance the raw position is checked against the namespace and the logical
//! bounds, and the iterator settles into one of three states:
//!
//! - **Active**: the cursor sits on a key of this namespace inside `[start, end)`
//! - **Exhausted**: the range or the namespace ran out
//! - **Errored**: the store failed or returned a key outside the namespace
//!
//! Both terminal states are final.

use nskv_core::{Cursor, Transaction};
use tracing::{debug, warn};

use crate::api::DbIterator;
use crate::codec::{decode_value, KeyCodec};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug)]
enum State {
    Active,
    Exhausted,
    Errored(DbError),
}

pub struct RangeIterator<T: Transaction> {
    /// `None` once closed
    txn: Option<T>,
    cursor: T::Cursor,
    codec: KeyCodec,
    direction: Direction,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    /// Physical forms of `start` and `end`
    lower: Option<Vec<u8>>,
    upper: Option<Vec<u8>>,
    /// Exclusive end of the namespace; keys under the prefix may sort past it
    namespace_end: Vec<u8>,
    state: State,
}

impl<T: Transaction> RangeIterator<T> {
    /// Position a new iterator inside `txn`. Bounds must already be checked
    /// for emptiness.
    pub(crate) fn open(
        txn: T,
        codec: KeyCodec,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        direction: Direction,
    ) -> DbResult<Self> {
        let lower = start.map(|s| codec.physical_key(s));
        let upper = end.map(|e| codec.physical_key(e));
        let namespace_end = codec.upper_bound();

        let cursor = match direction {
            Direction::Forward => {
                let from = lower.clone().unwrap_or_else(|| codec.physical_key(&[]));
                txn.iter(&from, Some(namespace_end.as_slice()))
            }
            Direction::Reverse => position_reverse(&txn, upper.as_deref(), &namespace_end),
        };
        let cursor = match cursor {
            Ok(cursor) => cursor,
            Err(err) => {
                txn.rollback();
                return Err(err.into());
            }
        };

        let mut iter = Self {
            txn: Some(txn),
            cursor,
            codec,
            direction,
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            lower,
            upper,
            namespace_end,
            state: State::Active,
        };
        iter.settle(true);
        Ok(iter)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    fn out_of_range(&self, key: &[u8]) -> bool {
        key >= self.namespace_end.as_slice()
            || self.lower.as_deref().is_some_and(|lower| key < lower)
            || self.upper.as_deref().is_some_and(|upper| key >= upper)
    }

    /// Derive the state from the raw cursor's position, skipping any entry
    /// stored under the bare prefix.
    ///
    /// A key outside the namespace ends iteration, except on a forward
    /// iterator's first position: the raw range is scoped to the namespace
    /// there, so such a key means the store misbehaved. A reverse iterator
    /// whose first position lies below the namespace is exhausted, not
    /// errored: an empty namespace sorting after a populated one reads as
    /// empty instead of failing.
    fn settle(&mut self, initial: bool) {
        loop {
            if !self.cursor.valid() {
                self.state = State::Exhausted;
                return;
            }
            let key = self.cursor.key();
            if !self.codec.contains(key) {
                self.state = if initial && self.direction == Direction::Forward {
                    State::Errored(DbError::NamespaceViolation {
                        key: key.to_vec(),
                        prefix: self.codec.prefix().to_vec(),
                    })
                } else {
                    State::Exhausted
                };
                return;
            }
            if key.len() == self.codec.prefix().len() {
                // Empty logical keys are never visible.
                if let Err(err) = self.cursor.next() {
                    self.state = State::Errored(err.into());
                    return;
                }
                continue;
            }
            self.state = if self.out_of_range(key) { State::Exhausted } else { State::Active };
            return;
        }
    }

    fn assert_valid(&self) {
        if !self.valid() {
            panic!("iterator is invalid");
        }
    }
}

/// Reverse cursor strictly below `min(end, namespace_end)`, falling back to
/// the namespace end when nothing lies below `end`.
fn position_reverse<T: Transaction>(
    txn: &T,
    end: Option<&[u8]>,
    namespace_end: &[u8],
) -> nskv_core::StoreResult<T::Cursor> {
    let Some(end) = end.filter(|end| *end < namespace_end) else {
        return txn.iter_reverse(namespace_end);
    };
    let mut cursor = txn.iter_reverse(end)?;
    if cursor.valid() {
        return Ok(cursor);
    }
    cursor.close();
    txn.iter_reverse(namespace_end)
}

impl<T: Transaction> DbIterator for RangeIterator<T> {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        matches!(self.state, State::Active)
    }

    fn next(&mut self) {
        self.assert_valid();
        match self.cursor.next() {
            Ok(()) => self.settle(false),
            Err(err) => self.state = State::Errored(err.into()),
        }
    }

    fn key(&self) -> &[u8] {
        self.assert_valid();
        &self.cursor.key()[self.codec.prefix().len()..]
    }

    fn value(&self) -> &[u8] {
        self.assert_valid();
        decode_value(self.cursor.value())
    }

    fn error(&self) -> Option<&DbError> {
        match &self.state {
            State::Errored(err) => Some(err),
            _ => None,
        }
    }

    fn close(&mut self) -> DbResult<()> {
        let Some(txn) = self.txn.take() else {
            return Ok(());
        };
        self.cursor.close();
        if matches!(self.state, State::Active) {
            self.state = State::Exhausted;
        }
        debug!(prefix = %String::from_utf8_lossy(self.codec.prefix()), "closing iterator");
        // Read-only, but the store expects every transaction to be finished.
        txn.commit().map_err(DbError::Commit)
    }
}

impl<T: Transaction> Drop for RangeIterator<T> {
    fn drop(&mut self) {
        if let Some(txn) = self.txn.take() {
            warn!(
                prefix = %String::from_utf8_lossy(self.codec.prefix()),
                "iterator dropped without close; rolling back its transaction"
            );
            self.cursor.close();
            txn.rollback();
        }
    }
}

impl<T: Transaction> std::fmt::Debug for RangeIterator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeIterator")
            .field("prefix", &String::from_utf8_lossy(self.codec.prefix()))
            .field("direction", &self.direction)
            .field("state", &self.state)
            .finish()
    }
}
