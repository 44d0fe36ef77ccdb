//! One transaction per logical operation.

use nskv_core::{Transaction, TxnClient};

use crate::error::{DbError, DbResult};

/// Begin a transaction, run `op` in it, and finish it.
///
/// A failed `op` rolls the transaction back and its error is returned as is.
/// A successful `op` is committed; a commit failure is returned as
/// [`DbError::Commit`] so it cannot be mistaken for the operation's own error.
pub(crate) fn with_txn<C, R, F>(client: &C, op: F) -> DbResult<R>
where
    C: TxnClient + ?Sized,
    F: FnOnce(&mut C::Txn) -> DbResult<R>,
{
    let mut txn = client.begin()?;
    match op(&mut txn) {
        Ok(value) => {
            txn.commit().map_err(DbError::Commit)?;
            Ok(value)
        }
        Err(err) => {
            txn.rollback();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nskv_core::{LocalStore, StoreError};

    #[test]
    fn test_success_commits() {
        let store = LocalStore::in_memory();
        let got = with_txn(&store, |txn| {
            txn.set(b"k", b"v")?;
            Ok(7)
        })
        .unwrap();
        assert_eq!(got, 7);
        assert_eq!(store.begin_txn().get(b"k").unwrap(), b"v".to_vec());
        assert_eq!(store.active_transactions(), 0);
    }

    #[test]
    fn test_failure_rolls_back_and_keeps_error() {
        let store = LocalStore::in_memory();
        let err = with_txn(&store, |txn| -> DbResult<()> {
            txn.set(b"k", b"v")?;
            txn.set(b"empty", b"")?;
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err, DbError::Store(StoreError::EmptyValue));
        assert!(store.is_empty());
        assert_eq!(store.active_transactions(), 0);
    }

    #[test]
    fn test_commit_failure_is_reported_separately() {
        let store = LocalStore::in_memory();
        let err = with_txn(&store, |txn| {
            txn.set(b"k", b"mine")?;
            // A competing commit lands between our begin and commit.
            let mut other = store.begin_txn();
            other.set(b"k", b"theirs")?;
            other.commit()?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, DbError::Commit(StoreError::WriteConflict { .. })));
        assert_eq!(store.begin_txn().get(b"k").unwrap(), b"theirs".to_vec());
    }
}
