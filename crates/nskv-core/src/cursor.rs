//! Ordered cursors over a transaction's snapshot.
//!
//! A cursor captures the owning transaction's buffered writes when it is
//! opened and merges them with the committed snapshot on every step. Each step
//! takes the version map's read lock only for the lookup, so a long-lived
//! cursor never blocks commits.

use std::ops::Bound;
use std::sync::Arc;

use crate::client::Cursor;
use crate::error::StoreResult;
use crate::store::Shared;
use crate::txn::WriteSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

pub struct LocalCursor {
    shared: Arc<Shared>,
    ts: u64,
    writes: WriteSet,
    direction: Direction,
    /// Exclusive upper bound of a forward scan
    end: Option<Vec<u8>>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl LocalCursor {
    pub(crate) fn forward(
        shared: Arc<Shared>,
        ts: u64,
        writes: WriteSet,
        start: &[u8],
        end: Option<&[u8]>,
    ) -> Self {
        let mut cursor = Self {
            shared,
            ts,
            writes,
            direction: Direction::Forward,
            end: end.map(<[u8]>::to_vec),
            current: None,
        };
        cursor.current = cursor.seek_forward(Bound::Included(start));
        cursor
    }

    pub(crate) fn reverse(shared: Arc<Shared>, ts: u64, writes: WriteSet, upper: &[u8]) -> Self {
        let mut cursor = Self {
            shared,
            ts,
            writes,
            direction: Direction::Reverse,
            end: None,
            current: None,
        };
        cursor.current = cursor.seek_reverse(Bound::Excluded(upper));
        cursor
    }

    /// First entry after `lower`, buffered writes shadowing the snapshot.
    fn seek_forward(&self, lower: Bound<&[u8]>) -> Option<(Vec<u8>, Vec<u8>)> {
        let data = self.shared.data.read();
        let end = self.end.as_deref();
        let mut lower: Bound<Vec<u8>> = lower.map(<[u8]>::to_vec);
        loop {
            let lower_ref = lower.as_ref().map(Vec::as_slice);
            let committed = data.next_visible(lower_ref, end, self.ts);
            let buffered = if is_empty_range(lower_ref, end) {
                None
            } else {
                let upper = end.map_or(Bound::Unbounded, Bound::Excluded);
                self.writes.range::<[u8], _>((lower_ref, upper)).next()
            };

            match (committed, buffered) {
                (None, None) => return None,
                (Some((k, v)), None) => return Some((k.to_vec(), v.to_vec())),
                (c, Some((bk, bv))) => {
                    if let Some((k, v)) = c {
                        if k < bk.as_slice() {
                            return Some((k.to_vec(), v.to_vec()));
                        }
                    }
                    match bv {
                        Some(v) => return Some((bk.clone(), v.clone())),
                        None => lower = Bound::Excluded(bk.clone()),
                    }
                }
            }
        }
    }

    /// Last entry before `upper`, buffered writes shadowing the snapshot.
    fn seek_reverse(&self, upper: Bound<&[u8]>) -> Option<(Vec<u8>, Vec<u8>)> {
        let data = self.shared.data.read();
        let mut upper: Bound<Vec<u8>> = upper.map(<[u8]>::to_vec);
        loop {
            let upper_ref = upper.as_ref().map(Vec::as_slice);
            let committed = data.prev_visible(upper_ref, self.ts);
            let buffered = self.writes.range::<[u8], _>((Bound::Unbounded, upper_ref)).next_back();

            match (committed, buffered) {
                (None, None) => return None,
                (Some((k, v)), None) => return Some((k.to_vec(), v.to_vec())),
                (c, Some((bk, bv))) => {
                    if let Some((k, v)) = c {
                        if k > bk.as_slice() {
                            return Some((k.to_vec(), v.to_vec()));
                        }
                    }
                    match bv {
                        Some(v) => return Some((bk.clone(), v.clone())),
                        None => upper = Bound::Excluded(bk.clone()),
                    }
                }
            }
        }
    }
}

fn is_empty_range(lower: Bound<&[u8]>, end: Option<&[u8]>) -> bool {
    match (lower, end) {
        (Bound::Included(l) | Bound::Excluded(l), Some(e)) => l >= e,
        _ => false,
    }
}

impl Cursor for LocalCursor {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        match &self.current {
            Some((k, _)) => k,
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match &self.current {
            Some((_, v)) => v,
            None => &[],
        }
    }

    fn next(&mut self) -> StoreResult<()> {
        if let Some((key, _)) = self.current.take() {
            self.current = match self.direction {
                Direction::Forward => self.seek_forward(Bound::Excluded(key.as_slice())),
                Direction::Reverse => self.seek_reverse(Bound::Excluded(key.as_slice())),
            };
        }
        Ok(())
    }

    fn close(&mut self) {
        self.current = None;
        self.writes.clear();
    }
}

impl std::fmt::Debug for LocalCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCursor")
            .field("ts", &self.ts)
            .field("direction", &self.direction)
            .field("position", &self.current.as_ref().map(|(k, _)| k))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{Cursor, Transaction};
    use crate::store::LocalStore;

    fn seeded() -> LocalStore {
        let store = LocalStore::in_memory();
        let mut txn = store.begin_txn();
        for k in ["a", "b", "c", "d", "e"] {
            txn.set(k.as_bytes(), k.to_uppercase().as_bytes()).unwrap();
        }
        txn.commit().unwrap();
        store
    }

    fn drain<C: Cursor>(mut cursor: C) -> Vec<String> {
        let mut out = Vec::new();
        while cursor.valid() {
            out.push(String::from_utf8(cursor.key().to_vec()).unwrap());
            cursor.next().unwrap();
        }
        out
    }

    #[test]
    fn test_forward_range_is_half_open() {
        let store = seeded();
        let txn = store.begin_txn();
        assert_eq!(drain(txn.iter(b"b", Some(&b"d"[..])).unwrap()), vec!["b", "c"]);
        assert_eq!(drain(txn.iter(b"", None).unwrap()), vec!["a", "b", "c", "d", "e"]);
        assert!(drain(txn.iter(b"d", Some(&b"b"[..])).unwrap()).is_empty());
    }

    #[test]
    fn test_reverse_excludes_upper() {
        let store = seeded();
        let txn = store.begin_txn();
        assert_eq!(drain(txn.iter_reverse(b"d").unwrap()), vec!["c", "b", "a"]);
        assert_eq!(drain(txn.iter_reverse(b"cc").unwrap()), vec!["c", "b", "a"]);
        assert!(drain(txn.iter_reverse(b"a").unwrap()).is_empty());
    }

    #[test]
    fn test_reverse_merges_buffered_writes() {
        let store = seeded();
        let mut txn = store.begin_txn();
        txn.delete(b"d").unwrap();
        txn.set(b"bb", b"X").unwrap();
        assert_eq!(drain(txn.iter_reverse(b"z").unwrap()), vec!["e", "c", "bb", "b", "a"]);
    }

    #[test]
    fn test_cursor_value_and_close() {
        let store = seeded();
        let txn = store.begin_txn();
        let mut cursor = txn.iter(b"c", None).unwrap();
        assert_eq!(cursor.key(), b"c");
        assert_eq!(cursor.value(), b"C");
        cursor.close();
        assert!(!cursor.valid());
        assert!(cursor.key().is_empty());
        assert!(cursor.value().is_empty());
    }

    #[test]
    fn test_cursor_keeps_snapshot_across_commits() {
        let store = seeded();
        let txn = store.begin_txn();
        let mut cursor = txn.iter(b"", None).unwrap();
        cursor.next().unwrap();

        let mut writer = store.begin_txn();
        writer.delete(b"c").unwrap();
        writer.set(b"bz", b"new").unwrap();
        writer.commit().unwrap();

        assert_eq!(drain(cursor), vec!["b", "c", "d", "e"]);
    }
}
