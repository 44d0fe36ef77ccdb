//! Snapshot-isolated transactions over a [`LocalStore`](crate::LocalStore).
//!
//! Reads go to the buffered write set first, then to the version map at the
//! start timestamp. Writes stay buffered until commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::Transaction;
use crate::cursor::LocalCursor;
use crate::error::{StoreError, StoreResult};
use crate::format::Mutation;
use crate::store::Shared;

/// Buffered writes: `None` marks a delete.
pub(crate) type WriteSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

pub struct LocalTxn {
    shared: Arc<Shared>,
    start_ts: u64,
    writes: WriteSet,
    finished: bool,
}

impl LocalTxn {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let start_ts = shared.begin_ts();
        Self { shared, start_ts, writes: BTreeMap::new(), finished: false }
    }

    /// Number of buffered writes.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    fn check_key(&self, key: &[u8]) -> StoreResult<()> {
        let max = self.shared.config.max_key_size;
        if key.len() > max {
            return Err(StoreError::OversizedEntry {
                entry_size: key.len() as u64,
                max_size: max as u64,
                component: "key",
            });
        }
        Ok(())
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.shared.finish_ts(self.start_ts);
        }
    }
}

impl Transaction for LocalTxn {
    type Cursor = LocalCursor;

    fn start_ts(&self) -> u64 {
        self.start_ts
    }

    fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        if let Some(buffered) = self.writes.get(key) {
            return buffered.clone().ok_or(StoreError::NotFound);
        }
        self.shared
            .data
            .read()
            .get_at(key, self.start_ts)
            .map(<[u8]>::to_vec)
            .ok_or(StoreError::NotFound)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.check_key(key)?;
        if value.is_empty() {
            return Err(StoreError::EmptyValue);
        }
        let max = self.shared.config.max_value_size;
        if value.len() > max {
            return Err(StoreError::OversizedEntry {
                entry_size: value.len() as u64,
                max_size: max as u64,
                component: "value",
            });
        }
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        self.check_key(key)?;
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn iter(&self, start: &[u8], end: Option<&[u8]>) -> StoreResult<LocalCursor> {
        Ok(LocalCursor::forward(
            Arc::clone(&self.shared),
            self.start_ts,
            self.writes.clone(),
            start,
            end,
        ))
    }

    fn iter_reverse(&self, upper: &[u8]) -> StoreResult<LocalCursor> {
        Ok(LocalCursor::reverse(
            Arc::clone(&self.shared),
            self.start_ts,
            self.writes.clone(),
            upper,
        ))
    }

    fn commit(mut self) -> StoreResult<()> {
        let mutations: Vec<Mutation> = std::mem::take(&mut self.writes)
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => Mutation::Put { key, value },
                None => Mutation::Delete { key },
            })
            .collect();
        let result = self.shared.commit(self.start_ts, mutations);
        self.finish();
        result.map(|_| ())
    }

    fn rollback(mut self) {
        self.writes.clear();
        self.finish();
    }
}

impl Drop for LocalTxn {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for LocalTxn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTxn")
            .field("start_ts", &self.start_ts)
            .field("pending_writes", &self.writes.len())
            .finish()
    }
}
