//! In-process transactional store.
//!
//! `LocalStore` combines an MVCC version map with a timestamp oracle and an
//! optional commit log.
//!
//! **Read path**: snapshot reads at the transaction's start timestamp under a RwLock
//! **Commit path**: conflict check, then log append + sync, then publish under a new timestamp
//! **Recovery**: replay every intact commit record in order

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::client::{Connect, TxnClient};
use crate::config::{StoreConfig, MEMORY_ENDPOINT};
use crate::error::{StoreError, StoreResult};
use crate::format::Mutation;
use crate::log::{CommitLogReader, CommitLogWriter};
use crate::mvcc::VersionedMap;
use crate::txn::LocalTxn;

/// State shared by the store, its transactions and their cursors.
pub(crate) struct Shared {
    pub(crate) data: RwLock<VersionedMap>,
    /// Timestamp of the newest published commit
    oracle: AtomicU64,
    /// Serializes commits; holds the log writer for durable stores
    commit: Mutex<Option<CommitLogWriter>>,
    /// Start timestamps of unfinished transactions, with multiplicity
    active: Mutex<BTreeMap<u64, usize>>,
    pub(crate) config: StoreConfig,
}

impl Shared {
    fn new(
        data: VersionedMap,
        last_ts: u64,
        log: Option<CommitLogWriter>,
        config: StoreConfig,
    ) -> Self {
        Self {
            data: RwLock::new(data),
            oracle: AtomicU64::new(last_ts),
            commit: Mutex::new(log),
            active: Mutex::new(BTreeMap::new()),
            config,
        }
    }

    /// Take a snapshot timestamp and register it as active.
    pub(crate) fn begin_ts(&self) -> u64 {
        let mut active = self.active.lock();
        let ts = self.oracle.load(Ordering::Acquire);
        *active.entry(ts).or_insert(0) += 1;
        ts
    }

    pub(crate) fn finish_ts(&self, ts: u64) {
        let mut active = self.active.lock();
        if let Some(count) = active.get_mut(&ts) {
            *count -= 1;
            if *count == 0 {
                active.remove(&ts);
            }
        }
    }

    /// Commit a write set read at `start_ts`.
    ///
    /// First committer wins: any key already committed after `start_ts` aborts
    /// the whole commit and nothing is applied.
    pub(crate) fn commit(
        &self,
        start_ts: u64,
        mutations: Vec<Mutation>,
    ) -> StoreResult<Option<u64>> {
        if mutations.is_empty() {
            return Ok(None);
        }

        let mut log = self.commit.lock();
        {
            let data = self.data.read();
            for m in &mutations {
                if let Some(conflict_ts) = data.latest_commit_ts(m.key()) {
                    if conflict_ts > start_ts {
                        return Err(StoreError::WriteConflict {
                            key: m.key().to_vec(),
                            start_ts,
                            conflict_ts,
                        });
                    }
                }
            }
        }

        let commit_ts = self.oracle.load(Ordering::Acquire) + 1;
        if let Some(writer) = log.as_mut() {
            writer.append_commit(commit_ts, &mutations)?;
        }
        self.data.write().apply(commit_ts, &mutations);
        self.oracle.store(commit_ts, Ordering::Release);
        Ok(Some(commit_ts))
    }
}

enum Endpoint {
    Memory,
    Dir(PathBuf),
}

fn parse_endpoint(endpoint: &str) -> Endpoint {
    let endpoint = endpoint.trim();
    if endpoint == MEMORY_ENDPOINT || endpoint.starts_with("memory://") {
        Endpoint::Memory
    } else if let Some(path) = endpoint.strip_prefix("file://") {
        Endpoint::Dir(PathBuf::from(path))
    } else {
        Endpoint::Dir(PathBuf::from(endpoint))
    }
}

/// Transactional MVCC store living in this process.
///
/// All methods take `&self`; share it behind an `Arc`.
pub struct LocalStore {
    shared: Arc<Shared>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Volatile store with default limits.
    pub fn in_memory() -> Self {
        Self {
            shared: Arc::new(Shared::new(VersionedMap::new(), 0, None, StoreConfig::in_memory())),
            path: None,
        }
    }

    /// Open or create a durable store at `path`, replaying its commit log.
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let log_dir = path.join("log");

        let records = CommitLogReader::new(&log_dir).recover()?;
        let mut data = VersionedMap::new();
        let mut last_ts = 0;
        for record in &records {
            data.apply(record.commit_ts, &record.mutations);
            last_ts = last_ts.max(record.commit_ts);
        }
        if !records.is_empty() {
            info!(commits = records.len(), last_ts, path = %path.display(), "recovered commit log");
        }

        let writer =
            CommitLogWriter::open(&log_dir, config.log_rotation_size_bytes, config.sync_mode)?;
        Ok(Self {
            shared: Arc::new(Shared::new(data, last_ts, Some(writer), config)),
            path: Some(path),
        })
    }

    /// Start a transaction at the current timestamp.
    pub fn begin_txn(&self) -> LocalTxn {
        LocalTxn::new(Arc::clone(&self.shared))
    }

    /// Keys with a live value at the latest timestamp.
    pub fn len(&self) -> usize {
        let ts = self.current_ts();
        self.shared.data.read().live_count(ts)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of the newest published commit.
    pub fn current_ts(&self) -> u64 {
        self.shared.oracle.load(Ordering::Acquire)
    }

    /// Transactions begun but not yet committed, rolled back or dropped.
    pub fn active_transactions(&self) -> usize {
        self.shared.active.lock().values().sum()
    }

    /// Prune versions that no active or future transaction can read.
    /// Returns the number of versions removed.
    pub fn gc(&self) -> usize {
        let safe_ts = {
            let active = self.shared.active.lock();
            active.keys().next().copied().unwrap_or_else(|| self.current_ts())
        };
        let removed = self.shared.data.write().prune(safe_ts);
        debug!(safe_ts, removed, "pruned old versions");
        removed
    }

    /// Root directory of a durable store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }
}

impl TxnClient for LocalStore {
    type Txn = LocalTxn;

    fn begin(&self) -> StoreResult<LocalTxn> {
        Ok(self.begin_txn())
    }
}

impl Connect for LocalStore {
    fn connect(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let (first, rest) = config.endpoints.split_first().ok_or(StoreError::NoEndpoints)?;
        if !rest.is_empty() {
            debug!(
                endpoint = %first,
                ignored = rest.len(),
                "local store uses the first endpoint only"
            );
        }
        match parse_endpoint(first) {
            Endpoint::Memory => Ok(Self {
                shared: Arc::new(Shared::new(VersionedMap::new(), 0, None, config.clone())),
                path: None,
            }),
            Endpoint::Dir(path) => Self::open(path, config.clone()),
        }
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("path", &self.path)
            .field("current_ts", &self.current_ts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Transaction;
    use tempfile::TempDir;

    #[test]
    fn test_open_empty() {
        let store = LocalStore::in_memory();
        assert!(store.is_empty());
        assert_eq!(store.current_ts(), 0);
        assert_eq!(store.active_transactions(), 0);
    }

    #[test]
    fn test_commit_advances_timestamp() {
        let store = LocalStore::in_memory();
        let mut txn = store.begin_txn();
        txn.set(b"hello", b"world").unwrap();
        txn.commit().unwrap();

        assert_eq!(store.current_ts(), 1);
        assert_eq!(store.len(), 1);

        // Read-only commits publish nothing.
        store.begin_txn().commit().unwrap();
        assert_eq!(store.current_ts(), 1);
    }

    #[test]
    fn test_first_committer_wins() {
        let store = LocalStore::in_memory();
        let mut t1 = store.begin_txn();
        let mut t2 = store.begin_txn();
        t1.set(b"k", b"one").unwrap();
        t2.set(b"k", b"two").unwrap();
        t2.set(b"other", b"x").unwrap();

        t1.commit().unwrap();
        let err = t2.commit().unwrap_err();
        assert!(matches!(err, StoreError::WriteConflict { ref key, .. } if key == b"k"));

        // Nothing of the losing transaction is visible.
        let reader = store.begin_txn();
        assert_eq!(reader.get(b"k").unwrap(), b"one".to_vec());
        assert!(reader.get(b"other").unwrap_err().is_not_found());
    }

    #[test]
    fn test_active_transactions_tracked() {
        let store = LocalStore::in_memory();
        let t1 = store.begin_txn();
        let t2 = store.begin_txn();
        assert_eq!(store.active_transactions(), 2);
        t1.rollback();
        drop(t2);
        assert_eq!(store.active_transactions(), 0);
    }

    #[test]
    fn test_gc_respects_active_snapshot() {
        let store = LocalStore::in_memory();
        for v in [b"v1", b"v2"] {
            let mut txn = store.begin_txn();
            txn.set(b"k", v).unwrap();
            txn.commit().unwrap();
        }
        let old_reader = store.begin_txn();
        let mut txn = store.begin_txn();
        txn.set(b"k", b"v3").unwrap();
        txn.commit().unwrap();

        store.gc();
        assert_eq!(old_reader.get(b"k").unwrap(), b"v2".to_vec());
        drop(old_reader);

        assert_eq!(store.gc(), 1);
        assert_eq!(store.begin_txn().get(b"k").unwrap(), b"v3".to_vec());
    }

    #[test]
    fn test_crash_recovery() {
        let dir = TempDir::new().unwrap();
        {
            let store = LocalStore::open(dir.path(), StoreConfig::durable(dir.path())).unwrap();
            let mut txn = store.begin_txn();
            txn.set(b"survive1", b"yes").unwrap();
            txn.set(b"survive2", b"also_yes").unwrap();
            txn.set(b"doomed", b"temp").unwrap();
            txn.commit().unwrap();

            let mut txn = store.begin_txn();
            txn.delete(b"doomed").unwrap();
            txn.commit().unwrap();
        }
        {
            let store = LocalStore::open(dir.path(), StoreConfig::durable(dir.path())).unwrap();
            assert_eq!(store.current_ts(), 2);
            let txn = store.begin_txn();
            assert_eq!(txn.get(b"survive1").unwrap(), b"yes".to_vec());
            assert_eq!(txn.get(b"survive2").unwrap(), b"also_yes".to_vec());
            assert!(txn.get(b"doomed").unwrap_err().is_not_found());
            assert_eq!(store.len(), 2);
        }
    }

    #[test]
    fn test_connect_dispatches_on_endpoint() {
        let store = LocalStore::connect(&StoreConfig::in_memory()).unwrap();
        assert!(store.path().is_none());

        let dir = TempDir::new().unwrap();
        let store = LocalStore::connect(&StoreConfig::durable(dir.path())).unwrap();
        assert_eq!(store.path(), Some(dir.path()));

        let config = StoreConfig { endpoints: Vec::new(), ..StoreConfig::default() };
        assert_eq!(LocalStore::connect(&config).unwrap_err(), StoreError::NoEndpoints);
    }

    #[test]
    fn test_concurrent_commits_on_disjoint_keys() {
        let store = Arc::new(LocalStore::in_memory());
        let mut handles = vec![];
        for t in 0..8 {
            let s = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    let mut txn = s.begin_txn();
                    txn.set(format!("t{}-k{}", t, i).as_bytes(), b"v").unwrap();
                    txn.commit().unwrap();
                }
            }));
        }
        for h in handles { h.join().unwrap(); }
        assert_eq!(store.len(), 400);
        assert_eq!(store.current_ts(), 400);
    }
}
