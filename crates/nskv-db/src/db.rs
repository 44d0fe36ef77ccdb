//! `Database` implementation for one namespaced instance.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use nskv_core::{Connect, StoreError, Transaction, TxnClient};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::api::{Database, DbIterator};
use crate::batch::WriteBatch;
use crate::codec::{decode_value, encode_value, state_key, KeyCodec};
use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::iterator::{Direction, RangeIterator};
use crate::scope::with_txn;

/// Reported as `database.type` in [`Database::stats`].
pub const DATABASE_TYPE: &str = "nskvDB";

const MARKER_VALUE: &[u8] = b"1";

/// One logical database, identified by `(name, dir)`, over a shared store.
///
/// Every key lives under the prefix `dir/name/`. Handles with different
/// `(name, dir)` pairs share one client without seeing each other's keys.
/// Closing a handle leaves the client open for the other handles.
pub struct NamespacedDb<C: TxnClient> {
    client: Arc<C>,
    name: String,
    dir: String,
    codec: KeyCodec,
    state_key: Vec<u8>,
    /// Guards removal of the coordination marker
    lock: Mutex<()>,
}

impl<C: TxnClient> NamespacedDb<C> {
    /// Open `dir/name` over `client` with the default configuration.
    pub fn new(name: &str, dir: &str, client: Arc<C>) -> DbResult<Self> {
        Self::with_config(name, dir, client, &DbConfig::default())
    }

    /// Open `dir/name` over `client`.
    ///
    /// With `config.exclusive` the instance's coordination marker is claimed
    /// and opening fails with [`DbError::InstanceInUse`] while another handle
    /// holds it. `config.store` is not used; the client is already connected.
    pub fn with_config(name: &str, dir: &str, client: Arc<C>, config: &DbConfig) -> DbResult<Self> {
        let db = Self {
            codec: KeyCodec::new(dir, name, config.namespace_bound),
            state_key: state_key(dir, name),
            client,
            name: name.to_string(),
            dir: dir.to_string(),
            lock: Mutex::new(()),
        };
        if config.exclusive {
            db.claim_marker()?;
        }
        debug!(
            prefix = %db.prefix(),
            exclusive = config.exclusive,
            bound = ?config.namespace_bound,
            "opened database"
        );
        Ok(db)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// The namespace prefix, `dir/name/`.
    pub fn prefix(&self) -> String {
        String::from_utf8_lossy(self.codec.prefix()).into_owned()
    }

    /// The shared store client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    fn claim_marker(&self) -> DbResult<()> {
        with_txn(self.client.as_ref(), |txn| match txn.get(&self.state_key) {
            Ok(_) => Err(DbError::InstanceInUse { dir: self.dir.clone(), name: self.name.clone() }),
            Err(StoreError::NotFound) => Ok(txn.set(&self.state_key, MARKER_VALUE)?),
            Err(err) => Err(err.into()),
        })
    }

    fn set_kv(&self, key: &[u8], value: Option<&[u8]>) -> DbResult<()> {
        if key.is_empty() {
            return Err(DbError::KeyEmpty);
        }
        let value = value.ok_or(DbError::ValueNil)?;
        let physical = self.codec.physical_key(key);
        with_txn(self.client.as_ref(), |txn| Ok(txn.set(&physical, encode_value(value))?))
    }

    fn delete_key(&self, key: &[u8]) -> DbResult<()> {
        if key.is_empty() {
            return Err(DbError::KeyEmpty);
        }
        let physical = self.codec.physical_key(key);
        with_txn(self.client.as_ref(), |txn| Ok(txn.delete(&physical)?))
    }

    fn open_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        direction: Direction,
    ) -> DbResult<RangeIterator<C::Txn>> {
        if start.is_some_and(<[u8]>::is_empty) || end.is_some_and(<[u8]>::is_empty) {
            return Err(DbError::KeyEmpty);
        }
        let txn = self.client.begin()?;
        RangeIterator::open(txn, self.codec.clone(), start, end, direction)
    }
}

impl<C: Connect> NamespacedDb<C> {
    /// Connect a new client to `config.store` and open `dir/name` over it.
    ///
    /// Fails with `NoEndpoints` when the endpoint list is empty.
    pub fn connect(name: &str, dir: &str, config: &DbConfig) -> DbResult<Self> {
        let client = C::connect(&config.store)?;
        Self::with_config(name, dir, Arc::new(client), config)
    }
}

impl<C: TxnClient> Database for NamespacedDb<C> {
    type Iterator = RangeIterator<C::Txn>;
    type Batch = WriteBatch<C>;

    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        let physical = self.codec.physical_key(key);
        with_txn(self.client.as_ref(), |txn| match txn.get(&physical) {
            Ok(stored) => Ok(Some(decode_value(&stored).to_vec())),
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        })
    }

    fn has(&self, key: &[u8]) -> DbResult<bool> {
        let physical = self.codec.physical_key(key);
        with_txn(self.client.as_ref(), |txn| match txn.get(&physical) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(err) => Err(err.into()),
        })
    }

    fn set(&self, key: &[u8], value: Option<&[u8]>) -> DbResult<()> {
        self.set_kv(key, value)
    }

    fn set_sync(&self, key: &[u8], value: Option<&[u8]>) -> DbResult<()> {
        self.set_kv(key, value)
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        self.delete_key(key)
    }

    fn delete_sync(&self, key: &[u8]) -> DbResult<()> {
        self.delete_key(key)
    }

    fn iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> DbResult<Self::Iterator> {
        self.open_iterator(start, end, Direction::Forward)
    }

    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<Self::Iterator> {
        self.open_iterator(start, end, Direction::Reverse)
    }

    fn new_batch(&self) -> Self::Batch {
        WriteBatch::new(Arc::clone(&self.client), self.codec.clone())
    }

    fn print<W: Write>(&self, out: &mut W) -> DbResult<()> {
        writeln!(out, "prefix: {}", self.prefix()).map_err(StoreError::from)?;
        let mut iter = self.iterator(None, None)?;
        let printed = dump(&mut iter, out);
        let closed = iter.close();
        printed.map_err(StoreError::from)?;
        if let Some(err) = iter.error() {
            return Err(err.clone());
        }
        closed
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::new();
        stats.insert("database.type".to_string(), DATABASE_TYPE.to_string());
        stats.insert("database.prefix".to_string(), self.prefix());
        stats
    }

    /// Remove this instance's coordination marker. The shared client stays open.
    fn close(&self) -> DbResult<()> {
        let _guard = self.lock.lock();
        let result = with_txn(self.client.as_ref(), |txn| Ok(txn.delete(&self.state_key)?));
        match &result {
            Ok(()) => debug!(prefix = %self.prefix(), "closed database"),
            Err(err) => warn!(
                prefix = %self.prefix(),
                error = %err,
                "failed to release coordination marker"
            ),
        }
        result
    }
}

fn dump<T: Transaction, W: Write>(iter: &mut RangeIterator<T>, out: &mut W) -> std::io::Result<()> {
    while iter.valid() {
        writeln!(out, "[{}]:\t[{}]", upper_hex(iter.key()), upper_hex(iter.value()))?;
        iter.next();
    }
    Ok(())
}

fn upper_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

impl<C: TxnClient> std::fmt::Debug for NamespacedDb<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespacedDb")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("prefix", &self.prefix())
            .finish()
    }
}
