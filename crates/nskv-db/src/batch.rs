//! Write batches.
//!
//! Writes are recorded in call order with keys already translated and values
//! already encoded, and applied in that order inside one transaction on
//! [`write`](Batch::write). Nothing touches the store before that.

use std::sync::Arc;

use nskv_core::{Transaction, TxnClient};
use tracing::debug;

use crate::api::Batch;
use crate::codec::{encode_value, KeyCodec};
use crate::error::{DbError, DbResult};
use crate::scope::with_txn;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingWrite {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

pub struct WriteBatch<C: TxnClient> {
    client: Arc<C>,
    codec: KeyCodec,
    writes: Vec<PendingWrite>,
}

impl<C: TxnClient> WriteBatch<C> {
    pub(crate) fn new(client: Arc<C>, codec: KeyCodec) -> Self {
        Self { client, codec, writes: Vec::new() }
    }

    /// Number of pending writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    fn flush(&self) -> DbResult<()> {
        with_txn(self.client.as_ref(), |txn| {
            for write in &self.writes {
                match write {
                    PendingWrite::Set { key, value } => txn.set(key, value)?,
                    PendingWrite::Delete { key } => txn.delete(key)?,
                }
            }
            Ok(())
        })?;
        debug!(
            prefix = %String::from_utf8_lossy(self.codec.prefix()),
            writes = self.writes.len(),
            "flushed write batch"
        );
        Ok(())
    }
}

impl<C: TxnClient> Batch for WriteBatch<C> {
    fn set(&mut self, key: &[u8], value: Option<&[u8]>) -> DbResult<()> {
        if key.is_empty() {
            return Err(DbError::KeyEmpty);
        }
        let value = value.ok_or(DbError::ValueNil)?;
        self.writes.push(PendingWrite::Set {
            key: self.codec.physical_key(key),
            value: encode_value(value).to_vec(),
        });
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        if key.is_empty() {
            return Err(DbError::KeyEmpty);
        }
        self.writes.push(PendingWrite::Delete { key: self.codec.physical_key(key) });
        Ok(())
    }

    fn write(&mut self) -> DbResult<()> {
        self.flush()
    }

    fn write_sync(&mut self) -> DbResult<()> {
        self.flush()
    }

    fn close(&mut self) {
        self.writes.clear();
    }
}

impl<C: TxnClient> std::fmt::Debug for WriteBatch<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBatch")
            .field("prefix", &String::from_utf8_lossy(self.codec.prefix()))
            .field("pending", &self.writes.len())
            .finish()
    }
}
