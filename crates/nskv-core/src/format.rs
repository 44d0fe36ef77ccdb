//! Binary format of commit log records
//!
//! One record holds the complete write set of one committed transaction:
//! RecordHeader (32 bytes) + commit_ts(u64) + mutation_count(u32) + mutations
//!
//! Each mutation is: operation(u8) + padding(u8) + key_len(u16) + value_len(u32) + key + value

use std::path::PathBuf;

use crate::error::{StoreError, StoreResult};

/// Magic bytes identifying commit records: "NSKV" in ASCII
pub const MAGIC_ARRAY: [u8; 4] = [0x4E, 0x53, 0x4B, 0x56];

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Record kind for a committed transaction
pub const RECORD_COMMIT: u8 = 1;

const MUTATION_HEADER_SIZE: usize = 1 + 1 + 2 + 4;
const PAYLOAD_PREFIX_SIZE: usize = 8 + 4;

/// Mutation operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    /// Insert or update a key-value pair
    Put = 1,
    /// Delete a key
    Delete = 2,
}

/// One buffered write of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl Mutation {
    pub fn key(&self) -> &[u8] {
        match self {
            Mutation::Put { key, .. } | Mutation::Delete { key } => key,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Mutation::Put { .. } => Operation::Put,
            Mutation::Delete { .. } => Operation::Delete,
        }
    }

    fn value(&self) -> &[u8] {
        match self {
            Mutation::Put { value, .. } => value,
            Mutation::Delete { .. } => &[],
        }
    }
}

/// Fixed-size header for each commit record
///
/// Layout:
///   [0..4]   magic:    "NSKV"
///   [4..8]   length:   u32  - payload length in bytes
///   [8..12]  checksum: u32  - CRC32C of payload bytes
///   [12]     kind:     u8   - record kind
///   [13..32] reserved, zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: [u8; 4],
    pub length: u32,
    pub checksum: u32,
    pub kind: u8,
}

/// A decoded commit record.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub header: RecordHeader,
    pub commit_ts: u64,
    pub mutations: Vec<Mutation>,
}

impl RecordHeader {
    pub fn new(length: u32, checksum: u32, kind: u8) -> Self {
        Self { magic: MAGIC_ARRAY, length, checksum, kind }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..8].copy_from_slice(&self.length.to_le_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        buf[12] = self.kind;
        buf
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            length: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            checksum: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            kind: bytes[12],
        }
    }
}

/// Serialize the write set of one transaction into a complete record.
pub fn serialize_commit(commit_ts: u64, mutations: &[Mutation]) -> StoreResult<Vec<u8>> {
    let mut payload_size = PAYLOAD_PREFIX_SIZE;
    for m in mutations {
        // Field widths bound what a record can carry.
        if m.key().len() > u16::MAX as usize {
            return Err(StoreError::OversizedEntry {
                entry_size: m.key().len() as u64,
                max_size: u16::MAX as u64,
                component: "key",
            });
        }
        if m.value().len() > u32::MAX as usize {
            return Err(StoreError::OversizedEntry {
                entry_size: m.value().len() as u64,
                max_size: u32::MAX as u64,
                component: "value",
            });
        }
        payload_size += MUTATION_HEADER_SIZE + m.key().len() + m.value().len();
    }

    let mut payload = Vec::with_capacity(payload_size);
    payload.extend_from_slice(&commit_ts.to_le_bytes());
    payload.extend_from_slice(&(mutations.len() as u32).to_le_bytes());
    for m in mutations {
        payload.push(m.operation() as u8);
        payload.push(0);
        payload.extend_from_slice(&(m.key().len() as u16).to_le_bytes());
        payload.extend_from_slice(&(m.value().len() as u32).to_le_bytes());
        payload.extend_from_slice(m.key());
        payload.extend_from_slice(m.value());
    }

    let header = RecordHeader::new(payload.len() as u32, crc32c::crc32c(&payload), RECORD_COMMIT);

    let mut buffer = Vec::with_capacity(HEADER_SIZE + payload.len());
    buffer.extend_from_slice(&header.to_bytes());
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

fn corrupted(offset: usize, reason: String) -> StoreError {
    StoreError::LogCorrupted { path: PathBuf::from("<buffer>"), offset: offset as u64, reason }
}

/// Deserialize one commit record from the start of `data`.
pub fn deserialize_commit(data: &[u8]) -> StoreResult<CommitRecord> {
    let header_bytes: &[u8; HEADER_SIZE] = data
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| {
            corrupted(
                0,
                format!("record too short: {} bytes, need at least {}", data.len(), HEADER_SIZE),
            )
        })?;
    let header = RecordHeader::from_bytes(header_bytes);

    if header.magic != MAGIC_ARRAY {
        return Err(StoreError::NoMagicFound {
            path: PathBuf::from("<buffer>"),
            offset: 0,
            found_bytes: header.magic,
        });
    }

    let payload_end = HEADER_SIZE + header.length as usize;
    if data.len() < payload_end {
        return Err(StoreError::TornWrite {
            path: PathBuf::from("<buffer>"),
            expected_size: header.length,
            available_bytes: (data.len() - HEADER_SIZE) as u64,
            offset: HEADER_SIZE as u64,
        });
    }
    let payload = &data[HEADER_SIZE..payload_end];

    let computed = crc32c::crc32c(payload);
    if computed != header.checksum {
        return Err(StoreError::ChecksumMismatch {
            path: PathBuf::from("<buffer>"),
            expected: header.checksum,
            actual: computed,
            offset: HEADER_SIZE as u64,
        });
    }
    if header.kind != RECORD_COMMIT {
        return Err(corrupted(12, format!("unknown record kind: {}", header.kind)));
    }
    if payload.len() < PAYLOAD_PREFIX_SIZE {
        return Err(corrupted(HEADER_SIZE, "payload too short for commit timestamp".to_string()));
    }

    let commit_ts = u64::from_le_bytes(payload[0..8].try_into().unwrap_or_default());
    let count = u32::from_le_bytes(payload[8..12].try_into().unwrap_or_default()) as usize;

    let mut mutations = Vec::with_capacity(count.min(payload.len() / MUTATION_HEADER_SIZE));
    let mut pos = PAYLOAD_PREFIX_SIZE;
    for _ in 0..count {
        if payload.len() < pos + MUTATION_HEADER_SIZE {
            return Err(corrupted(HEADER_SIZE + pos, "truncated mutation header".to_string()));
        }
        let op = payload[pos];
        let key_len = u16::from_le_bytes([payload[pos + 2], payload[pos + 3]]) as usize;
        let value_len = u32::from_le_bytes([
            payload[pos + 4], payload[pos + 5], payload[pos + 6], payload[pos + 7],
        ]) as usize;
        let key_start = pos + MUTATION_HEADER_SIZE;
        let value_start = key_start + key_len;
        let end = value_start + value_len;
        if payload.len() < end {
            return Err(corrupted(
                HEADER_SIZE + pos,
                format!(
                    "payload too short: need {} bytes for key({}) + value({})",
                    end, key_len, value_len
                ),
            ));
        }
        let key = payload[key_start..value_start].to_vec();
        let mutation = match op {
            1 => Mutation::Put { key, value: payload[value_start..end].to_vec() },
            2 => Mutation::Delete { key },
            other => {
                return Err(corrupted(
                    HEADER_SIZE + pos,
                    format!("invalid operation type: {}", other),
                ))
            }
        };
        mutations.push(mutation);
        pos = end;
    }

    Ok(CommitRecord { header, commit_ts, mutations })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Mutation> {
        vec![
            Mutation::Put { key: b"a/k1".to_vec(), value: b"v1".to_vec() },
            Mutation::Delete { key: b"a/k2".to_vec() },
            Mutation::Put { key: b"a/k3".to_vec(), value: b"NULL".to_vec() },
        ]
    }

    #[test]
    fn test_commit_record_preserves_order_and_timestamp() {
        let bytes = serialize_commit(42, &sample()).unwrap();
        let record = deserialize_commit(&bytes).unwrap();

        assert_eq!(record.commit_ts, 42);
        assert_eq!(record.mutations, sample());
        assert_eq!(record.header.magic, MAGIC_ARRAY);
        assert_eq!(record.header.kind, RECORD_COMMIT);
    }

    #[test]
    fn test_empty_write_set_is_representable() {
        let bytes = serialize_commit(7, &[]).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + PAYLOAD_PREFIX_SIZE);
        assert!(deserialize_commit(&bytes).unwrap().mutations.is_empty());
    }

    #[test]
    fn test_oversized_key_rejected() {
        let m = vec![Mutation::Delete { key: vec![0u8; u16::MAX as usize + 1] }];
        let result = serialize_commit(1, &m);
        assert!(matches!(result, Err(StoreError::OversizedEntry { component: "key", .. })));
    }

    #[test]
    fn test_corrupted_magic_detected() {
        let mut data = serialize_commit(1, &sample()).unwrap();
        data[0] = 0xFF;
        assert!(matches!(deserialize_commit(&data), Err(StoreError::NoMagicFound { .. })));
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let mut data = serialize_commit(1, &sample()).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(matches!(deserialize_commit(&data), Err(StoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_truncated_record_is_torn() {
        let data = serialize_commit(1, &sample()).unwrap();
        let cut = &data[..data.len() - 3];
        assert!(matches!(deserialize_commit(cut), Err(StoreError::TornWrite { .. })));
    }

    #[test]
    fn test_short_buffer_is_corrupted() {
        assert!(matches!(deserialize_commit(&[0u8; 5]), Err(StoreError::LogCorrupted { .. })));
    }
}
