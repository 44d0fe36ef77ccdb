//! Commit log for durable stores
//!
//! Every commit appends exactly one record holding its full write set, so a
//! transaction is recovered whole or not at all. Write ordering:
//! 1. Serialize the write set into one record (CRC32C over the payload)
//! 2. Append the record to the current log file
//! 3. Sync according to the configured [`SyncMode`]
//! 4. Return; only then does the commit become visible to readers

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};
use crate::format::{
    deserialize_commit, serialize_commit, CommitRecord, Mutation, HEADER_SIZE, MAGIC_ARRAY,
};
use crate::platform_durability::sync_file;

const LOG_PREFIX: &str = "commit-";
const LOG_SUFFIX: &str = ".nskv";

fn log_file_name(sequence: u64) -> String {
    format!("{}{:016x}{}", LOG_PREFIX, sequence, LOG_SUFFIX)
}

fn parse_sequence(name: &str) -> Option<u64> {
    let hex = name.strip_prefix(LOG_PREFIX)?.strip_suffix(LOG_SUFFIX)?;
    u64::from_str_radix(hex, 16).ok()
}

/// Appends commit records, rotating files past a size threshold.
pub struct CommitLogWriter {
    file: File,
    path: PathBuf,
    size: u64,
    dir: PathBuf,
    sequence: u64,
    rotation_size: u64,
    sync_mode: SyncMode,
}

impl CommitLogWriter {
    /// Open a writer in `dir`, resuming the highest-numbered log file.
    pub fn open<P: AsRef<Path>>(
        dir: P,
        rotation_size: u64,
        sync_mode: SyncMode,
    ) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(&dir, e, "failed to create log directory"))?;

        let sequence = Self::find_max_sequence(&dir);
        let path = dir.join(log_file_name(sequence));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e, "failed to open log file"))?;
        let size = file
            .metadata()
            .map_err(|e| StoreError::io(&path, e, "failed to stat log file"))?
            .len();

        Ok(Self { file, path, size, dir, sequence, rotation_size, sync_mode })
    }

    fn find_max_sequence(dir: &Path) -> u64 {
        std::fs::read_dir(dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().and_then(parse_sequence))
            .max()
            .unwrap_or(0)
    }

    /// Append one commit and sync it. The caller publishes the commit only
    /// after this returns `Ok`.
    pub fn append_commit(&mut self, commit_ts: u64, mutations: &[Mutation]) -> StoreResult<()> {
        let record = serialize_commit(commit_ts, mutations)?;

        if self.size > 0 && self.size + record.len() as u64 > self.rotation_size {
            self.rotate()?;
        }

        self.file
            .write_all(&record)
            .map_err(|e| StoreError::io(&self.path, e, "log write failed"))?;
        sync_file(&self.file, self.sync_mode)
            .map_err(|e| StoreError::io(&self.path, e, "log sync failed"))?;

        self.size += record.len() as u64;
        Ok(())
    }

    fn rotate(&mut self) -> StoreResult<()> {
        // The outgoing file is always fully synced, whatever the per-commit mode.
        sync_file(&self.file, SyncMode::Data)
            .map_err(|e| StoreError::io(&self.path, e, "log sync before rotation failed"))?;

        self.sequence += 1;
        let new_path = self.dir.join(log_file_name(self.sequence));
        let new_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&new_path)
            .map_err(|e| StoreError::io(&new_path, e, "failed to create rotated log file"))?;

        self.file = new_file;
        self.path = new_path;
        self.size = 0;
        Ok(())
    }

    pub fn current_path(&self) -> &Path {
        &self.path
    }

    pub fn current_size(&self) -> u64 {
        self.size
    }
}

/// Replays commit records during recovery.
pub struct CommitLogReader {
    dir: PathBuf,
}

impl CommitLogReader {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Recover every intact commit record, in file and append order.
    ///
    /// Per file: a torn record at the tail is the crash point and ends that
    /// file; a bad magic or checksum skips forward to the next magic.
    pub fn recover(&self) -> StoreResult<Vec<CommitRecord>> {
        let mut files: Vec<(u64, PathBuf)> = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e, "failed to read log directory")),
        };
        for entry in entries {
            let entry = entry
                .map_err(|e| StoreError::io(&self.dir, e, "failed to read directory entry"))?;
            if let Some(seq) = entry.file_name().to_str().and_then(parse_sequence) {
                files.push((seq, entry.path()));
            }
        }
        files.sort();

        let mut records = Vec::new();
        for (_, path) in &files {
            records.extend(self.recover_file(path)?);
        }
        Ok(records)
    }

    fn recover_file(&self, path: &Path) -> StoreResult<Vec<CommitRecord>> {
        let mut buffer = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut buffer))
            .map_err(|e| StoreError::io(path, e, "failed to read log file"))?;

        let mut records = Vec::new();
        let mut offset = 0;
        while offset + HEADER_SIZE <= buffer.len() {
            if buffer[offset..offset + 4] != MAGIC_ARRAY {
                warn!(path = %path.display(), offset, "bad magic in commit log, resynchronizing");
                match find_next_magic(&buffer, offset + 1) {
                    Some(next) => {
                        offset = next;
                        continue;
                    }
                    None => break,
                }
            }

            let length = u32::from_le_bytes([
                buffer[offset + 4], buffer[offset + 5], buffer[offset + 6], buffer[offset + 7],
            ]) as usize;
            let total = HEADER_SIZE + length;
            if offset + total > buffer.len() {
                warn!(
                    path = %path.display(),
                    offset,
                    needed = total,
                    available = buffer.len() - offset,
                    "torn commit record, discarding tail"
                );
                break;
            }

            match deserialize_commit(&buffer[offset..offset + total]) {
                Ok(record) => {
                    records.push(record);
                    offset += total;
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        offset,
                        error = %e,
                        "corrupt commit record, skipping"
                    );
                    match find_next_magic(&buffer, offset + 1) {
                        Some(next) => {
                            offset = next;
                            continue;
                        }
                        None => break,
                    }
                }
            }
        }
        Ok(records)
    }
}

/// Scan forward for the next record magic.
fn find_next_magic(buffer: &[u8], start: usize) -> Option<usize> {
    buffer
        .windows(4)
        .skip(start)
        .position(|w| w == MAGIC_ARRAY)
        .map(|p| p + start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn put(k: &[u8], v: &[u8]) -> Mutation {
        Mutation::Put { key: k.to_vec(), value: v.to_vec() }
    }

    #[test]
    fn test_log_write_read_roundtrip() {
        let temp = TempDir::new().unwrap();

        let mut writer = CommitLogWriter::open(temp.path(), 1024 * 1024, SyncMode::Data).unwrap();
        writer.append_commit(1, &[put(b"key1", b"value1"), put(b"key2", b"value2")]).unwrap();
        writer.append_commit(2, &[Mutation::Delete { key: b"key1".to_vec() }]).unwrap();
        drop(writer);

        let records = CommitLogReader::new(temp.path()).recover().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].commit_ts, 1);
        assert_eq!(records[0].mutations.len(), 2);
        assert_eq!(records[1].mutations, vec![Mutation::Delete { key: b"key1".to_vec() }]);
    }

    #[test]
    fn test_corrupt_record_skipped() {
        let temp = TempDir::new().unwrap();

        let mut writer = CommitLogWriter::open(temp.path(), 1024 * 1024, SyncMode::None).unwrap();
        writer.append_commit(1, &[put(b"good1", b"val1")]).unwrap();
        let first_len = writer.current_size() as usize;
        writer.append_commit(2, &[put(b"bad", b"val2")]).unwrap();
        writer.append_commit(3, &[put(b"good3", b"val3")]).unwrap();
        let path = writer.current_path().to_path_buf();
        drop(writer);

        // Flip the last payload byte of the second record.
        let mut data = std::fs::read(&path).unwrap();
        let second_len = HEADER_SIZE + 12 + 8 + 3 + 4;
        data[first_len + second_len - 1] ^= 0xFF;
        std::fs::write(&path, data).unwrap();

        let records = CommitLogReader::new(temp.path()).recover().unwrap();
        let ts: Vec<u64> = records.iter().map(|r| r.commit_ts).collect();
        assert_eq!(ts, vec![1, 3]);
    }

    #[test]
    fn test_torn_record_discards_whole_transaction() {
        let temp = TempDir::new().unwrap();

        let mut writer = CommitLogWriter::open(temp.path(), 1024 * 1024, SyncMode::None).unwrap();
        writer.append_commit(1, &[put(b"complete", b"entry")]).unwrap();
        let path = writer.current_path().to_path_buf();
        drop(writer);

        // Half of a second record: the batch never committed.
        let partial = serialize_commit(2, &[put(b"a", b"1"), put(b"b", b"2")]).unwrap();
        let mut data = std::fs::read(&path).unwrap();
        data.extend_from_slice(&partial[..partial.len() / 2]);
        std::fs::write(&path, data).unwrap();

        let records = CommitLogReader::new(temp.path()).recover().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mutations, vec![put(b"complete", b"entry")]);
    }

    #[test]
    fn test_missing_directory_recovers_nothing() {
        let temp = TempDir::new().unwrap();
        let records = CommitLogReader::new(temp.path().join("absent")).recover().unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_rotation_keeps_order() {
        let temp = TempDir::new().unwrap();
        let mut writer = CommitLogWriter::open(temp.path(), 64, SyncMode::None).unwrap();
        for ts in 1..=5u64 {
            writer.append_commit(ts, &[put(format!("k{}", ts).as_bytes(), b"v")]).unwrap();
        }
        let name = writer.current_path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with(LOG_PREFIX) && name.ends_with(LOG_SUFFIX));
        assert_ne!(parse_sequence(&name), Some(0));
        drop(writer);

        let records = CommitLogReader::new(temp.path()).recover().unwrap();
        let ts: Vec<u64> = records.iter().map(|r| r.commit_ts).collect();
        assert_eq!(ts, vec![1, 2, 3, 4, 5]);
    }
}
