//! Configuration management for the store
//!
//! Provides presets for volatile and durable stores and validation of the
//! tunable limits.

use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// Endpoint selecting a volatile, process-local store.
pub const MEMORY_ENDPOINT: &str = "memory";

/// How hard a commit pushes its log record towards persistent media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Leave the record in the OS page cache
    None,
    /// Sync file data but not metadata
    Data,
    /// Flush through the device's volatile write cache where the platform allows it
    Full,
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoints to connect to; the first usable one wins
    pub endpoints: Vec<String>,
    /// Maximum key size in bytes
    pub max_key_size: usize,
    /// Maximum value size in bytes
    pub max_value_size: usize,
    /// Commit log rotation threshold (bytes)
    pub log_rotation_size_bytes: u64,
    /// Durability of each commit record
    pub sync_mode: SyncMode,
}

impl StoreConfig {
    /// Volatile store: nothing survives the process
    pub fn in_memory() -> Self {
        Self {
            endpoints: vec![MEMORY_ENDPOINT.to_string()],
            max_key_size: 4 * 1024,
            max_value_size: 32 * 1024 * 1024,
            log_rotation_size_bytes: 64 * 1024 * 1024,
            sync_mode: SyncMode::None,
        }
    }

    /// Durable store rooted at `path`, every commit synced before it becomes visible
    pub fn durable<P: AsRef<Path>>(path: P) -> Self {
        Self {
            endpoints: vec![format!("file://{}", path.as_ref().display())],
            sync_mode: SyncMode::Data,
            ..Self::in_memory()
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StoreResult<()> {
        if self.endpoints.is_empty() {
            return Err(StoreError::NoEndpoints);
        }
        if self.endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(StoreError::InvalidConfig("endpoints must not be blank".into()));
        }
        if self.max_key_size == 0 || self.max_key_size > u16::MAX as usize {
            return Err(StoreError::InvalidConfig("max_key_size must be in [1, 65535]".into()));
        }
        if self.max_value_size == 0 || self.max_value_size > 128 * 1024 * 1024 {
            return Err(StoreError::InvalidConfig("max_value_size must be in [1, 128MB]".into()));
        }
        if self.log_rotation_size_bytes < 1024 * 1024 {
            return Err(StoreError::InvalidConfig("log_rotation_size_bytes must be >= 1MB".into()));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self { Self::in_memory() }
}
