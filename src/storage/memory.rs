//! In-memory storage implementations for testing and ephemeral use.

use super::KeyValueStore;
use crate::error::{ConduitError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A key-value store backed by a hash map.
///
/// Writes can be toggled to fail, which lets tests exercise rollback and
/// best-effort persistence paths.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, serde_json::Value>>,
    writes_fail: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            writes_fail: AtomicBool::new(false),
        }
    }

    /// Makes subsequent write operations fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.writes_fail.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.writes_fail.load(Ordering::SeqCst) {
            Err(ConduitError::storage("Write rejected by test store"))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn save(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.check_writable()?;
        self.entries
            .lock()
            .expect("memory store lock poisoned")
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .entries
            .lock()
            .expect("memory store lock poisoned")
            .get(key)
            .cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.check_writable()?;
        Ok(self
            .entries
            .lock()
            .expect("memory store lock poisoned")
            .remove(key)
            .is_some())
    }

    async fn clear(&self) -> Result<bool> {
        self.check_writable()?;
        self.entries
            .lock()
            .expect("memory store lock poisoned")
            .clear();
        Ok(true)
    }
}

/// A store that fails every operation, for failure-path tests.
pub struct FailingStore;

impl FailingStore {
    /// Creates a failing store.
    pub fn new() -> Self {
        Self
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn save(&self, _key: &str, _value: &serde_json::Value) -> Result<()> {
        Err(ConduitError::storage("Storage unavailable"))
    }

    async fn load(&self, _key: &str) -> Result<Option<serde_json::Value>> {
        Err(ConduitError::storage("Storage unavailable"))
    }

    async fn remove(&self, _key: &str) -> Result<bool> {
        Err(ConduitError::storage("Storage unavailable"))
    }

    async fn clear(&self) -> Result<bool> {
        Err(ConduitError::storage("Storage unavailable"))
    }
}
