//! Query history persistence.
//!
//! Keeps a bounded, newest-first log of past executions. History is
//! best-effort: storage failures are reported as a boolean and never block
//! query execution.

use crate::classify::QueryType;
use crate::error::Result;
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

const STORAGE_KEY: &str = "query_history";

/// Default maximum number of retained entries.
pub const DEFAULT_CAPACITY: usize = 50;

/// A record of one past execution attempt. Never mutated once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Query identifier assigned by the gateway.
    pub id: String,

    /// Connection the query ran against.
    pub connection_id: String,

    /// The SQL text as submitted.
    pub sql: String,

    /// Classified statement type.
    pub query_type: QueryType,

    /// Whether the execution succeeded.
    pub success: bool,

    /// Rows returned (zero for failures).
    pub row_count: usize,

    /// Execution time in milliseconds.
    pub elapsed_ms: u64,

    /// When the execution finished.
    pub executed_at: DateTime<Utc>,

    /// Error message for failed executions.
    pub error: Option<String>,
}

/// Filter options for listing history. Filters compose with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Only entries for this connection.
    pub connection_id: Option<String>,

    /// Only successful executions.
    pub success_only: bool,

    /// Maximum number of entries to return; defaults to the store capacity.
    pub limit: Option<usize>,
}

/// Bounded, newest-first store of history entries.
pub struct HistoryStore {
    storage: Arc<dyn KeyValueStore>,
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl HistoryStore {
    /// Opens the history store, loading any persisted entries.
    ///
    /// A failed or corrupt load starts the store empty rather than failing;
    /// history must never block startup.
    pub async fn open(storage: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        let entries = match storage.load(STORAGE_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<Vec<HistoryEntry>>(value) {
                Ok(list) => list.into_iter().take(capacity).collect(),
                Err(e) => {
                    warn!("Discarding corrupt query history: {e}");
                    VecDeque::new()
                }
            },
            Ok(None) => VecDeque::new(),
            Err(e) => {
                warn!("Could not load query history: {e}");
                VecDeque::new()
            }
        };

        Self {
            storage,
            capacity,
            entries: Mutex::new(entries),
        }
    }

    /// Opens the store with the default capacity.
    pub async fn open_default(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::open(storage, DEFAULT_CAPACITY).await
    }

    /// Returns the configured maximum size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends an entry at the head, evicting the oldest entries while the
    /// store is over capacity.
    ///
    /// Returns whether the updated list was persisted. The in-memory list is
    /// updated either way.
    pub async fn append(&self, entry: HistoryEntry) -> bool {
        let mut entries = self.entries.lock().await;
        entries.push_front(entry);
        while entries.len() > self.capacity {
            entries.pop_back();
        }

        match self.persist(&entries).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist query history: {e}");
                false
            }
        }
    }

    /// Lists entries newest-first, applying the given filter.
    pub async fn list(&self, filter: &HistoryFilter) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().await;
        let limit = filter.limit.unwrap_or(self.capacity);

        entries
            .iter()
            .filter(|e| {
                filter
                    .connection_id
                    .as_ref()
                    .map_or(true, |id| &e.connection_id == id)
            })
            .filter(|e| !filter.success_only || e.success)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the number of retained entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true if no entries are retained.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Clears history, optionally scoped to one connection.
    ///
    /// Returns whether the cleared list was persisted.
    pub async fn clear(&self, connection_id: Option<&str>) -> bool {
        let mut entries = self.entries.lock().await;
        match connection_id {
            Some(id) => entries.retain(|e| e.connection_id != id),
            None => entries.clear(),
        }

        match self.persist(&entries).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist query history: {e}");
                false
            }
        }
    }

    async fn persist(&self, entries: &VecDeque<HistoryEntry>) -> Result<()> {
        let list: Vec<&HistoryEntry> = entries.iter().collect();
        let value = serde_json::to_value(&list)
            .map_err(|e| crate::error::ConduitError::internal(format!("Failed to encode: {e}")))?;
        self.storage.save(STORAGE_KEY, &value).await
    }
}
