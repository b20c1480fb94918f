//! On-disk state store behavior, including reuse across components.

use db_conduit::history::{HistoryFilter, HistoryStore};
use db_conduit::registry::{ConnectionProfile, ConnectionRegistry};
use db_conduit::storage::{KeyValueStore, StateStore};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_registry_and_history_share_one_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let storage: Arc<dyn KeyValueStore> = Arc::new(StateStore::open(&path).await.unwrap());
        let registry = ConnectionRegistry::open(storage.clone()).await.unwrap();
        registry
            .register(ConnectionProfile::new("c1", "db.example.com", "admin").with_schema("P2P"))
            .await
            .unwrap();

        let history = HistoryStore::open(storage, 50).await;
        history
            .append(db_conduit::history::HistoryEntry {
                id: "q1".to_string(),
                connection_id: "c1".to_string(),
                sql: "SELECT 1".to_string(),
                query_type: db_conduit::classify::QueryType::Select,
                success: true,
                row_count: 1,
                elapsed_ms: 3,
                executed_at: chrono::Utc::now(),
                error: None,
            })
            .await;
    }

    // A fresh process sees both collections
    let storage: Arc<dyn KeyValueStore> = Arc::new(StateStore::open(&path).await.unwrap());
    let registry = ConnectionRegistry::open(storage.clone()).await.unwrap();
    let profile = registry.get("c1").await.unwrap();
    assert_eq!(profile.schema.as_deref(), Some("P2P"));
    assert!(profile.is_default);

    let history = HistoryStore::open(storage, 50).await;
    let entries = history.list(&HistoryFilter::default()).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "q1");
}

#[tokio::test]
async fn test_collections_are_isolated_by_key() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");

    let storage: Arc<dyn KeyValueStore> = Arc::new(StateStore::open(&path).await.unwrap());
    let registry = ConnectionRegistry::open(storage.clone()).await.unwrap();
    registry
        .register(ConnectionProfile::new("c1", "h", "u"))
        .await
        .unwrap();

    // Clearing history must not disturb connections
    let history = HistoryStore::open(storage.clone(), 50).await;
    assert!(history.clear(None).await);

    let reopened = ConnectionRegistry::open(storage).await.unwrap();
    assert_eq!(reopened.get_all().await.len(), 1);
}
