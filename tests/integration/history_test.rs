//! History store bounds and filtering through the public surface.

use chrono::Utc;
use db_conduit::classify::QueryType;
use db_conduit::history::{HistoryEntry, HistoryFilter, HistoryStore};
use db_conduit::storage::MemoryStore;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn entry(id: &str, connection_id: &str, success: bool) -> HistoryEntry {
    HistoryEntry {
        id: id.to_string(),
        connection_id: connection_id.to_string(),
        sql: format!("SELECT '{id}'"),
        query_type: QueryType::Select,
        success,
        row_count: 1,
        elapsed_ms: 2,
        executed_at: Utc::now(),
        error: None,
    }
}

#[tokio::test]
async fn test_store_never_exceeds_capacity() {
    let store = HistoryStore::open(Arc::new(MemoryStore::new()), 4).await;

    for i in 0..20 {
        store.append(entry(&format!("q{i}"), "c1", true)).await;
        assert!(store.len().await <= 4);
    }

    // Oldest evicted first: the survivors are the newest four
    let ids: Vec<String> = store
        .list(&HistoryFilter::default())
        .await
        .iter()
        .map(|e| e.id.clone())
        .collect();
    assert_eq!(ids, vec!["q19", "q18", "q17", "q16"]);
}

#[tokio::test]
async fn test_default_listing_bounded_by_capacity() {
    let store = HistoryStore::open(Arc::new(MemoryStore::new()), 3).await;
    for i in 0..3 {
        store.append(entry(&format!("q{i}"), "c1", true)).await;
    }

    let entries = store.list(&HistoryFilter::default()).await;
    assert_eq!(entries.len(), 3);
}

#[tokio::test]
async fn test_combined_filters() {
    let store = HistoryStore::open(Arc::new(MemoryStore::new()), 20).await;
    store.append(entry("q1", "c1", true)).await;
    store.append(entry("q2", "c1", false)).await;
    store.append(entry("q3", "c2", true)).await;
    store.append(entry("q4", "c1", true)).await;

    let filter = HistoryFilter {
        connection_id: Some("c1".to_string()),
        success_only: true,
        limit: None,
    };
    let entries = store.list(&filter).await;
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["q4", "q1"]);
}

#[tokio::test]
async fn test_scoped_clear_leaves_other_connections() {
    let store = HistoryStore::open(Arc::new(MemoryStore::new()), 20).await;
    store.append(entry("q1", "c1", true)).await;
    store.append(entry("q2", "c2", true)).await;
    store.append(entry("q3", "c1", true)).await;

    assert!(store.clear(Some("c1")).await);

    let remaining = store.list(&HistoryFilter::default()).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].connection_id, "c2");

    assert!(store.clear(None).await);
    assert!(store.is_empty().await);
}
