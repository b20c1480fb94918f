//! Export formatting against results produced by the gateway.

use db_conduit::backend::MockBackend;
use db_conduit::error::ConduitError;
use db_conduit::format;
use db_conduit::gateway::{ExecuteOptions, Gateway};
use db_conduit::history::HistoryStore;
use db_conduit::registry::{ConnectionProfile, ConnectionRegistry};
use db_conduit::storage::MemoryStore;
use pretty_assertions::assert_eq;
use std::sync::Arc;

async fn executed_result(row_count: usize) -> db_conduit::gateway::QueryResult {
    let storage = Arc::new(MemoryStore::new());
    let registry = Arc::new(ConnectionRegistry::open(storage.clone()).await.unwrap());
    registry
        .register(ConnectionProfile::new("c1", "h", "u"))
        .await
        .unwrap();
    let history = Arc::new(HistoryStore::open(storage, 50).await);
    let backend = Arc::new(MockBackend::new().with_row_count(row_count));
    let gateway = Gateway::new(registry, history, backend);

    gateway
        .execute("c1", "SELECT * FROM t", &ExecuteOptions::default())
        .await
}

#[tokio::test]
async fn test_csv_export_shape() {
    let result = executed_result(4).await;
    let csv = format::to_delimited_text(&result, b',').unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    // Header plus one line per row
    assert_eq!(lines.len(), result.row_count + 1);
    for line in &lines {
        assert_eq!(line.split(',').count(), result.columns.len());
    }
}

#[tokio::test]
async fn test_empty_export_is_rejected() {
    // A non-SELECT yields zero rows from the mock backend
    let storage = Arc::new(MemoryStore::new());
    let registry = Arc::new(ConnectionRegistry::open(storage.clone()).await.unwrap());
    registry
        .register(ConnectionProfile::new("c1", "h", "u"))
        .await
        .unwrap();
    let history = Arc::new(HistoryStore::open(storage, 50).await);
    let gateway = Gateway::new(registry, history, Arc::new(MockBackend::new()));

    let result = gateway
        .execute("c1", "INSERT INTO t VALUES (1)", &ExecuteOptions::default())
        .await;
    assert!(result.success);
    assert_eq!(result.row_count, 0);

    let err = format::to_delimited_text(&result, b',').unwrap_err();
    assert!(matches!(err, ConduitError::Validation(_)));
    let err = format::to_structured_document(&result).unwrap_err();
    assert!(matches!(err, ConduitError::Validation(_)));
}

#[tokio::test]
async fn test_json_export_keys_by_column() {
    let result = executed_result(2).await;
    let doc = format::to_structured_document(&result).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&doc).unwrap();
    let array = parsed.as_array().unwrap();

    assert_eq!(array.len(), 2);
    for object in array {
        let object = object.as_object().unwrap();
        for column in &result.columns {
            assert!(object.contains_key(&column.name));
        }
    }
}

#[tokio::test]
async fn test_summary_reflects_truncation() {
    let storage = Arc::new(MemoryStore::new());
    let registry = Arc::new(ConnectionRegistry::open(storage.clone()).await.unwrap());
    registry
        .register(ConnectionProfile::new("c1", "h", "u"))
        .await
        .unwrap();
    let history = Arc::new(HistoryStore::open(storage, 50).await);
    let backend = Arc::new(MockBackend::new().with_row_count(10));
    let gateway = Gateway::new(registry, history, backend);

    let options = ExecuteOptions::default().with_max_rows(3);
    let result = gateway.execute("c1", "SELECT * FROM t", &options).await;

    let summary = format::summarize(&result);
    assert_eq!(summary.row_count, 3);
    assert_eq!(summary.column_count, result.columns.len());
    assert!(summary.truncated);
}
