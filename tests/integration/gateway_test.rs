//! End-to-end gateway scenarios.
//!
//! Wires the registry, history store, and mock backend together the way the
//! binary does and drives executions through the public surface.

use db_conduit::backend::{MockBackend, QueryBackend};
use db_conduit::classify::QueryType;
use db_conduit::gateway::{ExecuteOptions, Gateway};
use db_conduit::history::{HistoryFilter, HistoryStore};
use db_conduit::registry::{ConnectionProfile, ConnectionRegistry};
use db_conduit::storage::MemoryStore;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

async fn build_gateway(
    backend: Arc<dyn QueryBackend>,
) -> (Arc<Gateway>, Arc<ConnectionRegistry>, Arc<HistoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let registry = Arc::new(ConnectionRegistry::open(storage.clone()).await.unwrap());
    let history = Arc::new(HistoryStore::open(storage, 50).await);
    let gateway = Arc::new(Gateway::new(registry.clone(), history.clone(), backend));
    (gateway, registry, history)
}

#[tokio::test]
async fn test_register_execute_truncate_and_audit() {
    let backend = Arc::new(MockBackend::new().with_row_count(5));
    let (gateway, registry, history) = build_gateway(backend).await;

    // First registration becomes the default
    let registered = registry
        .register(ConnectionProfile::new("c1", "h", "u"))
        .await
        .unwrap();
    assert!(registered.is_default);

    let options = ExecuteOptions::default().with_max_rows(2);
    let result = gateway.execute("c1", "SELECT * FROM T", &options).await;

    assert!(result.success);
    assert_eq!(result.query_type, QueryType::Select);
    assert_eq!(result.row_count, 2);
    assert_eq!(result.rows.len(), 2);
    assert!(result.metadata.truncated);
    assert!(result
        .metadata
        .warnings
        .iter()
        .any(|w| w.contains("truncated")));

    // Exactly one history entry for c1, successful
    let entries = history
        .list(&HistoryFilter {
            connection_id: Some("c1".to_string()),
            ..Default::default()
        })
        .await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].success);
    assert_eq!(entries[0].row_count, 2);
    assert_eq!(entries[0].sql, "SELECT * FROM T");
}

#[tokio::test]
async fn test_default_promotion_after_delete() {
    let (_, registry, _) = build_gateway(Arc::new(MockBackend::new())).await;

    registry
        .register(ConnectionProfile::new("first", "h", "u"))
        .await
        .unwrap();
    registry
        .register(ConnectionProfile::new("second", "h", "u"))
        .await
        .unwrap();
    registry.set_default("second").await.unwrap();
    assert_eq!(registry.get_default().await.unwrap().id, "second");

    assert!(registry.remove("second").await.unwrap());

    // The first remaining profile is promoted automatically
    assert_eq!(registry.get_default().await.unwrap().id, "first");
}

#[tokio::test]
async fn test_unknown_connection_yields_failure_result() {
    let (gateway, _, history) = build_gateway(Arc::new(MockBackend::new())).await;

    let result = gateway
        .execute("nowhere", "SELECT 1", &ExecuteOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_ref().unwrap().message, "Instance not found");

    // The failed attempt is still auditable
    let entries = history.list(&HistoryFilter::default()).await;
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
}

#[tokio::test]
async fn test_batch_result_lengths() {
    let (gateway, registry, _) = build_gateway(Arc::new(MockBackend::new())).await;
    registry
        .register(ConnectionProfile::new("c1", "h", "u"))
        .await
        .unwrap();

    let statements = vec![
        "SELECT 1".to_string(),
        "".to_string(),
        "SELECT 3".to_string(),
    ];

    // Default: stop at the first failing statement
    let results = gateway
        .execute_batch("c1", &statements, &ExecuteOptions::default())
        .await;
    assert_eq!(results.len(), 2);

    // continue_on_error: every statement runs
    let options = ExecuteOptions::default().with_continue_on_error(true);
    let results = gateway.execute_batch("c1", &statements, &options).await;
    assert_eq!(results.len(), statements.len());
    assert_eq!(
        results.iter().filter(|r| r.success).count(),
        2,
        "two statements succeed, the blank one fails"
    );
}

#[tokio::test]
async fn test_cancel_mid_flight() {
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_millis(500)));
    let (gateway, registry, history) = build_gateway(backend).await;
    registry
        .register(ConnectionProfile::new("c1", "h", "u"))
        .await
        .unwrap();

    let task = {
        let gateway = gateway.clone();
        tokio::spawn(
            async move { gateway.execute("c1", "SELECT 1", &ExecuteOptions::default()).await },
        )
    };

    let mut query_id = None;
    for _ in 0..50 {
        if let Some(active) = gateway.active_queries().first() {
            query_id = Some(active.query_id.clone());
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let query_id = query_id.expect("query never became active");
    assert!(gateway.cancel(&query_id));
    assert!(!gateway.cancel(&query_id), "second cancel finds nothing");

    let result = task.await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.unwrap().code, "cancelled");

    // Cancelled attempts land in history too
    let entries = history.list(&HistoryFilter::default()).await;
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
}

#[tokio::test]
async fn test_history_ordering_matches_completion() {
    let (gateway, registry, history) = build_gateway(Arc::new(MockBackend::new())).await;
    registry
        .register(ConnectionProfile::new("c1", "h", "u"))
        .await
        .unwrap();

    gateway
        .execute("c1", "SELECT 1", &ExecuteOptions::default())
        .await;
    gateway
        .execute("c1", "SELECT 2", &ExecuteOptions::default())
        .await;

    let entries = history.list(&HistoryFilter::default()).await;
    assert_eq!(entries.len(), 2);
    // Newest first
    assert_eq!(entries[0].sql, "SELECT 2");
    assert_eq!(entries[1].sql, "SELECT 1");
}

#[tokio::test]
async fn test_execution_plan_is_advisory_shape() {
    let (gateway, registry, _) = build_gateway(Arc::new(MockBackend::new())).await;
    registry
        .register(ConnectionProfile::new("c1", "h", "u"))
        .await
        .unwrap();

    let plan = gateway
        .execution_plan("c1", "SELECT id FROM t WHERE id > 5")
        .await
        .unwrap();

    assert_eq!(
        plan.operations,
        vec!["TABLE SCAN", "FILTER", "PROJECTION"]
    );
    assert!(plan.estimated_cost > 0.0);
}
