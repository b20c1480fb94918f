//! Connection registry invariants across operation sequences.

use db_conduit::error::ConduitError;
use db_conduit::registry::{ConnectionProfile, ConnectionRegistry};
use db_conduit::storage::MemoryStore;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn profile(id: &str) -> ConnectionProfile {
    ConnectionProfile::new(id, "db.example.com", "admin")
}

#[tokio::test]
async fn test_single_default_invariant_across_sequences() {
    let registry = ConnectionRegistry::open(Arc::new(MemoryStore::new()))
        .await
        .unwrap();

    registry.register(profile("a")).await.unwrap();
    registry.register(profile("b")).await.unwrap();
    registry.register(profile("c")).await.unwrap();
    registry.set_default("b").await.unwrap();
    registry.remove("b").await.unwrap();
    registry.set_default("c").await.unwrap();
    registry.register(profile("d")).await.unwrap();
    registry.remove("a").await.unwrap();

    let profiles = registry.get_all().await;
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles.iter().filter(|p| p.is_default).count(), 1);
    assert_eq!(registry.get_default().await.unwrap().id, "c");
}

#[tokio::test]
async fn test_removing_everything_is_a_valid_end_state() {
    let registry = ConnectionRegistry::open(Arc::new(MemoryStore::new()))
        .await
        .unwrap();

    registry.register(profile("a")).await.unwrap();
    registry.register(profile("b")).await.unwrap();

    assert!(registry.remove("a").await.unwrap());
    assert!(registry.remove("b").await.unwrap());

    assert!(registry.get_all().await.is_empty());
    assert!(registry.get_default().await.is_none());

    // Registering again restores a default
    registry.register(profile("fresh")).await.unwrap();
    assert_eq!(registry.get_default().await.unwrap().id, "fresh");
}

#[tokio::test]
async fn test_validation_failures_do_not_mutate() {
    let registry = ConnectionRegistry::open(Arc::new(MemoryStore::new()))
        .await
        .unwrap();
    registry.register(profile("a")).await.unwrap();

    let err = registry
        .register(ConnectionProfile::new("b", "", "u"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::Validation(_)));
    assert_eq!(registry.get_all().await.len(), 1);

    let err = registry.register(profile("a")).await.unwrap_err();
    assert!(matches!(err, ConduitError::Validation(_)));
    assert_eq!(registry.get_all().await.len(), 1);
}

#[tokio::test]
async fn test_profiles_survive_reopen_with_insertion_order() {
    let storage = Arc::new(MemoryStore::new());

    {
        let registry = ConnectionRegistry::open(storage.clone()).await.unwrap();
        registry.register(profile("first")).await.unwrap();
        registry.register(profile("second")).await.unwrap();
        registry.register(profile("third")).await.unwrap();
        registry.set_default("third").await.unwrap();
    }

    let reopened = ConnectionRegistry::open(storage).await.unwrap();
    let ids: Vec<String> = reopened.get_all().await.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
    assert_eq!(reopened.get_default().await.unwrap().id, "third");

    // Promotion uses insertion order after reopen as well
    reopened.remove("third").await.unwrap();
    assert_eq!(reopened.get_default().await.unwrap().id, "first");
}
