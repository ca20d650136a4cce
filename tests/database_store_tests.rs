#![cfg(feature = "database")]
//! SQLite store integration tests
//!
//! Round-trips threads and audit entries through a real on-disk database and
//! exercises the revision check at the SQL layer.

use tempfile::TempDir;

use onramp::onboarding::{ClientThread, EnvKind, EnvState, TicketKind, TicketRef};
use onramp::store::{AuditEntry, AuditSink, SqliteStore, StoreError, ThreadStore};

async fn store_in(dir: &TempDir) -> SqliteStore {
    let db_path = dir.path().join("onramp-test.db");
    let url = format!("sqlite://{}", db_path.display());
    SqliteStore::new(&url, true).await.expect("store init")
}

#[tokio::test]
async fn test_thread_round_trip_preserves_environments() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;

    let mut thread = ClientThread::new("Acme", "owner@example.com", "creator@example.com");
    {
        let dev = thread.environments.get_mut(EnvKind::Dev);
        dev.state = EnvState::FormsRaised;
        dev.evidence
            .tickets
            .push(TicketRef::new("ServiceNow", "SN-1234", TicketKind::Nssr));
    }
    thread.blockers.push("Ticket SN-1234 (NSSR) is still open".to_string());

    let created = store.create_thread(thread.clone()).await.unwrap();
    let loaded = store.get_thread(&created.thread_id).await.unwrap();

    assert_eq!(loaded.display_name, "Acme");
    assert_eq!(loaded.environments.get(EnvKind::Dev).state, EnvState::FormsRaised);
    assert_eq!(loaded.environments.get(EnvKind::Dev).evidence.tickets.len(), 1);
    assert_eq!(loaded.environments.get(EnvKind::Staging).state, EnvState::NotStarted);
    assert_eq!(loaded.blockers, thread.blockers);
    assert_eq!(loaded.revision, 0);
}

#[tokio::test]
async fn test_get_unknown_thread_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;

    let result = store.get_thread("missing-thread").await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_update_bumps_revision_and_detects_conflicts() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;

    let thread = ClientThread::new("Acme", "owner@example.com", "creator@example.com");
    let created = store.create_thread(thread).await.unwrap();

    let mut first = created.clone();
    first.environments.get_mut(EnvKind::Dev).state = EnvState::FormsRaised;
    let first = store.update_thread(first).await.unwrap();
    assert_eq!(first.revision, 1);

    // Stale copy still at revision 0 must conflict, not overwrite
    let mut stale = created;
    stale.environments.get_mut(EnvKind::Dev).state = EnvState::Abandoned;
    let result = store.update_thread(stale).await;
    assert!(matches!(
        result,
        Err(StoreError::Conflict {
            expected: 0,
            found: 1,
            ..
        })
    ));

    let loaded = store.get_thread(&first.thread_id).await.unwrap();
    assert_eq!(loaded.environments.get(EnvKind::Dev).state, EnvState::FormsRaised);
}

#[tokio::test]
async fn test_find_by_name_uses_normalized_index() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;

    store
        .create_thread(ClientThread::new("Acme Corp", "owner@example.com", "creator"))
        .await
        .unwrap();

    let found = store.find_by_name("acme corp").await.unwrap();
    assert!(found.is_some());
    assert!(store.find_by_name("globex").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_threads_filters_by_owner() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;

    store
        .create_thread(ClientThread::new("Acme", "alice@example.com", "alice"))
        .await
        .unwrap();
    store
        .create_thread(ClientThread::new("Globex", "bob@example.com", "bob"))
        .await
        .unwrap();

    assert_eq!(store.list_threads(None).await.unwrap().len(), 2);
    let alices = store.list_threads(Some("alice@example.com")).await.unwrap();
    assert_eq!(alices.len(), 1);
    assert_eq!(alices[0].display_name, "Acme");
}

#[tokio::test]
async fn test_audit_entries_get_ids_and_query_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir).await;

    for i in 0..3 {
        let entry = store
            .append(AuditEntry::new(
                Some("t-1".to_string()),
                "tester",
                "state_transition",
                serde_json::json!({ "seq": i }),
            ))
            .await
            .unwrap();
        assert!(entry.id.is_some());
    }

    let entries = store.query("t-1", 2).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].details["seq"], 2);
    assert_eq!(entries[1].details["seq"], 1);
}
