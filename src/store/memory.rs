// In-memory thread store and audit sink.
//
// The authoritative store for demos and tests. Writes go through a single
// RwLock so per-thread revision checks observe a consistent map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::onboarding::ClientThread;

use super::{normalize_name, AuditEntry, AuditSink, StoreError, ThreadStore};

#[derive(Default)]
struct ThreadTable {
    threads: HashMap<String, ClientThread>,
    /// normalized display name -> thread id
    name_index: HashMap<String, String>,
}

pub struct InMemoryStore {
    table: RwLock<ThreadTable>,
    audit_log: RwLock<Vec<AuditEntry>>,
    next_audit_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(ThreadTable::default()),
            audit_log: RwLock::new(Vec::new()),
            next_audit_id: AtomicI64::new(1),
        }
    }

    /// Number of audit entries recorded, for assertions in tests
    pub async fn audit_len(&self) -> usize {
        self.audit_log.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThreadStore for InMemoryStore {
    async fn create_thread(&self, thread: ClientThread) -> Result<ClientThread, StoreError> {
        let mut table = self.table.write().await;
        table
            .name_index
            .insert(normalize_name(&thread.display_name), thread.thread_id.clone());
        table.threads.insert(thread.thread_id.clone(), thread.clone());
        debug!(thread_id = %thread.thread_id, "thread created");
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<ClientThread, StoreError> {
        let table = self.table.read().await;
        table
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(thread_id.to_string()))
    }

    async fn update_thread(&self, mut thread: ClientThread) -> Result<ClientThread, StoreError> {
        let mut table = self.table.write().await;
        let stored = table
            .threads
            .get(&thread.thread_id)
            .ok_or_else(|| StoreError::NotFound(thread.thread_id.clone()))?;

        if stored.revision != thread.revision {
            return Err(StoreError::Conflict {
                thread_id: thread.thread_id.clone(),
                expected: thread.revision,
                found: stored.revision,
            });
        }

        thread.revision += 1;
        table
            .name_index
            .insert(normalize_name(&thread.display_name), thread.thread_id.clone());
        table.threads.insert(thread.thread_id.clone(), thread.clone());
        Ok(thread)
    }

    async fn list_threads(&self, owner: Option<&str>) -> Result<Vec<ClientThread>, StoreError> {
        let table = self.table.read().await;
        let mut threads: Vec<ClientThread> = table
            .threads
            .values()
            .filter(|t| owner.map_or(true, |o| t.owner == o))
            .cloned()
            .collect();
        threads.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(threads)
    }

    async fn find_by_name(&self, display_name: &str) -> Result<Option<ClientThread>, StoreError> {
        let table = self.table.read().await;
        let thread = table
            .name_index
            .get(&normalize_name(display_name))
            .and_then(|id| table.threads.get(id))
            .cloned();
        Ok(thread)
    }
}

#[async_trait]
impl AuditSink for InMemoryStore {
    async fn append(&self, mut entry: AuditEntry) -> Result<AuditEntry, StoreError> {
        entry.id = Some(self.next_audit_id.fetch_add(1, Ordering::SeqCst));
        let mut log = self.audit_log.write().await;
        log.push(entry.clone());
        Ok(entry)
    }

    async fn query(&self, thread_id: &str, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let log = self.audit_log.read().await;
        let mut entries: Vec<AuditEntry> = log
            .iter()
            .filter(|e| e.thread_id.as_deref() == Some(thread_id))
            .cloned()
            .collect();
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_rejects_stale_revision() {
        let store = InMemoryStore::new();
        let thread = ClientThread::new("Acme", "owner", "creator");
        let created = store.create_thread(thread).await.unwrap();

        let first = store.update_thread(created.clone()).await.unwrap();
        assert_eq!(first.revision, created.revision + 1);

        // A second writer still holding the original copy loses
        let result = store.update_thread(created).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_find_by_name_is_case_insensitive() {
        let store = InMemoryStore::new();
        store
            .create_thread(ClientThread::new("Acme Corp", "owner", "creator"))
            .await
            .unwrap();

        let found = store.find_by_name("  ACME corp ").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().display_name, "Acme Corp");

        assert!(store.find_by_name("globex").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_audit_query_is_newest_first_and_limited() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store
                .append(AuditEntry::new(
                    Some("t-1".to_string()),
                    "tester",
                    "noop",
                    json!({ "seq": i }),
                ))
                .await
                .unwrap();
        }

        let entries = store.query("t-1", 3).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].details["seq"], 4);
        assert_eq!(entries[2].details["seq"], 2);
        assert!(entries.iter().all(|e| e.id.is_some()));
    }
}
