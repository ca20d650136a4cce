// Persistence contracts for onboarding threads and the audit trail.
//
// The orchestrator only ever talks to these traits; an in-memory store ships
// for tests and demos, a SQLite store behind the `database` feature.

pub mod memory;

#[cfg(feature = "database")]
pub mod database;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::onboarding::ClientThread;

pub use memory::InMemoryStore;

#[cfg(feature = "database")]
pub use database::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("thread {0} not found")]
    NotFound(String),
    #[error("concurrent update conflict on thread {thread_id}: expected revision {expected}, found {found}")]
    Conflict {
        thread_id: String,
        expected: u64,
        found: u64,
    },
    #[error("storage backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Append-only audit record. The id is assigned by the sink at persistence time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Option<i64>,
    /// None for system-wide events
    pub thread_id: Option<String>,
    pub actor: String,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        thread_id: Option<String>,
        actor: impl Into<String>,
        action: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: None,
            thread_id,
            actor: actor.into(),
            action: action.into(),
            details,
            created_at: Utc::now(),
        }
    }
}

/// Normalized form used for the display-name index
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Repository for client threads. Implementations must serialize concurrent
/// writes per thread id and reject stale revisions.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn create_thread(&self, thread: ClientThread) -> Result<ClientThread, StoreError>;

    async fn get_thread(&self, thread_id: &str) -> Result<ClientThread, StoreError>;

    /// Persist a modified thread. Fails with `Conflict` when the stored
    /// revision no longer matches the one the caller read; on success the
    /// returned thread carries the bumped revision.
    async fn update_thread(&self, thread: ClientThread) -> Result<ClientThread, StoreError>;

    async fn list_threads(&self, owner: Option<&str>) -> Result<Vec<ClientThread>, StoreError>;

    /// Indexed lookup by normalized display name
    async fn find_by_name(&self, display_name: &str) -> Result<Option<ClientThread>, StoreError>;
}

/// Append-only audit trail
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<AuditEntry, StoreError>;

    /// Entries for a thread, newest first
    async fn query(&self, thread_id: &str, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;
}
