// SQLite-backed thread store and audit sink (behind the `database` feature)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{migrate::MigrateDatabase, Row, SqlitePool};
use tracing::info;

use crate::onboarding::{ClientThread, Environments};

use super::{normalize_name, AuditEntry, AuditSink, StoreError, ThreadStore};

/// Persistent store for threads and audit entries
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Initialize the store with automatic migrations
    pub async fn new(database_url: &str, auto_migrate: bool) -> Result<Self, StoreError> {
        if !sqlx::Sqlite::database_exists(database_url)
            .await
            .map_err(backend)?
        {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url)
                .await
                .map_err(backend)?;
        }

        let pool = SqlitePool::connect(database_url).await.map_err(backend)?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StoreError::Backend(e.into()))?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
    }

    fn row_to_thread(row: &sqlx::sqlite::SqliteRow) -> Result<ClientThread, StoreError> {
        let environments: Environments =
            serde_json::from_str(row.get::<String, _>("environments").as_str())
                .map_err(|e| StoreError::Backend(e.into()))?;
        let blockers: Vec<String> =
            serde_json::from_str(row.get::<String, _>("blockers").as_str())
                .map_err(|e| StoreError::Backend(e.into()))?;
        let next_actions: Vec<String> =
            serde_json::from_str(row.get::<String, _>("next_actions").as_str())
                .map_err(|e| StoreError::Backend(e.into()))?;
        let metadata = serde_json::from_str(row.get::<String, _>("metadata").as_str())
            .map_err(|e| StoreError::Backend(e.into()))?;

        Ok(ClientThread {
            thread_id: row.get("thread_id"),
            display_name: row.get("display_name"),
            environments,
            owner: row.get("owner"),
            created_by: row.get("created_by"),
            created_at: parse_timestamp(row.get::<String, _>("created_at").as_str())?,
            last_update: parse_timestamp(row.get::<String, _>("last_update").as_str())?,
            blockers,
            next_actions,
            metadata,
            revision: row.get::<i64, _>("revision") as u64,
        })
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.into())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(e.into()))
}

#[async_trait]
impl ThreadStore for SqliteStore {
    async fn create_thread(&self, thread: ClientThread) -> Result<ClientThread, StoreError> {
        let environments =
            serde_json::to_string(&thread.environments).map_err(|e| StoreError::Backend(e.into()))?;
        let blockers =
            serde_json::to_string(&thread.blockers).map_err(|e| StoreError::Backend(e.into()))?;
        let next_actions = serde_json::to_string(&thread.next_actions)
            .map_err(|e| StoreError::Backend(e.into()))?;
        let metadata =
            serde_json::to_string(&thread.metadata).map_err(|e| StoreError::Backend(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO client_thread
                (thread_id, display_name, normalized_name, owner, created_by,
                 created_at, last_update, blockers, next_actions, metadata,
                 environments, revision)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&thread.thread_id)
        .bind(&thread.display_name)
        .bind(normalize_name(&thread.display_name))
        .bind(&thread.owner)
        .bind(&thread.created_by)
        .bind(thread.created_at.to_rfc3339())
        .bind(thread.last_update.to_rfc3339())
        .bind(blockers)
        .bind(next_actions)
        .bind(metadata)
        .bind(environments)
        .bind(thread.revision as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<ClientThread, StoreError> {
        let row = sqlx::query("SELECT * FROM client_thread WHERE thread_id = ?1")
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::NotFound(thread_id.to_string()))?;

        Self::row_to_thread(&row)
    }

    async fn update_thread(&self, mut thread: ClientThread) -> Result<ClientThread, StoreError> {
        let environments =
            serde_json::to_string(&thread.environments).map_err(|e| StoreError::Backend(e.into()))?;
        let blockers =
            serde_json::to_string(&thread.blockers).map_err(|e| StoreError::Backend(e.into()))?;
        let next_actions = serde_json::to_string(&thread.next_actions)
            .map_err(|e| StoreError::Backend(e.into()))?;
        let metadata =
            serde_json::to_string(&thread.metadata).map_err(|e| StoreError::Backend(e.into()))?;

        let result = sqlx::query(
            r#"
            UPDATE client_thread
            SET display_name = ?2, normalized_name = ?3, owner = ?4,
                last_update = ?5, blockers = ?6, next_actions = ?7,
                metadata = ?8, environments = ?9, revision = revision + 1
            WHERE thread_id = ?1 AND revision = ?10
            "#,
        )
        .bind(&thread.thread_id)
        .bind(&thread.display_name)
        .bind(normalize_name(&thread.display_name))
        .bind(&thread.owner)
        .bind(thread.last_update.to_rfc3339())
        .bind(blockers)
        .bind(next_actions)
        .bind(metadata)
        .bind(environments)
        .bind(thread.revision as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            // Either the thread is gone or another writer got there first
            let current = sqlx::query("SELECT revision FROM client_thread WHERE thread_id = ?1")
                .bind(&thread.thread_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

            return match current {
                Some(row) => Err(StoreError::Conflict {
                    thread_id: thread.thread_id.clone(),
                    expected: thread.revision,
                    found: row.get::<i64, _>("revision") as u64,
                }),
                None => Err(StoreError::NotFound(thread.thread_id.clone())),
            };
        }

        thread.revision += 1;
        Ok(thread)
    }

    async fn list_threads(&self, owner: Option<&str>) -> Result<Vec<ClientThread>, StoreError> {
        let rows = match owner {
            Some(owner) => {
                sqlx::query("SELECT * FROM client_thread WHERE owner = ?1 ORDER BY created_at")
                    .bind(owner)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM client_thread ORDER BY created_at")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(backend)?;

        rows.iter().map(Self::row_to_thread).collect()
    }

    async fn find_by_name(&self, display_name: &str) -> Result<Option<ClientThread>, StoreError> {
        let row = sqlx::query("SELECT * FROM client_thread WHERE normalized_name = ?1 LIMIT 1")
            .bind(normalize_name(display_name))
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(Self::row_to_thread).transpose()
    }
}

#[async_trait]
impl AuditSink for SqliteStore {
    async fn append(&self, mut entry: AuditEntry) -> Result<AuditEntry, StoreError> {
        let details =
            serde_json::to_string(&entry.details).map_err(|e| StoreError::Backend(e.into()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (thread_id, actor, action, details, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&entry.thread_id)
        .bind(&entry.actor)
        .bind(&entry.action)
        .bind(details)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        entry.id = Some(result.last_insert_rowid());
        Ok(entry)
    }

    async fn query(&self, thread_id: &str, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, thread_id, actor, action, details, created_at
            FROM audit_log
            WHERE thread_id = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(thread_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let details = serde_json::from_str(row.get::<String, _>("details").as_str())
                    .map_err(|e| StoreError::Backend(e.into()))?;
                Ok(AuditEntry {
                    id: Some(row.get::<i64, _>("id")),
                    thread_id: row.get("thread_id"),
                    actor: row.get("actor"),
                    action: row.get("action"),
                    details,
                    created_at: parse_timestamp(row.get::<String, _>("created_at").as_str())?,
                })
            })
            .collect()
    }
}
