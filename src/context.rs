// Application context: every collaborator the handlers need, constructed once
// at startup and passed explicitly. No module-level globals.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::approvals::ApprovalManager;
use crate::config::OnrampConfig;
use crate::orchestrator::Orchestrator;
use crate::providers::{
    EmailGateway, MockEmailGateway, MockScreenshotStore, MockSecretStore, MockTicketing,
    ScreenshotStore, SecretStore, TicketProvider,
};
use crate::store::{AuditSink, InMemoryStore, ThreadStore};

pub struct AppContext {
    pub config: OnrampConfig,
    pub store: Arc<dyn ThreadStore>,
    pub audit: Arc<dyn AuditSink>,
    pub approvals: Arc<ApprovalManager>,
    pub orchestrator: Arc<Orchestrator>,
    pub tickets: Arc<dyn TicketProvider>,
    pub secrets: Arc<dyn SecretStore>,
    pub screenshots: Arc<dyn ScreenshotStore>,
    pub email: Arc<dyn EmailGateway>,
}

impl AppContext {
    /// Build the full context: persistent store when configured and compiled
    /// in, in-memory otherwise; mock collaborators for the external systems.
    pub async fn initialize(config: OnrampConfig) -> Result<Self> {
        #[cfg(feature = "database")]
        if let Some(db_config) = &config.database {
            info!("Initializing SQLite store at {}", db_config.url);
            let store = Arc::new(
                crate::store::SqliteStore::new(&db_config.url, db_config.auto_migrate).await?,
            );
            return Ok(Self::assemble(config, store.clone(), store));
        }

        #[cfg(not(feature = "database"))]
        if config.database.is_some() {
            info!("Database configured but the `database` feature is not compiled in; using in-memory store");
        }

        let store = Arc::new(InMemoryStore::new());
        Ok(Self::assemble(config, store.clone(), store))
    }

    /// In-memory context for tests and demos
    pub fn in_memory(config: OnrampConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::assemble(config, store.clone(), store)
    }

    fn assemble(
        config: OnrampConfig,
        store: Arc<dyn ThreadStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let approvals = Arc::new(ApprovalManager::new(audit.clone()));
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            audit.clone(),
            approvals.clone(),
        ));

        let tickets = Arc::new(MockTicketing::new());
        let secrets = Arc::new(MockSecretStore::new(config.workflow.secrets_prefix.clone()));
        let screenshots = Arc::new(MockScreenshotStore::new(
            config.workflow.artifact_bucket.clone(),
        ));
        let email = Arc::new(MockEmailGateway::new());

        Self {
            config,
            store,
            audit,
            approvals,
            orchestrator,
            tickets,
            secrets,
            screenshots,
            email,
        }
    }
}
