// Collaborator contracts for evidence creation.
//
// Ticketing, secret storage, screenshot storage and email are external
// systems. Evidence creation happens before a transition is attempted, as a
// separate retryable step; a failure here surfaces as a collaborator error
// and never records a partial transition.

pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::onboarding::{EnvKind, RedirectUris, ScreenshotLabel, ScreenshotRef, SecretRef, TicketRef};

pub use mock::{MockEmailGateway, MockScreenshotStore, MockSecretStore, MockTicketing};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {reason}")]
    Request { provider: String, reason: String },
    #[error("{0} is not configured")]
    NotConfigured(String),
}

/// External ticketing system (ServiceNow, Jira, ...)
#[async_trait]
pub trait TicketProvider: Send + Sync {
    /// Raise an NSSR/OAuth ticket requesting client credentials
    async fn create_nssr(
        &self,
        client: &str,
        env: EnvKind,
        redirect_uris: &RedirectUris,
    ) -> Result<TicketRef, ProviderError>;

    /// Raise a GLAM/GWAM request adding users to the environment access list
    async fn create_access_request(
        &self,
        client: &str,
        env: EnvKind,
        lanids: &[String],
    ) -> Result<TicketRef, ProviderError>;
}

/// Secret manager. Stores the raw secret and returns only a masked reference.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn store_secret(
        &self,
        client: &str,
        env: EnvKind,
        secret: &str,
    ) -> Result<SecretRef, ProviderError>;
}

/// Object storage for validation screenshots
#[async_trait]
pub trait ScreenshotStore: Send + Sync {
    async fn upload(
        &self,
        client: &str,
        env: EnvKind,
        label: ScreenshotLabel,
        content: &[u8],
    ) -> Result<ScreenshotRef, ProviderError>;
}

/// Outbound email. Returns the message id of the sent mail.
#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send_signoff(
        &self,
        client: &str,
        env: EnvKind,
        screenshots: &[ScreenshotRef],
        redirect_uris: &RedirectUris,
        approvers: &[String],
    ) -> Result<String, ProviderError>;
}
