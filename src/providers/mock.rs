// Deterministic mock collaborators.
//
// Stand-ins for the real ticketing/secrets/storage/email integrations. They
// generate plausible references locally and record what they were asked to do
// so tests can assert against it.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::onboarding::{
    EnvKind, RedirectUris, ScreenshotLabel, ScreenshotRef, SecretRef, TicketKind, TicketRef,
};

use super::{EmailGateway, ProviderError, ScreenshotStore, SecretStore, TicketProvider};

fn token_hex() -> String {
    format!("{:08X}", rand::random::<u32>())
}

/// Mock ticketing backend issuing ServiceNow-style ticket ids
#[derive(Default)]
pub struct MockTicketing {
    created: Mutex<Vec<TicketRef>>,
}

impl MockTicketing {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn created_tickets(&self) -> Vec<TicketRef> {
        self.created.lock().await.clone()
    }
}

#[async_trait]
impl TicketProvider for MockTicketing {
    async fn create_nssr(
        &self,
        client: &str,
        env: EnvKind,
        _redirect_uris: &RedirectUris,
    ) -> Result<TicketRef, ProviderError> {
        let id = format!("SN-{}", token_hex());
        info!(client = %client, env = %env, ticket_id = %id, "NSSR ticket raised");

        let ticket = TicketRef::new("ServiceNow", id.clone(), TicketKind::Nssr)
            .with_url(format!("https://tickets.example.com/{}", id));
        self.created.lock().await.push(ticket.clone());
        Ok(ticket)
    }

    async fn create_access_request(
        &self,
        client: &str,
        env: EnvKind,
        lanids: &[String],
    ) -> Result<TicketRef, ProviderError> {
        let id = format!("GW-{}", token_hex());
        info!(
            client = %client,
            env = %env,
            ticket_id = %id,
            lanids = ?lanids,
            "GLAM/GWAM ticket raised"
        );

        let ticket = TicketRef::new("ServiceNow", id.clone(), TicketKind::Glam)
            .with_url(format!("https://tickets.example.com/{}", id));
        self.created.lock().await.push(ticket.clone());
        Ok(ticket)
    }
}

/// Mock secret manager. Never retains the raw secret, only the mask.
pub struct MockSecretStore {
    prefix: String,
}

impl MockSecretStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn store_secret(
        &self,
        client: &str,
        env: EnvKind,
        secret: &str,
    ) -> Result<SecretRef, ProviderError> {
        let name = format!("{}/{}/{}/client_secret", self.prefix, client.to_lowercase(), env);
        let mask = SecretRef::mask_of(secret);
        info!(secret_name = %name, mask = %mask, "Client secret stored");
        Ok(SecretRef::new(name, mask))
    }
}

/// Mock object storage for screenshots
pub struct MockScreenshotStore {
    bucket: String,
}

impl MockScreenshotStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ScreenshotStore for MockScreenshotStore {
    async fn upload(
        &self,
        client: &str,
        env: EnvKind,
        label: ScreenshotLabel,
        _content: &[u8],
    ) -> Result<ScreenshotRef, ProviderError> {
        let key = format!(
            "screenshots/{}/{}/{}_{}.png",
            client.to_lowercase(),
            env,
            label,
            token_hex()
        );
        let url = format!("https://{}.storage.example.com/{}", self.bucket, key);
        info!(key = %key, "Screenshot uploaded");
        Ok(ScreenshotRef::new(key, label).with_url(url))
    }
}

/// A sign-off email recorded by the mock gateway
#[derive(Debug, Clone)]
pub struct SentSignoff {
    pub message_id: String,
    pub client: String,
    pub env: EnvKind,
    pub recipients: Vec<String>,
    pub body: String,
}

/// Mock outbound email gateway. Composes the sign-off body and records it.
#[derive(Default)]
pub struct MockEmailGateway {
    sent: Mutex<Vec<SentSignoff>>,
}

impl MockEmailGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent_mail(&self) -> Vec<SentSignoff> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailGateway for MockEmailGateway {
    async fn send_signoff(
        &self,
        client: &str,
        env: EnvKind,
        screenshots: &[ScreenshotRef],
        redirect_uris: &RedirectUris,
        approvers: &[String],
    ) -> Result<String, ProviderError> {
        let message_id = format!("<{}@onramp.local>", token_hex().to_lowercase());

        let mut body = format!(
            "{} validation for {} is complete. Attached are the required screenshots \
             and the redirect URIs for the next environment.\n\nRedirect URIs:\n- Web Callback: {}\n",
            env, client, redirect_uris.web_callback
        );
        if let Some(post_logout) = &redirect_uris.post_logout {
            body.push_str(&format!("- Post Logout: {}\n", post_logout));
        }
        if let Some(api_callback) = &redirect_uris.api_callback {
            body.push_str(&format!("- API Callback: {}\n", api_callback));
        }
        body.push_str("\nScreenshots:\n");
        for screenshot in screenshots {
            body.push_str(&format!(
                "- {}: {}\n",
                screenshot.label,
                screenshot.url.as_deref().unwrap_or(&screenshot.key)
            ));
        }

        info!(
            message_id = %message_id,
            recipients = ?approvers,
            "Sign-off email sent"
        );

        self.sent.lock().await.push(SentSignoff {
            message_id: message_id.clone(),
            client: client.to_string(),
            env,
            recipients: approvers.to_vec(),
            body,
        });

        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_ticketing_records_created_tickets() {
        let ticketing = MockTicketing::new();
        let uris = RedirectUris::generate("Acme", EnvKind::Dev, "example.com");

        let nssr = ticketing.create_nssr("Acme", EnvKind::Dev, &uris).await.unwrap();
        assert!(nssr.id.starts_with("SN-"));
        assert_eq!(nssr.kind, TicketKind::Nssr);
        assert!(nssr.is_open());

        let glam = ticketing
            .create_access_request("Acme", EnvKind::Dev, &["AB-1234".to_string()])
            .await
            .unwrap();
        assert!(glam.kind.is_access_request());

        assert_eq!(ticketing.created_tickets().await.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_secret_store_masks_secret() {
        let secrets = MockSecretStore::new("onramp");
        let secret = secrets
            .store_secret("Acme", EnvKind::Staging, "hunter2-f3a9")
            .await
            .unwrap();

        assert_eq!(secret.name, "onramp/acme/staging/client_secret");
        assert_eq!(secret.mask, "****f3a9");
    }

    #[tokio::test]
    async fn test_mock_email_gateway_includes_redirect_uris() {
        let gateway = MockEmailGateway::new();
        let uris = RedirectUris::generate("Acme", EnvKind::Dev, "example.com");
        let shots = vec![ScreenshotRef::new("k/login.png", ScreenshotLabel::Login)];

        let message_id = gateway
            .send_signoff("Acme", EnvKind::Dev, &shots, &uris, &["lead@example.com".to_string()])
            .await
            .unwrap();
        assert!(message_id.starts_with('<'));

        let sent = gateway.sent_mail().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains(&uris.web_callback));
        assert!(sent[0].body.contains("login"));
    }
}
