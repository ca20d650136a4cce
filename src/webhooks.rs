// External update hooks: ticket status changes and inbound email.
//
// The HTTP shell that receives these payloads is out of scope; any front end
// deserializes into these types and calls the handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::context::AppContext;
use crate::onboarding::{EnvKind, EnvState};
use crate::orchestrator::OnboardingError;

/// Ticket status change pushed by the ticketing system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketUpdate {
    pub ticket_id: String,
    pub system: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Inbound email notification (sign-off replies and the like)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailUpdate {
    pub message_id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub content: Option<String>,
}

fn ticket_is_done(status: &str) -> bool {
    matches!(
        status.to_lowercase().as_str(),
        "resolved" | "closed" | "completed"
    )
}

fn subject_indicates_approval(subject: &str) -> bool {
    let subject = subject.to_lowercase();
    ["approved", "approve", "sign-off"]
        .iter()
        .any(|word| subject.contains(word))
}

/// Apply a ticket status update to every thread referencing the ticket.
/// A completed ticket triggers a background advancement check; the check is
/// not guaranteed to run synchronously with this call.
pub async fn handle_ticket_update(
    ctx: &AppContext,
    update: TicketUpdate,
) -> Result<Vec<String>, OnboardingError> {
    info!(
        ticket_id = %update.ticket_id,
        status = %update.status,
        "Received ticket update"
    );

    let updated = ctx
        .orchestrator
        .record_ticket_status(&update.ticket_id, &update.system, &update.status)
        .await?;

    if ticket_is_done(&update.status) {
        for thread_id in &updated {
            let orchestrator = ctx.orchestrator.clone();
            let thread_id = thread_id.clone();
            let ticket_id = update.ticket_id.clone();
            tokio::spawn(async move {
                check_state_advancement(orchestrator, thread_id, ticket_id).await;
            });
        }
    }

    Ok(updated)
}

/// Background check after a ticket completes: whether any environment is now
/// eligible to advance. Credential issuance is confirmed out of band, so this
/// only reports eligibility.
async fn check_state_advancement(
    orchestrator: std::sync::Arc<crate::orchestrator::Orchestrator>,
    thread_id: String,
    ticket_id: String,
) {
    let thread = match orchestrator.get_thread(&thread_id).await {
        Ok(thread) => thread,
        Err(e) => {
            tracing::warn!(thread_id = %thread_id, error = %e, "Advancement check failed to load thread");
            return;
        }
    };

    for kind in EnvKind::ALL {
        let env = thread.environments.get(kind);
        if env.state == EnvState::FormsRaised
            && env.evidence.tickets.iter().all(|t| !t.is_open())
        {
            info!(
                thread_id = %thread_id,
                environment = %kind,
                ticket_id = %ticket_id,
                "All tickets closed; awaiting credential confirmation to advance"
            );
        }
    }
}

/// Process an inbound email. When the subject indicates an approval and an
/// environment is waiting in SignoffSent, the message id is attached as
/// evidence and the environment advances to Approved.
pub async fn handle_email_update(
    ctx: &AppContext,
    update: EmailUpdate,
) -> Result<Option<EnvKind>, OnboardingError> {
    info!(
        message_id = %update.message_id,
        thread_id = %update.thread_id,
        "Received email update"
    );

    let thread = ctx.orchestrator.get_thread(&update.thread_id).await?;

    if !subject_indicates_approval(&update.subject) {
        return Ok(None);
    }

    let Some(waiting) = EnvKind::ALL
        .into_iter()
        .find(|kind| thread.environments.get(*kind).state == EnvState::SignoffSent)
    else {
        return Ok(None);
    };

    let mut evidence = thread.environments.get(waiting).evidence.clone();
    evidence.emails.push(update.message_id.clone());

    ctx.orchestrator
        .update_environment_state(
            &update.thread_id,
            waiting,
            EnvState::Approved,
            evidence,
            "system",
            &format!("Approval received via email {}", update.message_id),
        )
        .await?;

    ctx.audit
        .append(crate::store::AuditEntry::new(
            Some(update.thread_id.clone()),
            "system",
            "approval_email_received",
            json!({
                "message_id": update.message_id,
                "subject": update.subject,
                "sender": update.sender,
                "environment": waiting.to_string(),
            }),
        ))
        .await
        .map_err(OnboardingError::Store)?;

    Ok(Some(waiting))
}
