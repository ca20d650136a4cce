//! Webhook handler tests: ticket status changes and inbound email

use chrono::Utc;

use onramp::commands;
use onramp::onboarding::{EnvKind, EnvState, ScreenshotLabel};
use onramp::webhooks::{handle_email_update, handle_ticket_update, EmailUpdate, TicketUpdate};
use onramp::{AppContext, OnrampConfig};

fn test_context() -> AppContext {
    AppContext::in_memory(OnrampConfig::default())
}

async fn onboard_acme(ctx: &AppContext) -> String {
    let result = commands::onboard(ctx, "Acme", "tester@example.com", Vec::new())
        .await
        .unwrap();
    assert!(result.success);
    result.thread_id
}

fn ticket_update(ticket_id: &str, status: &str) -> TicketUpdate {
    TicketUpdate {
        ticket_id: ticket_id.to_string(),
        system: "ServiceNow".to_string(),
        status: status.to_string(),
        updated_at: Utc::now(),
        details: serde_json::json!({}),
    }
}

#[tokio::test]
async fn test_ticket_update_changes_stored_status() {
    let ctx = test_context();
    let thread_id = onboard_acme(&ctx).await;

    let thread = ctx.orchestrator.get_thread(&thread_id).await.unwrap();
    let ticket_id = thread.environments.get(EnvKind::Dev).evidence.tickets[0]
        .id
        .clone();

    let updated = handle_ticket_update(&ctx, ticket_update(&ticket_id, "resolved"))
        .await
        .unwrap();
    assert_eq!(updated, vec![thread_id.clone()]);

    let thread = ctx.orchestrator.get_thread(&thread_id).await.unwrap();
    let ticket = thread
        .environments
        .get(EnvKind::Dev)
        .evidence
        .tickets
        .iter()
        .find(|t| t.id == ticket_id)
        .unwrap();
    assert_eq!(ticket.status, "resolved");
    assert!(!ticket.is_open());

    // A resolved ticket drops out of the blockers list
    let status = ctx.orchestrator.thread_status(&thread_id).await.unwrap();
    assert!(!status.environments[&EnvKind::Dev]
        .blockers
        .iter()
        .any(|b| b.contains(&ticket_id)));
}

#[tokio::test]
async fn test_ticket_update_for_unknown_ticket_touches_nothing() {
    let ctx = test_context();
    onboard_acme(&ctx).await;

    let updated = handle_ticket_update(&ctx, ticket_update("SN-DOESNOTEXIST", "resolved"))
        .await
        .unwrap();
    assert!(updated.is_empty());
}

async fn drive_dev_to_signoff_sent(ctx: &AppContext, thread_id: &str) {
    let secret = ctx
        .secrets
        .store_secret("Acme", EnvKind::Dev, "hunter2-f3a9")
        .await
        .unwrap();
    let thread = ctx.orchestrator.get_thread(thread_id).await.unwrap();
    let mut evidence = thread.environments.get(EnvKind::Dev).evidence.clone();
    evidence.secret = Some(secret);
    ctx.orchestrator
        .update_environment_state(
            thread_id,
            EnvKind::Dev,
            EnvState::CredsIssued,
            evidence.clone(),
            "tester",
            "",
        )
        .await
        .unwrap();

    ctx.orchestrator
        .update_environment_state(
            thread_id,
            EnvKind::Dev,
            EnvState::AccessProvisioned,
            evidence.clone(),
            "tester",
            "",
        )
        .await
        .unwrap();

    for label in ScreenshotLabel::REQUIRED {
        let shot = ctx
            .screenshots
            .upload("Acme", EnvKind::Dev, label, &[])
            .await
            .unwrap();
        evidence.screenshots.push(shot);
    }
    ctx.orchestrator
        .update_environment_state(
            thread_id,
            EnvKind::Dev,
            EnvState::Validated,
            evidence.clone(),
            "tester",
            "",
        )
        .await
        .unwrap();

    evidence.emails.push("<signoff@onramp.local>".to_string());
    ctx.orchestrator
        .update_environment_state(
            thread_id,
            EnvKind::Dev,
            EnvState::SignoffSent,
            evidence,
            "tester",
            "",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_approval_email_advances_signoff_sent_environment() {
    let ctx = test_context();
    let thread_id = onboard_acme(&ctx).await;
    drive_dev_to_signoff_sent(&ctx, &thread_id).await;

    let advanced = handle_email_update(
        &ctx,
        EmailUpdate {
            message_id: "<approval-123@mail.example.com>".to_string(),
            thread_id: thread_id.clone(),
            subject: "Re: Dev sign-off for Acme - Approved".to_string(),
            sender: "lead@example.com".to_string(),
            received_at: Utc::now(),
            content: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(advanced, Some(EnvKind::Dev));

    let thread = ctx.orchestrator.get_thread(&thread_id).await.unwrap();
    let dev = thread.environments.get(EnvKind::Dev);
    assert_eq!(dev.state, EnvState::Approved);
    assert!(dev
        .evidence
        .emails
        .contains(&"<approval-123@mail.example.com>".to_string()));
}

#[tokio::test]
async fn test_non_approval_email_is_ignored() {
    let ctx = test_context();
    let thread_id = onboard_acme(&ctx).await;
    drive_dev_to_signoff_sent(&ctx, &thread_id).await;

    let advanced = handle_email_update(
        &ctx,
        EmailUpdate {
            message_id: "<newsletter@mail.example.com>".to_string(),
            thread_id: thread_id.clone(),
            subject: "Weekly platform update".to_string(),
            sender: "noreply@example.com".to_string(),
            received_at: Utc::now(),
            content: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(advanced, None);

    let thread = ctx.orchestrator.get_thread(&thread_id).await.unwrap();
    assert_eq!(
        thread.environments.get(EnvKind::Dev).state,
        EnvState::SignoffSent
    );
}

#[tokio::test]
async fn test_approval_email_without_waiting_environment_is_ignored() {
    let ctx = test_context();
    let thread_id = onboard_acme(&ctx).await;

    // Dev is in FormsRaised, nothing is waiting on sign-off
    let advanced = handle_email_update(
        &ctx,
        EmailUpdate {
            message_id: "<approval@mail.example.com>".to_string(),
            thread_id: thread_id.clone(),
            subject: "Approved".to_string(),
            sender: "lead@example.com".to_string(),
            received_at: Utc::now(),
            content: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(advanced, None);
}
