// Command Surface Module
//
// The front-end entry point: free-text commands are parsed by a thin regex
// layer and dispatched to the orchestrator. Any front end (CLI, HTTP shell)
// goes through the same executor.

pub mod parser;
pub mod redact;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::context::AppContext;
use crate::onboarding::{
    current_environment, state_machine::order_index, EnvKind, EnvState, Evidence, RedirectUris,
    STATE_ORDER,
};
use crate::orchestrator::{OnboardingError, ThreadStatus};

pub use parser::{parse_intent, CommandIntent};
pub use redact::redact;

/// A command as received from any front end
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub text: String,
    pub user_id: String,
    pub request_id: Option<String>,
}

impl CommandRequest {
    pub fn new(text: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            user_id: user_id.into(),
            request_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Outcome of a command, shaped for direct display
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub message: String,
    pub thread_id: String,
    pub success: bool,
    pub details: serde_json::Value,
}

impl CommandResult {
    fn ok(message: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            thread_id: thread_id.into(),
            success: true,
            details: json!({}),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            thread_id: String::new(),
            success: false,
            details: json!({}),
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Parse and execute a free-text command
pub async fn execute(ctx: &AppContext, request: CommandRequest) -> CommandResult {
    let intent = parse_intent(&request.text);
    info!(
        user_id = %request.user_id,
        request_id = ?request.request_id,
        command = %redact(&request.text),
        intent = ?intent,
        "Executing command"
    );

    let result = match intent {
        CommandIntent::Onboard { client } => {
            onboard(ctx, &client, &request.user_id, Vec::new()).await
        }
        CommandIntent::Status { client } => status(ctx, &client).await,
        CommandIntent::Move { client, env } => move_client(ctx, &client, env, &request.user_id).await,
        CommandIntent::PrepareProd { client } => prepare_prod(ctx, &client, &request.user_id).await,
        CommandIntent::Unknown => {
            return CommandResult::failure(format!(
                "Unknown command: {}. Available commands: onboard, status, move, prepare prod",
                request.text
            ))
        }
    };

    result.unwrap_or_else(|e| CommandResult::failure(format!("Command failed: {}", e)))
}

/// Onboard a new client: create the thread, generate dev redirect URIs, raise
/// the dev NSSR and GLAM/GWAM tickets, and move dev to FormsRaised.
pub async fn onboard(
    ctx: &AppContext,
    client: &str,
    user: &str,
    lanids: Vec<String>,
) -> Result<CommandResult, OnboardingError> {
    let thread = ctx
        .orchestrator
        .create_thread(client, user, user, lanids.clone())
        .await?;

    let redirect_uris = RedirectUris::generate(client, EnvKind::Dev, &ctx.config.workflow.base_domain);
    ctx.orchestrator
        .set_redirect_uris(&thread.thread_id, EnvKind::Dev, redirect_uris.clone(), user)
        .await?;

    // Evidence creation happens before the transition, as separate retryable steps
    let nssr = ctx.tickets.create_nssr(client, EnvKind::Dev, &redirect_uris).await?;
    let glam = ctx
        .tickets
        .create_access_request(client, EnvKind::Dev, &lanids)
        .await?;

    let evidence = Evidence {
        tickets: vec![nssr.clone(), glam.clone()],
        ..Evidence::default()
    };
    ctx.orchestrator
        .update_environment_state(
            &thread.thread_id,
            EnvKind::Dev,
            EnvState::FormsRaised,
            evidence,
            user,
            "Onboarding kickoff",
        )
        .await?;

    Ok(CommandResult::ok(
        format!(
            "Created onboarding thread for {}. Dev NSSR ticket {} and GLAM ticket {} created. Waiting for credentials.",
            client, nssr.id, glam.id
        ),
        thread.thread_id,
    )
    .with_details(json!({
        "nssr_ticket": nssr.id,
        "glam_ticket": glam.id,
        "redirect_uris": redirect_uris,
    })))
}

/// Report a client's full status
pub async fn status(ctx: &AppContext, client: &str) -> Result<CommandResult, OnboardingError> {
    let Some(thread) = ctx.orchestrator.find_thread_by_name(client).await? else {
        let available: Vec<String> = ctx
            .orchestrator
            .list_threads(None)
            .await?
            .into_iter()
            .map(|t| t.display_name)
            .collect();
        return Ok(CommandResult::failure(format!(
            "Client {} not found. Available clients: {:?}",
            client, available
        )));
    };

    let status = ctx.orchestrator.thread_status(&thread.thread_id).await?;
    let message = format_status_message(client, &status);

    Ok(CommandResult::ok(message, thread.thread_id).with_details(
        serde_json::to_value(&status).unwrap_or_else(|_| json!({})),
    ))
}

fn format_status_message(client: &str, status: &ThreadStatus) -> String {
    let mut message = format!("Status for {}:\n", client);
    message.push_str(&format!(
        "Overall Progress: {:.1}%\n",
        status.overall_progress * 100.0
    ));
    message.push_str(&format!(
        "Current Environment: {}\n\n",
        status
            .current_environment
            .map(|e| e.to_string())
            .unwrap_or_else(|| "None".to_string())
    ));

    for (kind, env) in &status.environments {
        message.push_str(&format!("{}: {}\n", kind, env.state));
        if env.evidence.tickets > 0 {
            message.push_str(&format!("  Tickets: {}\n", env.evidence.tickets));
        }
        if env.evidence.screenshots > 0 {
            message.push_str(&format!("  Screenshots: {}\n", env.evidence.screenshots));
        }
        if env.evidence.has_secret {
            message.push_str("  Credentials: Issued\n");
        }
    }

    if !status.blockers.is_empty() {
        message.push_str(&format!("\nBlockers: {}\n", status.blockers.join(", ")));
    }
    if !status.next_actions.is_empty() {
        let top: Vec<&str> = status.next_actions.iter().take(3).map(|s| s.as_str()).collect();
        message.push_str(&format!("Next Actions: {}\n", top.join(", ")));
    }

    message
}

/// Start the gated move of a client's active environment: raises the
/// environment-progression approval and reports what the advance will need.
pub async fn move_client(
    ctx: &AppContext,
    client: &str,
    target_env: EnvKind,
    user: &str,
) -> Result<CommandResult, OnboardingError> {
    let Some(thread) = ctx.orchestrator.find_thread_by_name(client).await? else {
        return Ok(CommandResult::failure(format!("Client {} not found", client)));
    };

    let Some(current_env) = current_environment(&thread) else {
        return Ok(CommandResult::failure(format!(
            "No active environment for {}",
            client
        )));
    };

    if target_env != current_env {
        return Ok(CommandResult::failure(format!(
            "Current environment for {} is {}; complete it before moving to {}",
            client, current_env, target_env
        )));
    }

    let current_state = thread.environments.get(current_env).state;
    let Some(next_state) = order_index(current_state)
        .and_then(|idx| STATE_ORDER.get(idx + 1))
        .copied()
    else {
        return Ok(CommandResult::failure(format!(
            "{} {} is in {} and has no automatic next step",
            client, current_env, current_state
        )));
    };

    let approval = ctx
        .orchestrator
        .request_progression_approval(
            &thread.thread_id,
            current_env,
            next_state,
            ctx.config.workflow.default_approvers.clone(),
            Some(ctx.config.approvals.environment_progression_hours),
        )
        .await?;

    let message = format!(
        "Move {} to {} requires approval.\n\
         1. Approval {} sent to {}\n\
         2. Once approved, advance {} from {} to {} with the required evidence\n\
         3. Approval expires {}",
        client,
        target_env,
        approval.id,
        approval.approvers.join(", "),
        current_env,
        current_state,
        next_state,
        approval.expires_at.format("%Y-%m-%d %H:%M UTC"),
    );

    Ok(CommandResult::ok(message, thread.thread_id).with_details(json!({
        "approval_id": approval.id,
        "environment": current_env.to_string(),
        "from_state": current_state.to_string(),
        "to_state": next_state.to_string(),
        "expires_at": approval.expires_at.to_rfc3339(),
    })))
}

/// Prepare production: verify the non-prod pipeline and raise the executive
/// production-deployment approval.
pub async fn prepare_prod(
    ctx: &AppContext,
    client: &str,
    _user: &str,
) -> Result<CommandResult, OnboardingError> {
    let Some(thread) = ctx.orchestrator.find_thread_by_name(client).await? else {
        return Ok(CommandResult::failure(format!("Client {} not found", client)));
    };

    let staging_state = thread.environments.get(EnvKind::Staging).state;
    let approval = ctx
        .orchestrator
        .request_production_approval(
            &thread.thread_id,
            ctx.config.workflow.production_approvers.clone(),
            Some(ctx.config.approvals.production_deployment_hours),
        )
        .await?;

    let message = format!(
        "Prepare Prod for {}:\n\
         1. Staging is currently {}\n\
         2. Production deployment approval {} sent to {}\n\
         3. Raise the Prod NSSR ticket (no GLAM/GWAM needed for Prod)\n\
         4. Deployment requires dev and staging Complete before execution",
        client,
        staging_state,
        approval.id,
        approval.approvers.join(", "),
    );

    Ok(CommandResult::ok(message, thread.thread_id).with_details(json!({
        "approval_id": approval.id,
        "staging_state": staging_state.to_string(),
        "expires_at": approval.expires_at.to_rfc3339(),
    })))
}
