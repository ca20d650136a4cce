use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};

use onramp::commands;
use onramp::onboarding::{EnvKind, EnvState, Evidence, ScreenshotLabel};
use onramp::webhooks::{self, EmailUpdate, TicketUpdate};
use onramp::{AppContext, CommandRequest, OnrampConfig};

#[derive(Parser)]
#[command(name = "onramp")]
#[command(about = "Evidence-gated client onboarding orchestration")]
#[command(long_about = "Onramp drives clients through the Dev → Staging → Prod onboarding \
                       pipeline with a typed state machine, evidence requirements per step, \
                       and human approval gates. Start with 'onramp onboard <client>'.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Onboard a new client: create the thread and raise the Dev tickets
    Onboard {
        client: String,
        /// Acting user recorded in the audit trail
        #[arg(long, default_value = "cli-user")]
        user: String,
        /// LANIDs to provision in the Dev environment
        #[arg(long = "lanid")]
        lanids: Vec<String>,
    },
    /// Show per-environment state, evidence, blockers and next actions
    Status { client: String },
    /// Execute a free-text command (onboard / status / move / prepare prod)
    Command {
        text: String,
        #[arg(long, default_value = "cli-user")]
        user: String,
    },
    /// Request the approval gate for moving a client's active environment forward
    Move {
        client: String,
        /// Target environment (dev, staging, prod)
        env: String,
        #[arg(long, default_value = "cli-user")]
        user: String,
    },
    /// Raise the executive production-deployment approval
    PrepareProd {
        client: String,
        #[arg(long, default_value = "cli-user")]
        user: String,
    },
    /// Advance an environment to a new state, supplying evidence
    Advance {
        client: String,
        /// Environment (dev, staging, prod)
        env: String,
        /// Target state, e.g. CredsIssued
        state: String,
        /// Approval id for gated progression; omit for ungated transitions
        #[arg(long)]
        approval: Option<String>,
        /// Store this raw secret and attach the masked reference
        #[arg(long)]
        secret: Option<String>,
        /// Upload a placeholder screenshot with this label (login, consent, landing, token)
        #[arg(long = "screenshot")]
        screenshots: Vec<String>,
        /// Attach an email message id
        #[arg(long = "email")]
        emails: Vec<String>,
        /// Attach a free-text note
        #[arg(long = "note")]
        notes: Vec<String>,
        #[arg(long, default_value = "cli-user")]
        user: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Record the production deployment behind its approval gate
    Deploy {
        client: String,
        /// Production-deployment approval id
        #[arg(long)]
        approval: String,
        #[arg(long, default_value = "cli-user")]
        user: String,
    },
    /// Inspect and decide approval requests
    Approvals {
        #[command(subcommand)]
        command: ApprovalCommands,
    },
    /// Show the audit trail for a client
    Audit {
        client: String,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// List onboarding threads
    Threads {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Simulate a ticket status webhook
    TicketUpdate {
        ticket_id: String,
        status: String,
        #[arg(long, default_value = "ServiceNow")]
        system: String,
    },
    /// Simulate an inbound email webhook
    EmailReceived {
        client: String,
        subject: String,
        #[arg(long)]
        message_id: Option<String>,
        #[arg(long, default_value = "approver@example.com")]
        sender: String,
    },
}

#[derive(Subcommand)]
enum ApprovalCommands {
    /// List pending approvals, optionally for one client
    List {
        #[arg(long)]
        client: Option<String>,
    },
    /// Approve a pending request
    Approve {
        id: String,
        #[arg(long)]
        approver: String,
        #[arg(long, default_value = "")]
        comments: String,
    },
    /// Reject a pending request
    Reject {
        id: String,
        #[arg(long)]
        approver: String,
        #[arg(long)]
        reason: String,
    },
    /// Expire every overdue pending request
    Sweep,
    /// Per-client approval counts and history
    Summary { client: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tokio::runtime::Runtime::new()?.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let _ = OnrampConfig::load_env_file();
    let config = OnrampConfig::load()?;
    onramp::init_telemetry(&config.observability)?;
    let ctx = AppContext::initialize(config).await?;

    match cli.command {
        Commands::Onboard { client, user, lanids } => onboard_command(&ctx, &client, &user, lanids).await,
        Commands::Status { client } => status_command(&ctx, &client).await,
        Commands::Command { text, user } => command_command(&ctx, &text, &user).await,
        Commands::Move { client, env, user } => move_command(&ctx, &client, &env, &user).await,
        Commands::PrepareProd { client, user } => prepare_prod_command(&ctx, &client, &user).await,
        Commands::Advance {
            client,
            env,
            state,
            approval,
            secret,
            screenshots,
            emails,
            notes,
            user,
            reason,
        } => {
            advance_command(
                &ctx, &client, &env, &state, approval, secret, screenshots, emails, notes, &user,
                &reason,
            )
            .await
        }
        Commands::Deploy { client, approval, user } => {
            deploy_command(&ctx, &client, &approval, &user).await
        }
        Commands::Approvals { command } => approvals_command(&ctx, command).await,
        Commands::Audit { client, limit } => audit_command(&ctx, &client, limit).await,
        Commands::Threads { owner } => threads_command(&ctx, owner.as_deref()).await,
        Commands::TicketUpdate { ticket_id, status, system } => {
            ticket_update_command(&ctx, &ticket_id, &status, &system).await
        }
        Commands::EmailReceived { client, subject, message_id, sender } => {
            email_received_command(&ctx, &client, &subject, message_id, &sender).await
        }
    }
}

async fn onboard_command(ctx: &AppContext, client: &str, user: &str, lanids: Vec<String>) -> Result<()> {
    println!("🚀 Onboarding {} across dev → staging → prod", client);
    println!();

    if !lanids.is_empty() {
        println!("👥 LANIDs for Dev: {}", lanids.join(", "));
    }

    match commands::onboard(ctx, client, user, lanids).await {
        Ok(result) if result.success => {
            println!("✅ {}", result.message);
            println!();
            println!("🎯 NEXT STEPS:");
            println!("   → Check status: onramp status {}", client);
            println!("   → Once credentials arrive: onramp advance {} dev CredsIssued --secret <secret>", client);
        }
        Ok(result) => println!("❌ {}", result.message),
        Err(e) => println!("❌ Onboarding failed: {}", e),
    }

    Ok(())
}

async fn status_command(ctx: &AppContext, client: &str) -> Result<()> {
    println!("🔍 Gathering status for {}...", client);
    println!();

    match commands::status(ctx, client).await {
        Ok(result) if result.success => {
            println!("{}", result.message);
        }
        Ok(result) => println!("❌ {}", result.message),
        Err(e) => println!("❌ Status lookup failed: {}", e),
    }

    Ok(())
}

async fn command_command(ctx: &AppContext, text: &str, user: &str) -> Result<()> {
    println!("💬 Executing: {}", text);
    println!();

    let result = commands::execute(ctx, CommandRequest::new(text, user)).await;
    if result.success {
        println!("✅ {}", result.message);
    } else {
        println!("❌ {}", result.message);
    }

    Ok(())
}

async fn move_command(ctx: &AppContext, client: &str, env: &str, user: &str) -> Result<()> {
    let env: EnvKind = match env.parse() {
        Ok(env) => env,
        Err(e) => {
            println!("❌ {}", e);
            return Ok(());
        }
    };

    println!("🚦 Requesting progression gate: {} → {}", client, env);
    println!();

    match commands::move_client(ctx, client, env, user).await {
        Ok(result) if result.success => {
            println!("✅ {}", result.message);
            println!();
            println!("🎯 Approve with: onramp approvals approve <id> --approver <you>");
        }
        Ok(result) => println!("❌ {}", result.message),
        Err(e) => println!("❌ Move failed: {}", e),
    }

    Ok(())
}

async fn prepare_prod_command(ctx: &AppContext, client: &str, user: &str) -> Result<()> {
    println!("🏭 Preparing production for {}", client);
    println!("⚠️  This requires executive approval!");
    println!();

    match commands::prepare_prod(ctx, client, user).await {
        Ok(result) if result.success => println!("✅ {}", result.message),
        Ok(result) => println!("❌ {}", result.message),
        Err(e) => println!("❌ Prepare prod failed: {}", e),
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn advance_command(
    ctx: &AppContext,
    client: &str,
    env: &str,
    state: &str,
    approval: Option<String>,
    secret: Option<String>,
    screenshots: Vec<String>,
    emails: Vec<String>,
    notes: Vec<String>,
    user: &str,
    reason: &str,
) -> Result<()> {
    let env: EnvKind = match env.parse() {
        Ok(env) => env,
        Err(e) => {
            println!("❌ {}", e);
            return Ok(());
        }
    };
    let target: EnvState = match state.parse() {
        Ok(state) => state,
        Err(e) => {
            println!("❌ {}", e);
            return Ok(());
        }
    };

    let Some(thread) = ctx.orchestrator.find_thread_by_name(client).await? else {
        println!("❌ Client {} not found", client);
        return Ok(());
    };

    println!("⏩ Advancing {} {} to {}", client, env, target);
    println!();

    // Start from the stored evidence and fold in anything supplied here;
    // the transition replaces the environment's evidence wholesale
    let mut evidence: Evidence = thread.environments.get(env).evidence.clone();

    if let Some(raw_secret) = secret {
        print!("🔐 Storing client secret... ");
        let secret_ref = ctx.secrets.store_secret(client, env, &raw_secret).await?;
        println!("✅ ({})", secret_ref.mask);
        evidence.secret = Some(secret_ref);
    }

    for label in screenshots {
        let label: ScreenshotLabel = match label.to_lowercase().as_str() {
            "login" => ScreenshotLabel::Login,
            "consent" => ScreenshotLabel::Consent,
            "landing" => ScreenshotLabel::Landing,
            "token" => ScreenshotLabel::Token,
            other => {
                println!("❌ Unknown screenshot label: {}", other);
                return Ok(());
            }
        };
        print!("📸 Uploading {} screenshot... ", label);
        let screenshot = ctx.screenshots.upload(client, env, label, &[]).await?;
        println!("✅ ({})", screenshot.key);
        evidence.screenshots.push(screenshot);
    }

    evidence.emails.extend(emails);
    evidence.notes.extend(notes);

    let result = match approval {
        Some(approval_id) => {
            ctx.orchestrator
                .advance_environment_with_approval(
                    &approval_id, &thread.thread_id, env, target, evidence, user, reason,
                )
                .await
        }
        None => {
            ctx.orchestrator
                .update_environment_state(&thread.thread_id, env, target, evidence, user, reason)
                .await
        }
    };

    match result {
        Ok(updated) => {
            println!();
            println!("✅ {} {} is now {}", client, env, target);
            if !updated.next_actions.is_empty() {
                println!();
                println!("🎯 NEXT ACTIONS:");
                for action in updated.next_actions.iter().take(4) {
                    println!("   → {}", action);
                }
            }
        }
        Err(e) => {
            println!();
            println!("❌ Transition rejected: {}", e);
        }
    }

    Ok(())
}

async fn deploy_command(ctx: &AppContext, client: &str, approval: &str, user: &str) -> Result<()> {
    let Some(thread) = ctx.orchestrator.find_thread_by_name(client).await? else {
        println!("❌ Client {} not found", client);
        return Ok(());
    };

    println!("🚀 PRODUCTION DEPLOYMENT for {}", client);
    println!();

    match ctx
        .orchestrator
        .deploy_to_production_with_approval(approval, &thread.thread_id, user)
        .await
    {
        Ok(record) => {
            println!("✅ Production deployment approved for {}", record.client);
            println!("   📅 Deployed at: {}", record.deployed_at.format("%Y-%m-%d %H:%M UTC"));
            println!("   👤 Deployed by: {}", record.deployed_by);
            for (env, summary) in &record.environments {
                println!("   🌍 {}: {} ({} evidence items)", env, summary.state, summary.evidence_count);
            }
        }
        Err(e) => println!("❌ Deployment blocked: {}", e),
    }

    Ok(())
}

async fn approvals_command(ctx: &AppContext, command: ApprovalCommands) -> Result<()> {
    match command {
        ApprovalCommands::List { client } => {
            let thread_id = match client {
                Some(client) => match ctx.orchestrator.find_thread_by_name(&client).await? {
                    Some(thread) => Some(thread.thread_id),
                    None => {
                        println!("❌ Client {} not found", client);
                        return Ok(());
                    }
                },
                None => None,
            };

            let pending = ctx.approvals.list_pending(thread_id.as_deref()).await;
            if pending.is_empty() {
                println!("📋 No pending approvals");
                return Ok(());
            }

            println!("📋 PENDING APPROVALS:");
            println!("─────────────────────");
            for approval in pending {
                println!(" ⏳ {} [{}]", approval.id, approval.approval_type);
                println!("    📌 {}", approval.title);
                println!("    👥 Approvers: {}", approval.approvers.join(", "));
                println!("    ⏰ Expires: {}", approval.expires_at.format("%Y-%m-%d %H:%M UTC"));
                println!();
            }
        }
        ApprovalCommands::Approve { id, approver, comments } => {
            match ctx.approvals.approve(&id, &approver, &comments).await {
                Ok(approval) => {
                    println!("✅ Approval {} granted by {}", approval.id, approver);
                }
                Err(e) => println!("❌ Approve failed: {}", e),
            }
        }
        ApprovalCommands::Reject { id, approver, reason } => {
            match ctx.approvals.reject(&id, &approver, &reason).await {
                Ok(approval) => {
                    println!("🚫 Approval {} rejected by {}", approval.id, approver);
                }
                Err(e) => println!("❌ Reject failed: {}", e),
            }
        }
        ApprovalCommands::Sweep => {
            let expired = ctx.approvals.sweep_expired().await?;
            if expired.is_empty() {
                println!("✅ No overdue approvals");
            } else {
                println!("⏰ Expired {} overdue approval(s):", expired.len());
                for approval in expired {
                    println!("   💀 {} ({})", approval.id, approval.title);
                }
            }
        }
        ApprovalCommands::Summary { client } => {
            let Some(thread) = ctx.orchestrator.find_thread_by_name(&client).await? else {
                println!("❌ Client {} not found", client);
                return Ok(());
            };
            let summary = ctx.approvals.summary(&thread.thread_id).await;
            println!("📊 APPROVALS FOR {}:", client.to_uppercase());
            println!("──────────────────────");
            println!(" Total: {}", summary.total);
            println!(" ⏳ Pending: {}", summary.pending);
            println!(" ✅ Approved: {}", summary.approved);
            println!(" 🚫 Rejected: {}", summary.rejected);
            println!(" 💀 Expired: {}", summary.expired);
        }
    }

    Ok(())
}

async fn audit_command(ctx: &AppContext, client: &str, limit: usize) -> Result<()> {
    let Some(thread) = ctx.orchestrator.find_thread_by_name(client).await? else {
        println!("❌ Client {} not found", client);
        return Ok(());
    };

    let entries = ctx.orchestrator.audit_trail(&thread.thread_id, limit).await?;
    if entries.is_empty() {
        println!("📜 No audit entries for {}", client);
        return Ok(());
    }

    println!("📜 AUDIT TRAIL FOR {} (newest first):", client.to_uppercase());
    println!("──────────────────────────────────────");
    for entry in entries {
        println!(
            " {} | {} | {} | {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.actor,
            entry.action,
            entry.details
        );
    }

    Ok(())
}

async fn threads_command(ctx: &AppContext, owner: Option<&str>) -> Result<()> {
    let summaries = ctx.orchestrator.list_threads(owner).await?;
    if summaries.is_empty() {
        println!("📋 No onboarding threads found");
        println!("   💡 Start one with: onramp onboard <client>");
        return Ok(());
    }

    println!("📋 ONBOARDING THREADS:");
    println!("──────────────────────");
    for summary in summaries {
        let env = summary
            .current_environment
            .map(|e| e.to_string())
            .unwrap_or_else(|| "done".to_string());
        println!(
            " 🧵 {} - {:.0}% complete, active env: {} (owner: {})",
            summary.display_name,
            summary.overall_progress * 100.0,
            env,
            summary.owner
        );
        for action in summary.next_actions.iter().take(3) {
            println!("     → {}", action);
        }
    }

    Ok(())
}

async fn ticket_update_command(ctx: &AppContext, ticket_id: &str, status: &str, system: &str) -> Result<()> {
    println!("🎫 Ticket update: {} → {}", ticket_id, status);

    let update = TicketUpdate {
        ticket_id: ticket_id.to_string(),
        system: system.to_string(),
        status: status.to_string(),
        updated_at: Utc::now(),
        details: serde_json::json!({}),
    };

    let updated = webhooks::handle_ticket_update(ctx, update).await?;
    if updated.is_empty() {
        println!("ℹ️  No threads reference ticket {}", ticket_id);
    } else {
        println!("✅ Updated {} thread(s)", updated.len());
    }

    Ok(())
}

async fn email_received_command(
    ctx: &AppContext,
    client: &str,
    subject: &str,
    message_id: Option<String>,
    sender: &str,
) -> Result<()> {
    let Some(thread) = ctx.orchestrator.find_thread_by_name(client).await? else {
        println!("❌ Client {} not found", client);
        return Ok(());
    };

    let update = EmailUpdate {
        message_id: message_id.unwrap_or_else(|| format!("<{}@onramp.local>", uuid::Uuid::new_v4())),
        thread_id: thread.thread_id,
        subject: subject.to_string(),
        sender: sender.to_string(),
        received_at: Utc::now(),
        content: None,
    };

    println!("📧 Email received: \"{}\"", subject);
    match webhooks::handle_email_update(ctx, update).await? {
        Some(env) => println!("✅ {} {} advanced to Approved", client, env),
        None => println!("ℹ️  No environment was waiting on this email"),
    }

    Ok(())
}
