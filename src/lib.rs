// Onramp Library - Evidence-Gated Client Onboarding Orchestration
// This exposes the core components for testing and integration

pub mod approvals;
pub mod commands;
pub mod config;
pub mod context;
pub mod onboarding;
pub mod orchestrator;
pub mod providers;
pub mod store;
pub mod telemetry;
pub mod webhooks;

// Re-export key types for easy access
pub use approvals::{ApprovalError, ApprovalManager, ApprovalRequest, ApprovalStatus, ApprovalType};
pub use commands::{execute, parse_intent, CommandIntent, CommandRequest, CommandResult};
pub use config::OnrampConfig;
pub use context::AppContext;
pub use onboarding::{
    calculate_progress, can_transition, current_environment, validate_transition, ClientThread,
    EnvKind, EnvState, Environment, Evidence, ScreenshotLabel, ScreenshotRef, SecretRef,
    TicketKind, TicketRef,
};
pub use orchestrator::{
    DeploymentRecord, OnboardingError, Orchestrator, ThreadStatus, ThreadSummary,
};
pub use providers::{
    EmailGateway, MockEmailGateway, MockScreenshotStore, MockSecretStore, MockTicketing,
    ProviderError, ScreenshotStore, SecretStore, TicketProvider,
};
pub use store::{AuditEntry, AuditSink, InMemoryStore, StoreError, ThreadStore};
pub use telemetry::{generate_correlation_id, init_telemetry};
pub use webhooks::{handle_email_update, handle_ticket_update, EmailUpdate, TicketUpdate};
