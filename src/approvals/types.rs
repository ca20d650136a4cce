// Approval request records for human-in-the-loop gates

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::onboarding::EnvKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        self != ApprovalStatus::Pending
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Expired => "expired",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    TicketCreation,
    EnvironmentProgression,
    ProductionDeployment,
    CredentialIssuance,
}

impl ApprovalType {
    /// SLA timeout applied when the caller does not supply one
    pub fn default_timeout_hours(self) -> i64 {
        match self {
            ApprovalType::TicketCreation => 24,
            ApprovalType::EnvironmentProgression => 48,
            ApprovalType::ProductionDeployment => 72,
            ApprovalType::CredentialIssuance => 48,
        }
    }

    /// Reduced timeout for emergency requests
    pub const EMERGENCY_TIMEOUT_HOURS: i64 = 4;
}

impl std::fmt::Display for ApprovalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ApprovalType::TicketCreation => "ticket_creation",
            ApprovalType::EnvironmentProgression => "environment_progression",
            ApprovalType::ProductionDeployment => "production_deployment",
            ApprovalType::CredentialIssuance => "credential_issuance",
        };
        write!(f, "{}", name)
    }
}

/// A single human approval request. Created pending; exactly one terminal
/// transition (approved, rejected or expired) is ever applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub thread_id: String,
    pub environment: EnvKind,
    pub approval_type: ApprovalType,
    pub title: String,
    pub description: String,
    /// Any one of these identities satisfies the gate
    pub approvers: Vec<String>,
    /// Snapshot of the evidence the approver is ruling on
    #[serde(default)]
    pub evidence: BTreeMap<String, serde_json::Value>,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl ApprovalRequest {
    pub fn new(
        thread_id: impl Into<String>,
        environment: EnvKind,
        approval_type: ApprovalType,
        title: impl Into<String>,
        description: impl Into<String>,
        approvers: Vec<String>,
        evidence: BTreeMap<String, serde_json::Value>,
        timeout_hours: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: format!("approval-{}", uuid::Uuid::new_v4()),
            thread_id: thread_id.into(),
            environment,
            approval_type,
            title: title.into(),
            description: description.into(),
            approvers,
            evidence,
            status: ApprovalStatus::Pending,
            created_at: now,
            expires_at: now + Duration::hours(timeout_hours),
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn authorizes(&self, approver: &str) -> bool {
        self.approvers.iter().any(|a| a == approver)
    }
}

/// Read-only aggregate of a thread's approvals
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApprovalSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub expired: usize,
    pub approvals: Vec<ApprovalRequest>,
}
