// Human-in-the-loop approval tracking with timeout/expiry semantics.
//
// The only component holding internal mutable state over time: a map of
// approval requests keyed by id, mutated under a single RwLock. Distinct
// requests approve/reject in parallel; a single request is atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::onboarding::EnvKind;
use crate::store::{AuditEntry, AuditSink, StoreError};

use super::types::{ApprovalRequest, ApprovalStatus, ApprovalSummary, ApprovalType};

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval {0} not found")]
    NotFound(String),
    #[error("approval {id} is already {status}")]
    NotPending { id: String, status: ApprovalStatus },
    #[error("approval {0} has expired")]
    Expired(String),
    #[error("{approver} is not an authorized approver for {id}")]
    Unauthorized { id: String, approver: String },
    #[error(transparent)]
    Audit(#[from] StoreError),
}

/// Parameters for a new approval request
#[derive(Debug, Clone)]
pub struct NewApproval {
    pub thread_id: String,
    pub environment: EnvKind,
    pub approval_type: ApprovalType,
    pub title: String,
    pub description: String,
    pub approvers: Vec<String>,
    pub evidence: BTreeMap<String, serde_json::Value>,
    /// Falls back to the type-specific SLA default when absent
    pub timeout_hours: Option<i64>,
}

pub struct ApprovalManager {
    requests: RwLock<HashMap<String, ApprovalRequest>>,
    audit: Arc<dyn AuditSink>,
}

impl ApprovalManager {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
            audit,
        }
    }

    /// Create a pending request and emit an `approval_requested` audit entry
    pub async fn create_request(&self, new: NewApproval) -> Result<ApprovalRequest, ApprovalError> {
        let timeout = new
            .timeout_hours
            .unwrap_or_else(|| new.approval_type.default_timeout_hours());
        let request = ApprovalRequest::new(
            new.thread_id,
            new.environment,
            new.approval_type,
            new.title,
            new.description,
            new.approvers,
            new.evidence,
            timeout,
        );

        self.requests
            .write()
            .await
            .insert(request.id.clone(), request.clone());

        info!(
            approval_id = %request.id,
            thread_id = %request.thread_id,
            approval_type = %request.approval_type,
            expires_at = %request.expires_at,
            "Approval requested"
        );

        self.audit
            .append(AuditEntry::new(
                Some(request.thread_id.clone()),
                "system",
                "approval_requested",
                json!({
                    "approval_id": request.id,
                    "approval_type": request.approval_type.to_string(),
                    "environment": request.environment.to_string(),
                    "approvers": request.approvers,
                    "expires_at": request.expires_at.to_rfc3339(),
                }),
            ))
            .await?;

        Ok(request)
    }

    /// Emergency variant: reduced timeout, justification carried in the
    /// evidence snapshot
    pub async fn create_emergency_request(
        &self,
        thread_id: impl Into<String>,
        environment: EnvKind,
        emergency_type: impl Into<String>,
        justification: impl Into<String>,
        requested_by: impl Into<String>,
        approvers: Vec<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let emergency_type = emergency_type.into();
        let justification = justification.into();
        let mut evidence = BTreeMap::new();
        evidence.insert("emergency".to_string(), json!(true));
        evidence.insert("emergency_type".to_string(), json!(emergency_type));
        evidence.insert("justification".to_string(), json!(justification));
        evidence.insert("requested_by".to_string(), json!(requested_by.into()));

        self.create_request(NewApproval {
            thread_id: thread_id.into(),
            environment,
            approval_type: ApprovalType::EnvironmentProgression,
            title: format!("EMERGENCY: {}", emergency_type),
            description: format!("Emergency approval required: {}", justification),
            approvers,
            evidence,
            timeout_hours: Some(ApprovalType::EMERGENCY_TIMEOUT_HOURS),
        })
        .await
    }

    /// Look up a request by id
    pub async fn get(&self, approval_id: &str) -> Option<ApprovalRequest> {
        self.requests.read().await.get(approval_id).cloned()
    }

    /// Approve a pending request. Fails without mutation when the id is
    /// unknown, the request is terminal, the deadline has passed (which flips
    /// the status to expired as a side effect), or the approver is not on the
    /// required list.
    pub async fn approve(
        &self,
        approval_id: &str,
        approver: &str,
        comments: &str,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let updated = {
            let mut requests = self.requests.write().await;
            let request = requests
                .get_mut(approval_id)
                .ok_or_else(|| ApprovalError::NotFound(approval_id.to_string()))?;

            Self::check_actionable(request, approver)?;

            request.status = ApprovalStatus::Approved;
            request.approved_by = Some(approver.to_string());
            request.approved_at = Some(Utc::now());
            request.clone()
        };

        info!(
            approval_id = %updated.id,
            approver = %approver,
            "Approval granted"
        );

        self.audit
            .append(AuditEntry::new(
                Some(updated.thread_id.clone()),
                approver,
                "approval_granted",
                json!({
                    "approval_id": updated.id,
                    "approval_type": updated.approval_type.to_string(),
                    "environment": updated.environment.to_string(),
                    "comments": comments,
                }),
            ))
            .await?;

        Ok(updated)
    }

    /// Reject a pending request with a stored reason. Same preconditions as
    /// `approve`.
    pub async fn reject(
        &self,
        approval_id: &str,
        approver: &str,
        reason: &str,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let updated = {
            let mut requests = self.requests.write().await;
            let request = requests
                .get_mut(approval_id)
                .ok_or_else(|| ApprovalError::NotFound(approval_id.to_string()))?;

            Self::check_actionable(request, approver)?;

            request.status = ApprovalStatus::Rejected;
            request.approved_by = Some(approver.to_string());
            request.approved_at = Some(Utc::now());
            request.rejection_reason = Some(reason.to_string());
            request.clone()
        };

        warn!(
            approval_id = %updated.id,
            approver = %approver,
            reason = %reason,
            "Approval rejected"
        );

        self.audit
            .append(AuditEntry::new(
                Some(updated.thread_id.clone()),
                approver,
                "approval_rejected",
                json!({
                    "approval_id": updated.id,
                    "approval_type": updated.approval_type.to_string(),
                    "environment": updated.environment.to_string(),
                    "reason": reason,
                }),
            ))
            .await?;

        Ok(updated)
    }

    fn check_actionable(
        request: &mut ApprovalRequest,
        approver: &str,
    ) -> Result<(), ApprovalError> {
        if request.status != ApprovalStatus::Pending {
            return Err(ApprovalError::NotPending {
                id: request.id.clone(),
                status: request.status,
            });
        }
        if request.is_expired(Utc::now()) {
            request.status = ApprovalStatus::Expired;
            return Err(ApprovalError::Expired(request.id.clone()));
        }
        if !request.authorizes(approver) {
            return Err(ApprovalError::Unauthorized {
                id: request.id.clone(),
                approver: approver.to_string(),
            });
        }
        Ok(())
    }

    /// Still-pending requests, optionally filtered by thread. Requests past
    /// their deadline are demoted to expired on the way through so stale
    /// entries are never returned as actionable.
    pub async fn list_pending(&self, thread_id: Option<&str>) -> Vec<ApprovalRequest> {
        let now = Utc::now();
        let mut requests = self.requests.write().await;

        for request in requests.values_mut() {
            if request.status == ApprovalStatus::Pending && request.is_expired(now) {
                request.status = ApprovalStatus::Expired;
            }
        }

        let mut pending: Vec<ApprovalRequest> = requests
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .filter(|r| thread_id.map_or(true, |t| r.thread_id == t))
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending
    }

    /// Demote every overdue pending request, one audit entry per expiry
    pub async fn sweep_expired(&self) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        let now = Utc::now();
        let expired: Vec<ApprovalRequest> = {
            let mut requests = self.requests.write().await;
            requests
                .values_mut()
                .filter(|r| r.status == ApprovalStatus::Pending && r.is_expired(now))
                .map(|r| {
                    r.status = ApprovalStatus::Expired;
                    r.clone()
                })
                .collect()
        };

        for request in &expired {
            warn!(approval_id = %request.id, "Approval expired without decision");
            self.audit
                .append(AuditEntry::new(
                    Some(request.thread_id.clone()),
                    "system",
                    "approval_expired",
                    json!({
                        "approval_id": request.id,
                        "approval_type": request.approval_type.to_string(),
                        "environment": request.environment.to_string(),
                        "expired_at": now.to_rfc3339(),
                    }),
                ))
                .await?;
        }

        Ok(expired)
    }

    /// Record an escalation on a still-pending request. Audit-only: the
    /// deadline and approver list are unchanged.
    pub async fn escalate(
        &self,
        approval_id: &str,
        actor: &str,
        reason: &str,
    ) -> Result<(), ApprovalError> {
        let request = {
            let requests = self.requests.read().await;
            let request = requests
                .get(approval_id)
                .ok_or_else(|| ApprovalError::NotFound(approval_id.to_string()))?;
            if request.status != ApprovalStatus::Pending {
                return Err(ApprovalError::NotPending {
                    id: request.id.clone(),
                    status: request.status,
                });
            }
            request.clone()
        };

        warn!(approval_id = %approval_id, reason = %reason, "Approval escalated");

        self.audit
            .append(AuditEntry::new(
                Some(request.thread_id),
                actor,
                "approval_escalated",
                json!({
                    "approval_id": approval_id,
                    "reason": reason,
                }),
            ))
            .await?;

        Ok(())
    }

    /// Read-only aggregate for a thread
    pub async fn summary(&self, thread_id: &str) -> ApprovalSummary {
        let requests = self.requests.read().await;
        let mut summary = ApprovalSummary::default();

        for request in requests.values().filter(|r| r.thread_id == thread_id) {
            summary.total += 1;
            match request.status {
                ApprovalStatus::Pending => summary.pending += 1,
                ApprovalStatus::Approved => summary.approved += 1,
                ApprovalStatus::Rejected => summary.rejected += 1,
                ApprovalStatus::Expired => summary.expired += 1,
            }
            summary.approvals.push(request.clone());
        }

        summary.approvals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summary
    }
}
