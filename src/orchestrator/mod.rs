// Thread/Environment Orchestrator
//
// Composes the state machine's decisions with persistence and audit side
// effects. This is the transactional boundary: a transition and its evidence
// apply together or not at all, and nothing is persisted until validation
// passed. Writes to one thread are serialized behind a per-thread mutex, with
// a revision check at persist time as the backstop against lost updates.

pub mod status;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::approvals::{
    ApprovalError, ApprovalManager, ApprovalRequest, ApprovalStatus, ApprovalType, NewApproval,
};
use crate::onboarding::{
    self, can_transition, validate_transition, ClientThread, EnvKind, EnvState, Evidence,
};
use crate::providers::ProviderError;
use crate::store::{AuditEntry, AuditSink, StoreError, ThreadStore};

pub use status::{EnvironmentStatus, EvidenceCounts, ThreadStatus, ThreadSummary};

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("invalid transition: {from} → {to}")]
    InvalidTransition { from: EnvState, to: EnvState },
    #[error("transition blocked: {}", .errors.join("; "))]
    EvidenceInsufficient { errors: Vec<String> },
    #[error("approval required: {0}")]
    ApprovalRequired(String),
    #[error("approval {0} has expired")]
    ApprovalExpired(String),
    #[error("approval {id} does not cover actor {actor}")]
    ApprovalUnauthorized { id: String, actor: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("collaborator failure: {0}")]
    Collaborator(#[from] ProviderError),
}

impl From<ApprovalError> for OnboardingError {
    fn from(err: ApprovalError) -> Self {
        match err {
            ApprovalError::NotFound(id) => {
                OnboardingError::ApprovalRequired(format!("approval {} does not exist", id))
            }
            ApprovalError::NotPending { id, status } => {
                OnboardingError::ApprovalRequired(format!("approval {} is {}", id, status))
            }
            ApprovalError::Expired(id) => OnboardingError::ApprovalExpired(id),
            ApprovalError::Unauthorized { id, approver } => OnboardingError::ApprovalUnauthorized {
                id,
                actor: approver,
            },
            ApprovalError::Audit(e) => OnboardingError::Store(e),
        }
    }
}

/// Summary returned (and audited) when a production deployment is approved
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRecord {
    pub client: String,
    pub thread_id: String,
    pub deployed_at: chrono::DateTime<Utc>,
    pub deployed_by: String,
    pub environments: BTreeMap<String, DeploymentEnvSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentEnvSummary {
    pub state: String,
    pub evidence_count: usize,
}

pub struct Orchestrator {
    store: Arc<dyn ThreadStore>,
    audit: Arc<dyn AuditSink>,
    approvals: Arc<ApprovalManager>,
    /// One mutex per thread id, serializing read-modify-write cycles
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ThreadStore>,
        audit: Arc<dyn AuditSink>,
        approvals: Arc<ApprovalManager>,
    ) -> Self {
        Self {
            store,
            audit,
            approvals,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn approvals(&self) -> &ApprovalManager {
        &self.approvals
    }

    async fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a thread with all three environments at NotStarted
    pub async fn create_thread(
        &self,
        display_name: &str,
        owner: &str,
        created_by: &str,
        lanids: Vec<String>,
    ) -> Result<ClientThread, OnboardingError> {
        let mut thread = ClientThread::new(display_name, owner, created_by);
        if !lanids.is_empty() {
            thread.environments.get_mut(EnvKind::Dev).people.lanids = lanids.clone();
        }

        let thread = self.store.create_thread(thread).await?;

        info!(thread_id = %thread.thread_id, client = %display_name, "Onboarding thread created");

        self.audit
            .append(AuditEntry::new(
                Some(thread.thread_id.clone()),
                created_by,
                "thread_created",
                json!({
                    "display_name": display_name,
                    "owner": owner,
                    "lanids": lanids,
                }),
            ))
            .await?;

        Ok(thread)
    }

    /// Apply a validated state transition atomically.
    ///
    /// The supplied evidence replaces the environment's stored evidence
    /// wholesale; thread-level blockers and next actions are rebuilt from
    /// scratch across all three environments.
    pub async fn update_environment_state(
        &self,
        thread_id: &str,
        env: EnvKind,
        new_state: EnvState,
        evidence: Evidence,
        actor: &str,
        reason: &str,
    ) -> Result<ClientThread, OnboardingError> {
        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let mut thread = self.store.get_thread(thread_id).await?;
        let current = thread.environments.get(env).state;

        let outcome = validate_transition(current, new_state, env, &evidence, Some(&thread));
        if !outcome.is_valid() {
            let rollback_origin = thread.environments.get(env).rollback_origin;
            if !can_transition(current, new_state, rollback_origin) {
                return Err(OnboardingError::InvalidTransition {
                    from: current,
                    to: new_state,
                });
            }
            return Err(OnboardingError::EvidenceInsufficient {
                errors: outcome.errors,
            });
        }

        let now = Utc::now();
        let evidence_count = evidence.item_count();
        {
            let env_mut = thread.environments.get_mut(env);
            if new_state == EnvState::ChangesRequested {
                // Remember where the rollback started; special origins stay unknown
                if onboarding::state_machine::order_index(current).is_some() {
                    env_mut.rollback_origin = Some(current);
                }
            } else if current == EnvState::ChangesRequested {
                env_mut.rollback_origin = None;
            }
            env_mut.evidence = evidence;
            env_mut.state = new_state;
            env_mut.last_updated = now;
        }
        thread.last_update = now;

        let (blockers, next_actions) = derive_thread_views(&thread);
        thread.blockers = blockers;
        thread.next_actions = next_actions;

        let thread = self.store.update_thread(thread).await?;

        info!(
            thread_id = %thread_id,
            environment = %env,
            from_state = %current,
            to_state = %new_state,
            actor = %actor,
            "Environment state transition applied"
        );

        self.audit
            .append(AuditEntry::new(
                Some(thread_id.to_string()),
                actor,
                "state_transition",
                json!({
                    "environment": env.to_string(),
                    "from_state": current.to_string(),
                    "to_state": new_state.to_string(),
                    "reason": reason,
                    "evidence_count": evidence_count,
                }),
            ))
            .await?;

        Ok(thread)
    }

    /// Attach generated redirect URIs to an environment. Not evidence-gated,
    /// but still serialized and audited like any other thread mutation.
    pub async fn set_redirect_uris(
        &self,
        thread_id: &str,
        env: EnvKind,
        redirect_uris: crate::onboarding::RedirectUris,
        actor: &str,
    ) -> Result<ClientThread, OnboardingError> {
        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let mut thread = self.store.get_thread(thread_id).await?;
        let now = Utc::now();
        {
            let env_mut = thread.environments.get_mut(env);
            env_mut.redirect_uris = Some(redirect_uris.clone());
            env_mut.last_updated = now;
        }
        thread.last_update = now;
        let thread = self.store.update_thread(thread).await?;

        self.audit
            .append(AuditEntry::new(
                Some(thread_id.to_string()),
                actor,
                "redirect_uris_generated",
                json!({
                    "environment": env.to_string(),
                    "web_callback": redirect_uris.web_callback,
                }),
            ))
            .await?;

        Ok(thread)
    }

    /// Phase one of the gated flow: create an environment-progression approval
    pub async fn request_progression_approval(
        &self,
        thread_id: &str,
        env: EnvKind,
        target_state: EnvState,
        approvers: Vec<String>,
        timeout_hours: Option<i64>,
    ) -> Result<ApprovalRequest, OnboardingError> {
        // Fail early if the thread is unknown
        let thread = self.store.get_thread(thread_id).await?;
        let current = thread.environments.get(env).state;

        let mut evidence = BTreeMap::new();
        evidence.insert("from_state".to_string(), json!(current.to_string()));
        evidence.insert("to_state".to_string(), json!(target_state.to_string()));

        let request = self
            .approvals
            .create_request(NewApproval {
                thread_id: thread_id.to_string(),
                environment: env,
                approval_type: ApprovalType::EnvironmentProgression,
                title: format!("Advance {} {} to {}", thread.display_name, env, target_state),
                description: format!(
                    "Approve progression of {} from {} to {} in {}",
                    thread.display_name, current, target_state, env
                ),
                approvers,
                evidence,
                timeout_hours,
            })
            .await?;

        Ok(request)
    }

    /// Phase one of the gated flow: create a production-deployment approval
    pub async fn request_production_approval(
        &self,
        thread_id: &str,
        approvers: Vec<String>,
        timeout_hours: Option<i64>,
    ) -> Result<ApprovalRequest, OnboardingError> {
        let thread = self.store.get_thread(thread_id).await?;

        let mut evidence = BTreeMap::new();
        for kind in EnvKind::ALL {
            let env = thread.environments.get(kind);
            evidence.insert(kind.to_string(), json!(env.state.to_string()));
        }

        let request = self
            .approvals
            .create_request(NewApproval {
                thread_id: thread_id.to_string(),
                environment: EnvKind::Prod,
                approval_type: ApprovalType::ProductionDeployment,
                title: format!("Production deployment for {}", thread.display_name),
                description: format!(
                    "Approve production deployment of {} (requires dev and staging complete)",
                    thread.display_name
                ),
                approvers,
                evidence,
                timeout_hours,
            })
            .await?;

        Ok(request)
    }

    /// Phase two: execute a state transition behind a satisfied approval gate
    pub async fn advance_environment_with_approval(
        &self,
        approval_id: &str,
        thread_id: &str,
        env: EnvKind,
        new_state: EnvState,
        evidence: Evidence,
        actor: &str,
        reason: &str,
    ) -> Result<ClientThread, OnboardingError> {
        self.check_gate(
            approval_id,
            thread_id,
            Some(env),
            ApprovalType::EnvironmentProgression,
        )
        .await?;

        self.update_environment_state(thread_id, env, new_state, evidence, actor, reason)
            .await
    }

    /// Phase two: record a production deployment behind an executive gate.
    /// Every non-prod environment must already be Complete.
    pub async fn deploy_to_production_with_approval(
        &self,
        approval_id: &str,
        thread_id: &str,
        actor: &str,
    ) -> Result<DeploymentRecord, OnboardingError> {
        self.check_gate(
            approval_id,
            thread_id,
            Some(EnvKind::Prod),
            ApprovalType::ProductionDeployment,
        )
        .await?;

        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let thread = self.store.get_thread(thread_id).await?;

        let incomplete: Vec<String> = EnvKind::ALL
            .into_iter()
            .filter(|kind| *kind != EnvKind::Prod)
            .filter(|kind| thread.environments.get(*kind).state != EnvState::Complete)
            .map(|kind| {
                format!(
                    "Environment {} must be complete before production deployment",
                    kind
                )
            })
            .collect();
        if !incomplete.is_empty() {
            return Err(OnboardingError::EvidenceInsufficient { errors: incomplete });
        }

        let mut environments = BTreeMap::new();
        for kind in EnvKind::ALL {
            let env = thread.environments.get(kind);
            environments.insert(
                kind.to_string(),
                DeploymentEnvSummary {
                    state: env.state.to_string(),
                    evidence_count: env.evidence.item_count(),
                },
            );
        }

        let record = DeploymentRecord {
            client: thread.display_name.clone(),
            thread_id: thread_id.to_string(),
            deployed_at: Utc::now(),
            deployed_by: actor.to_string(),
            environments,
        };

        info!(thread_id = %thread_id, client = %record.client, "Production deployment approved");

        self.audit
            .append(AuditEntry::new(
                Some(thread_id.to_string()),
                actor,
                "production_deployment_approved",
                serde_json::to_value(&record).unwrap_or_else(|_| json!({})),
            ))
            .await?;

        Ok(record)
    }

    /// Verify a gate is satisfied: the approval exists, is approved, unexpired,
    /// and matches the operation it is supposed to cover.
    async fn check_gate(
        &self,
        approval_id: &str,
        thread_id: &str,
        env: Option<EnvKind>,
        expected_type: ApprovalType,
    ) -> Result<(), OnboardingError> {
        let approval = self.approvals.get(approval_id).await.ok_or_else(|| {
            OnboardingError::ApprovalRequired(format!("approval {} does not exist", approval_id))
        })?;

        if approval.thread_id != thread_id
            || approval.approval_type != expected_type
            || env.map_or(false, |e| approval.environment != e)
        {
            return Err(OnboardingError::ApprovalRequired(format!(
                "approval {} does not cover this operation",
                approval_id
            )));
        }

        match approval.status {
            ApprovalStatus::Approved => Ok(()),
            ApprovalStatus::Expired => Err(OnboardingError::ApprovalExpired(approval.id)),
            ApprovalStatus::Pending if approval.is_expired(Utc::now()) => {
                Err(OnboardingError::ApprovalExpired(approval.id))
            }
            ApprovalStatus::Pending => Err(OnboardingError::ApprovalRequired(format!(
                "approval {} is still pending",
                approval.id
            ))),
            ApprovalStatus::Rejected => Err(OnboardingError::ApprovalRequired(format!(
                "approval {} was rejected",
                approval.id
            ))),
        }
    }

    /// Update the status of a ticket reference wherever it appears.
    /// Returns the ids of threads that were touched.
    pub async fn record_ticket_status(
        &self,
        ticket_id: &str,
        system: &str,
        status: &str,
    ) -> Result<Vec<String>, OnboardingError> {
        let threads = self.store.list_threads(None).await?;
        let mut updated = Vec::new();

        for thread in threads {
            let has_ticket = thread
                .environments
                .iter()
                .flat_map(|e| e.evidence.tickets.iter())
                .any(|t| t.id == ticket_id);
            if !has_ticket {
                continue;
            }

            let lock = self.thread_lock(&thread.thread_id).await;
            let _guard = lock.lock().await;

            // Re-read under the lock so we never clobber a concurrent update
            let mut thread = self.store.get_thread(&thread.thread_id).await?;
            for kind in EnvKind::ALL {
                let env = thread.environments.get_mut(kind);
                for ticket in env.evidence.tickets.iter_mut() {
                    if ticket.id == ticket_id {
                        ticket.status = status.to_string();
                    }
                }
            }
            thread.last_update = Utc::now();
            let thread = self.store.update_thread(thread).await?;

            self.audit
                .append(AuditEntry::new(
                    Some(thread.thread_id.clone()),
                    "system",
                    "ticket_status_updated",
                    json!({
                        "ticket_id": ticket_id,
                        "system": system,
                        "status": status,
                    }),
                ))
                .await?;

            updated.push(thread.thread_id);
        }

        Ok(updated)
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<ClientThread, OnboardingError> {
        Ok(self.store.get_thread(thread_id).await?)
    }

    pub async fn find_thread_by_name(
        &self,
        display_name: &str,
    ) -> Result<Option<ClientThread>, OnboardingError> {
        Ok(self.store.find_by_name(display_name).await?)
    }

    pub async fn thread_status(&self, thread_id: &str) -> Result<ThreadStatus, OnboardingError> {
        let thread = self.store.get_thread(thread_id).await?;
        Ok(ThreadStatus::from_thread(&thread))
    }

    pub async fn list_threads(
        &self,
        owner: Option<&str>,
    ) -> Result<Vec<ThreadSummary>, OnboardingError> {
        let threads = self.store.list_threads(owner).await?;
        Ok(threads.iter().map(ThreadSummary::from_thread).collect())
    }

    pub async fn audit_trail(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, OnboardingError> {
        Ok(self.audit.query(thread_id, limit).await?)
    }
}

/// Rebuild thread-level blockers and next actions across all environments.
/// Previous derived lists are fully discarded, not merged.
fn derive_thread_views(thread: &ClientThread) -> (Vec<String>, Vec<String>) {
    let mut blockers = Vec::new();
    let mut next_actions = Vec::new();
    for env in thread.environments.iter() {
        blockers.extend(onboarding::blockers(env, thread));
        next_actions.extend(onboarding::next_actions(env, thread));
    }
    (blockers, next_actions)
}
