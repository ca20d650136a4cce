// Read-side status views derived from a client thread

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::onboarding::{
    self, ClientThread, EnvKind, EnvState, PeopleSet, RedirectUris,
};

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceCounts {
    pub tickets: usize,
    pub screenshots: usize,
    pub emails: usize,
    pub has_secret: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentStatus {
    pub state: EnvState,
    pub last_updated: DateTime<Utc>,
    pub evidence: EvidenceCounts,
    pub redirect_uris: Option<RedirectUris>,
    pub people: PeopleSet,
    pub blockers: Vec<String>,
    pub next_actions: Vec<String>,
}

/// Full status of one thread: progress, active environment and per-environment
/// detail, computed deterministically from the stored thread.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadStatus {
    pub thread_id: String,
    pub display_name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub overall_progress: f64,
    pub current_environment: Option<EnvKind>,
    pub blockers: Vec<String>,
    pub next_actions: Vec<String>,
    pub environments: BTreeMap<EnvKind, EnvironmentStatus>,
}

impl ThreadStatus {
    pub fn from_thread(thread: &ClientThread) -> Self {
        let mut environments = BTreeMap::new();
        for kind in EnvKind::ALL {
            let env = thread.environments.get(kind);
            environments.insert(
                kind,
                EnvironmentStatus {
                    state: env.state,
                    last_updated: env.last_updated,
                    evidence: EvidenceCounts {
                        tickets: env.evidence.tickets.len(),
                        screenshots: env.evidence.screenshots.len(),
                        emails: env.evidence.emails.len(),
                        has_secret: env.evidence.secret.is_some(),
                    },
                    redirect_uris: env.redirect_uris.clone(),
                    people: env.people.clone(),
                    blockers: onboarding::blockers(env, thread),
                    next_actions: onboarding::next_actions(env, thread),
                },
            );
        }

        Self {
            thread_id: thread.thread_id.clone(),
            display_name: thread.display_name.clone(),
            owner: thread.owner.clone(),
            created_at: thread.created_at,
            last_update: thread.last_update,
            overall_progress: onboarding::calculate_progress(thread),
            current_environment: onboarding::current_environment(thread),
            blockers: thread.blockers.clone(),
            next_actions: thread.next_actions.clone(),
            environments,
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} - {:.1}% complete",
            self.display_name,
            self.overall_progress * 100.0
        )
    }
}

/// Condensed per-thread line for listings
#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub display_name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub overall_progress: f64,
    pub current_environment: Option<EnvKind>,
    pub blockers: Vec<String>,
    pub next_actions: Vec<String>,
}

impl ThreadSummary {
    pub fn from_thread(thread: &ClientThread) -> Self {
        Self {
            thread_id: thread.thread_id.clone(),
            display_name: thread.display_name.clone(),
            owner: thread.owner.clone(),
            created_at: thread.created_at,
            last_update: thread.last_update,
            overall_progress: onboarding::calculate_progress(thread),
            current_environment: onboarding::current_environment(thread),
            blockers: thread.blockers.clone(),
            next_actions: thread.next_actions.clone(),
        }
    }
}
