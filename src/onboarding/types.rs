// Core types for the client onboarding workflow

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::evidence::Evidence;

/// Target environments, in fixed promotion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvKind {
    Dev,
    Staging,
    Prod,
}

impl EnvKind {
    /// Promotion order: dev first, prod last
    pub const ALL: [EnvKind; 3] = [EnvKind::Dev, EnvKind::Staging, EnvKind::Prod];

    /// The environment that must be complete before this one can finish
    pub fn predecessor(self) -> Option<EnvKind> {
        match self {
            EnvKind::Dev => None,
            EnvKind::Staging => Some(EnvKind::Dev),
            EnvKind::Prod => Some(EnvKind::Staging),
        }
    }

    /// LANID provisioning only applies to non-production environments
    pub fn uses_lanids(self) -> bool {
        !matches!(self, EnvKind::Prod)
    }
}

impl std::fmt::Display for EnvKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EnvKind::Dev => "dev",
            EnvKind::Staging => "staging",
            EnvKind::Prod => "prod",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for EnvKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "dev" => Ok(EnvKind::Dev),
            "staging" => Ok(EnvKind::Staging),
            "prod" => Ok(EnvKind::Prod),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

/// Environment onboarding states.
///
/// The first eight form the ordered progression; Blocked, ChangesRequested and
/// Abandoned are special states reachable from any ordinary state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvState {
    NotStarted,
    FormsRaised,
    CredsIssued,
    AccessProvisioned,
    Validated,
    SignoffSent,
    Approved,
    Complete,
    Blocked,
    ChangesRequested,
    Abandoned,
}

impl std::fmt::Display for EnvState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::str::FromStr for EnvState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "notstarted" => Ok(EnvState::NotStarted),
            "formsraised" => Ok(EnvState::FormsRaised),
            "credsissued" => Ok(EnvState::CredsIssued),
            "accessprovisioned" => Ok(EnvState::AccessProvisioned),
            "validated" => Ok(EnvState::Validated),
            "signoffsent" => Ok(EnvState::SignoffSent),
            "approved" => Ok(EnvState::Approved),
            "complete" => Ok(EnvState::Complete),
            "blocked" => Ok(EnvState::Blocked),
            "changesrequested" => Ok(EnvState::ChangesRequested),
            "abandoned" => Ok(EnvState::Abandoned),
            other => Err(format!("unknown environment state: {}", other)),
        }
    }
}

/// Per-environment OAuth callback endpoints, generated from the client name.
/// Not evidence-gated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectUris {
    pub web_callback: String,
    pub post_logout: Option<String>,
    pub api_callback: Option<String>,
}

impl RedirectUris {
    /// Deterministic URIs from client name + environment + configured base domain
    pub fn generate(client: &str, env: EnvKind, base_domain: &str) -> Self {
        let slug = client.trim().to_lowercase().replace(' ', "-");
        let base = format!("https://{}.{}.{}", env, slug, base_domain);
        Self {
            web_callback: format!("{}/api/auth/callback/sso", base),
            post_logout: Some(format!("{}/auth/logout/callback", base)),
            api_callback: Some(format!("{}/api/auth/callback/sso", base)),
        }
    }
}

/// People attached to an environment. Informational, not evidence-gated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeopleSet {
    /// Internal user identifiers, Dev/Staging only
    #[serde(default)]
    pub lanids: Vec<String>,
    #[serde(default)]
    pub approvers: Vec<String>,
    /// Name -> email
    #[serde(default)]
    pub contacts: BTreeMap<String, String>,
}

/// One target environment within a client thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub kind: EnvKind,
    pub state: EnvState,
    /// State this environment was in when it entered ChangesRequested.
    /// Bounds how far back a rollback transition may go.
    #[serde(default)]
    pub rollback_origin: Option<EnvState>,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub redirect_uris: Option<RedirectUris>,
    #[serde(default)]
    pub people: PeopleSet,
    pub last_updated: DateTime<Utc>,
}

impl Environment {
    pub fn new(kind: EnvKind) -> Self {
        Self {
            kind,
            state: EnvState::NotStarted,
            rollback_origin: None,
            evidence: Evidence::default(),
            redirect_uris: None,
            people: PeopleSet::default(),
            last_updated: Utc::now(),
        }
    }
}

/// The three environments of a thread. Always fully populated; the type makes
/// a partially-populated thread unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environments {
    pub dev: Environment,
    pub staging: Environment,
    pub prod: Environment,
}

impl Environments {
    pub fn new() -> Self {
        Self {
            dev: Environment::new(EnvKind::Dev),
            staging: Environment::new(EnvKind::Staging),
            prod: Environment::new(EnvKind::Prod),
        }
    }

    pub fn get(&self, kind: EnvKind) -> &Environment {
        match kind {
            EnvKind::Dev => &self.dev,
            EnvKind::Staging => &self.staging,
            EnvKind::Prod => &self.prod,
        }
    }

    pub fn get_mut(&mut self, kind: EnvKind) -> &mut Environment {
        match kind {
            EnvKind::Dev => &mut self.dev,
            EnvKind::Staging => &mut self.staging,
            EnvKind::Prod => &mut self.prod,
        }
    }

    /// Iterate in promotion order
    pub fn iter(&self) -> impl Iterator<Item = &Environment> {
        [&self.dev, &self.staging, &self.prod].into_iter()
    }
}

impl Default for Environments {
    fn default() -> Self {
        Self::new()
    }
}

/// One client's onboarding thread across all three environments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientThread {
    pub thread_id: String,
    pub display_name: String,
    pub environments: Environments,
    /// Requester
    pub owner: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    /// Derived from the state machine; rebuilt from scratch on every transition
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Bumped by the store on every persisted update; lost updates surface as
    /// conflicts instead of silently overwriting.
    #[serde(default)]
    pub revision: u64,
}

impl ClientThread {
    pub fn new(
        display_name: impl Into<String>,
        owner: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            thread_id: uuid::Uuid::new_v4().to_string(),
            display_name: display_name.into(),
            environments: Environments::new(),
            owner: owner.into(),
            created_by: created_by.into(),
            created_at: now,
            last_update: now,
            blockers: Vec::new(),
            next_actions: Vec::new(),
            metadata: BTreeMap::new(),
            revision: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_kind_roundtrip() {
        for kind in EnvKind::ALL {
            let parsed: EnvKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("production".parse::<EnvKind>().is_err());
    }

    #[test]
    fn test_predecessor_chain() {
        assert_eq!(EnvKind::Dev.predecessor(), None);
        assert_eq!(EnvKind::Staging.predecessor(), Some(EnvKind::Dev));
        assert_eq!(EnvKind::Prod.predecessor(), Some(EnvKind::Staging));
    }

    #[test]
    fn test_new_thread_has_three_fresh_environments() {
        let thread = ClientThread::new("Acme", "owner@example.com", "creator@example.com");
        for kind in EnvKind::ALL {
            let env = thread.environments.get(kind);
            assert_eq!(env.kind, kind);
            assert_eq!(env.state, EnvState::NotStarted);
            assert!(env.evidence.tickets.is_empty());
        }
        assert_eq!(thread.revision, 0);
    }

    #[test]
    fn test_redirect_uris_are_deterministic() {
        let first = RedirectUris::generate("Acme Corp", EnvKind::Dev, "example.com");
        let second = RedirectUris::generate("Acme Corp", EnvKind::Dev, "example.com");
        assert_eq!(first, second);
        assert_eq!(
            first.web_callback,
            "https://dev.acme-corp.example.com/api/auth/callback/sso"
        );
    }
}
