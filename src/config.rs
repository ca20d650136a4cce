use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::approvals::ApprovalType;

/// Main configuration structure for Onramp.
///
/// Loaded once at startup and carried in the application context; there is no
/// ambient global configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OnrampConfig {
    /// Workflow settings (domains, default approvers, artifact locations)
    pub workflow: WorkflowConfig,
    /// Approval SLA timeouts
    pub approvals: ApprovalSlaConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Database settings (optional; in-memory store when absent)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Base domain used when generating redirect URIs
    pub base_domain: String,
    /// Approvers for environment progression gates
    pub default_approvers: Vec<String>,
    /// Approvers for production deployment gates
    pub production_approvers: Vec<String>,
    /// Secret manager key prefix
    pub secrets_prefix: String,
    /// Object storage bucket for screenshots
    pub artifact_bucket: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApprovalSlaConfig {
    pub ticket_creation_hours: i64,
    pub environment_progression_hours: i64,
    pub production_deployment_hours: i64,
    pub credential_issuance_hours: i64,
}

impl ApprovalSlaConfig {
    pub fn timeout_for(&self, approval_type: ApprovalType) -> i64 {
        match approval_type {
            ApprovalType::TicketCreation => self.ticket_creation_hours,
            ApprovalType::EnvironmentProgression => self.environment_progression_hours,
            ApprovalType::ProductionDeployment => self.production_deployment_hours,
            ApprovalType::CredentialIssuance => self.credential_issuance_hours,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON-formatted logs
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for OnrampConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig {
                base_domain: "example.com".to_string(),
                default_approvers: vec![
                    "sso-admin@example.com".to_string(),
                    "devops-team@example.com".to_string(),
                ],
                production_approvers: vec![
                    "sso-admin@example.com".to_string(),
                    "security-team@example.com".to_string(),
                    "cto@example.com".to_string(),
                ],
                secrets_prefix: "onramp".to_string(),
                artifact_bucket: "onramp-artifacts".to_string(),
            },
            approvals: ApprovalSlaConfig {
                ticket_creation_hours: ApprovalType::TicketCreation.default_timeout_hours(),
                environment_progression_hours: ApprovalType::EnvironmentProgression
                    .default_timeout_hours(),
                production_deployment_hours: ApprovalType::ProductionDeployment
                    .default_timeout_hours(),
                credential_issuance_hours: ApprovalType::CredentialIssuance
                    .default_timeout_hours(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            database: None,
        }
    }
}

impl OnrampConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (onramp.toml, .onramp-rc)
    /// 3. Environment variables (prefixed with ONRAMP__)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&OnrampConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("onramp.toml").exists() {
            builder = builder.add_source(File::with_name("onramp"));
        }

        if Path::new(".onramp-rc").exists() {
            builder = builder.add_source(File::with_name(".onramp-rc"));
        }

        builder = builder.add_source(
            Environment::with_prefix("ONRAMP")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_sla_table() {
        let config = OnrampConfig::default();
        assert_eq!(config.approvals.timeout_for(ApprovalType::TicketCreation), 24);
        assert_eq!(
            config.approvals.timeout_for(ApprovalType::EnvironmentProgression),
            48
        );
        assert_eq!(
            config.approvals.timeout_for(ApprovalType::ProductionDeployment),
            72
        );
        assert_eq!(
            config.approvals.timeout_for(ApprovalType::CredentialIssuance),
            48
        );
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = OnrampConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: OnrampConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.workflow.base_domain, config.workflow.base_domain);
        assert_eq!(parsed.approvals.production_deployment_hours, 72);
    }
}
