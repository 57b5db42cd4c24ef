mod adapters;
mod admin;
mod audit;
mod cache;
mod cost;
mod observability;
mod policy;
mod ratelimit;
mod server;

pub use adapters::*;
pub use admin::*;
pub use audit::*;
pub use cache::*;
pub use cost::*;
pub use observability::*;
pub use policy::*;
pub use ratelimit::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub adapters: AdapterConfig,
    #[serde(default)]
    pub cost: CostConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load from a TOML file, falling back to defaults for a missing file.
    /// Environment variables of the form `SARK__SECTION__FIELD` override
    /// individual scalar fields after the TOML layer is parsed.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let mut cfg = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw).map_err(|e| crate::error::SarkError::Config(e.to_string()))?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Config::default()
        };
        if let Ok(port) = std::env::var("SARK__SERVER__PORT") {
            if let Ok(p) = port.parse() {
                cfg.server.port = p;
            }
        }
        Ok(cfg)
    }

    /// Validate cross-field invariants the `Default`/serde layer can't
    /// express. Errors should stop startup; warnings are logged.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.adapters.enabled_protocols.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "adapters.enabled_protocols".into(),
                message: "at least one protocol must be enabled".into(),
            });
        }
        if self.audit.siem.batch_size == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "audit.siem.batch_size".into(),
                message: "batch_size must be > 0".into(),
            });
        }
        if self.audit.siem.queue_capacity < self.audit.siem.batch_size {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "audit.siem.queue_capacity".into(),
                message: "queue_capacity smaller than batch_size; batches will rarely fill".into(),
            });
        }
        if std::env::var(&self.admin.token_env).is_err() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "admin.token_env".into(),
                message: format!(
                    "{} is not set; admin endpoints are disabled",
                    self.admin.token_env
                ),
            });
        }
        issues
    }
}

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_fatal_issues() {
        let cfg = Config::default();
        let issues = cfg.validate();
        assert!(issues.iter().all(|i| i.severity != ConfigSeverity::Error));
    }

    #[test]
    fn empty_protocol_list_is_fatal() {
        let mut cfg = Config::default();
        cfg.adapters.enabled_protocols.clear();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.severity == ConfigSeverity::Error && i.field == "adapters.enabled_protocols"));
    }

    #[test]
    fn deserialize_empty_toml_uses_all_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 8443);
        assert_eq!(cfg.adapters.enabled_protocols, vec!["mcp", "http", "grpc"]);
    }
}
