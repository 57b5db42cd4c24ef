use serde::{Deserialize, Serialize};

/// Protocol Adapter Layer configuration: which protocols are enabled and
/// the shared retry/circuit-breaker/auth envelope each adapter is wrapped
/// in by the Adapter Registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "d_enabled_protocols")]
    pub enabled_protocols: Vec<String>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default = "d_per_adapter_rate_limit")]
    pub per_adapter_rate_limit: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            enabled_protocols: d_enabled_protocols(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            per_adapter_rate_limit: d_per_adapter_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "d_backoff_base")]
    pub backoff_base: f64,
    #[serde(default = "d_backoff_max")]
    pub backoff_max_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: d_max_attempts(),
            backoff_base: d_backoff_base(),
            backoff_max_secs: d_backoff_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "d_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "d_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "d_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: d_failure_threshold(),
            success_threshold: d_success_threshold(),
            cooldown_secs: d_cooldown_secs(),
        }
    }
}

fn d_enabled_protocols() -> Vec<String> {
    vec!["mcp".into(), "http".into(), "grpc".into()]
}
fn d_max_attempts() -> u32 {
    3
}
fn d_backoff_base() -> f64 {
    2.0
}
fn d_backoff_max() -> f64 {
    60.0
}
fn d_failure_threshold() -> u32 {
    5
}
fn d_success_threshold() -> u32 {
    3
}
fn d_cooldown_secs() -> u64 {
    60
}
fn d_per_adapter_rate_limit() -> u64 {
    500
}
