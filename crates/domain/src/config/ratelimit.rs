use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Principal-aware sliding-window rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "d_default_limit")]
    pub default_limit: u64,
    #[serde(default = "d_window_secs")]
    pub window_secs: u64,
    /// Per-principal-identifier overrides (e.g. `"api_key:abc123"`).
    #[serde(default)]
    pub overrides: HashMap<String, u64>,
    /// Principal identifiers exempt from rate limiting entirely.
    #[serde(default)]
    pub admin_bypass: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_limit: d_default_limit(),
            window_secs: d_window_secs(),
            overrides: HashMap::new(),
            admin_bypass: Vec::new(),
        }
    }
}

fn d_default_limit() -> u64 {
    1000
}
fn d_window_secs() -> u64 {
    3600
}
