use serde::{Deserialize, Serialize};

/// Admin bearer-token guard configuration, grounded on the teacher's
/// `AdminGuard` extractor pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token.
    /// If unset, admin endpoints (policy reload, plugin registration,
    /// budget overrides) are disabled (403).
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { token_env: d_admin_token_env() }
    }
}

fn d_admin_token_env() -> String {
    "SARK_ADMIN_TOKEN".into()
}
