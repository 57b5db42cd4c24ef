use serde::{Deserialize, Serialize};

/// Policy Engine configuration: where the policy bundle lives and which
/// built-in decision plugins are active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Filesystem path to the policy bundle directory (hot-reloadable).
    #[serde(default = "d_bundle_path")]
    pub bundle_path: String,
    #[serde(default)]
    pub plugins: Vec<PolicyPluginConfig>,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            bundle_path: d_bundle_path(),
            plugins: Vec::new(),
            sandbox: SandboxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyPluginConfig {
    pub name: String,
    /// Higher runs first; first deny short-circuits evaluation.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// Plugin Sandbox resource envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "d_memory_limit_mb")]
    pub memory_limit_mb: u64,
    #[serde(default = "d_cpu_time_secs")]
    pub cpu_time_secs: u64,
    #[serde(default = "d_wall_time_secs")]
    pub wall_time_secs: u64,
    #[serde(default = "d_max_fds")]
    pub max_open_fds: u32,
    #[serde(default = "d_allowed_imports")]
    pub allowed_imports: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: d_memory_limit_mb(),
            cpu_time_secs: d_cpu_time_secs(),
            wall_time_secs: d_wall_time_secs(),
            max_open_fds: d_max_fds(),
            allowed_imports: d_allowed_imports(),
        }
    }
}

fn d_bundle_path() -> String {
    "./policies".into()
}
fn d_memory_limit_mb() -> u64 {
    64
}
fn d_cpu_time_secs() -> u64 {
    2
}
fn d_wall_time_secs() -> u64 {
    5
}
fn d_max_fds() -> u32 {
    0
}
fn d_allowed_imports() -> Vec<String> {
    vec![
        "collections".into(),
        "math".into(),
        "datetime".into(),
        "re".into(),
        "uuid".into(),
        "json".into(),
    ]
}
