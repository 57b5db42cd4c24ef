//! Plugin Sandbox — static validation and resource envelope for
//! dynamically loaded policy decision plugins.
//!
//! Grounded on
//! `examples/original_source/src/sark/services/policy/sandbox.py`'s
//! `PolicyPluginSandbox` (resource limits) and `validate_plugin_code`
//! (forbidden-pattern static check), and on the teacher's precompiled
//! `regex::RegexSet` pattern (`crates/gateway/src/bootstrap.rs`'s
//! `denied_command_set`) for the forbidden-pattern matcher.

use regex::RegexSet;
use sark_domain::config::SandboxConfig;

#[derive(Debug, Clone, thiserror::Error)]
#[error("sandbox violation: {kind}")]
pub struct SandboxViolation {
    pub kind: String,
}

impl SandboxViolation {
    fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

/// Static source patterns that are never permitted in a policy plugin,
/// regardless of the configured import allow-list: dynamic evaluation,
/// filesystem access, subprocess spawning.
const FORBIDDEN_PATTERNS: &[&str] = &[
    r"\beval\s*\(",
    r"\bexec\s*\(",
    r"\b__import__\s*\(",
    r"\bopen\s*\(",
    r"\bsubprocess\b",
    r"\bos\.(system|popen|exec\w*)\b",
    r"\bsocket\.",
];

/// Resource envelope enforcement + static source validation for plugin
/// code loaded into the Policy Engine.
pub struct PluginSandbox {
    config: SandboxConfig,
    forbidden: RegexSet,
}

impl PluginSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        let forbidden =
            RegexSet::new(FORBIDDEN_PATTERNS).expect("sandbox forbidden patterns must compile");
        Self { config, forbidden }
    }

    /// Reject plugin source containing a forbidden construct. This never
    /// executes the source — it's a pure text scan, run once at plugin
    /// registration time.
    pub fn validate_source(&self, source: &str) -> Result<(), SandboxViolation> {
        if self.forbidden.is_match(source) {
            let matched: Vec<&str> = self
                .forbidden
                .matches(source)
                .into_iter()
                .map(|i| FORBIDDEN_PATTERNS[i])
                .collect();
            return Err(SandboxViolation::new(format!(
                "forbidden construct(s) in plugin source: {}",
                matched.join(", ")
            )));
        }
        Ok(())
    }

    /// Reject an import not on the configured allow-list.
    pub fn validate_import(&self, module: &str) -> Result<(), SandboxViolation> {
        if self.config.allowed_imports.iter().any(|m| m == module) {
            Ok(())
        } else {
            Err(SandboxViolation::new(format!("import not allowed: {module}")))
        }
    }

    /// Run `f` under the configured wall-time deadline. A plugin that
    /// exceeds it is treated as a sandbox violation and its decision is
    /// discarded, not awaited indefinitely.
    pub async fn run_with_deadline<F, T>(&self, f: F) -> Result<T, SandboxViolation>
    where
        F: std::future::Future<Output = T>,
    {
        let deadline = std::time::Duration::from_secs(self.config.wall_time_secs);
        tokio::time::timeout(deadline, f)
            .await
            .map_err(|_| SandboxViolation::new("wall_time_exceeded"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> PluginSandbox {
        PluginSandbox::new(SandboxConfig {
            memory_limit_mb: 64,
            cpu_time_secs: 2,
            wall_time_secs: 5,
            max_open_fds: 0,
            allowed_imports: vec!["math".into(), "json".into()],
        })
    }

    #[test]
    fn rejects_eval() {
        let result = sandbox().validate_source("def evaluate(ctx):\n    eval('1+1')\n");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_subprocess() {
        let result = sandbox().validate_source("import subprocess\nsubprocess.run(['ls'])\n");
        assert!(result.is_err());
    }

    #[test]
    fn allows_clean_source() {
        let result = sandbox().validate_source("def evaluate(ctx):\n    return ctx['allow']\n");
        assert!(result.is_ok());
    }

    #[test]
    fn import_allow_list_enforced() {
        let sandbox = sandbox();
        assert!(sandbox.validate_import("math").is_ok());
        assert!(sandbox.validate_import("socket").is_err());
    }

    #[tokio::test]
    async fn wall_time_exceeded_is_a_violation() {
        let sandbox = sandbox();
        let result = sandbox
            .run_with_deadline(async {
                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
            })
            .await;
        assert!(result.is_err());
    }
}
