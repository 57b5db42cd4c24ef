//! Policy Engine — pluggable decision plugins evaluated in priority order,
//! composed conjunctively, first deny short-circuits.

use std::collections::HashSet;

use parking_lot::RwLock;
use sark_domain::config::SandboxConfig;
use sark_domain::{Capability, Decision, InvocationRequest, Resource};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::sandbox::{PluginSandbox, SandboxViolation};

/// Everything a [`DecisionPlugin`] may consult. Deliberately excludes
/// nothing from `request.arguments` — plugins may inspect arguments (the
/// Decision Cache, not the engine, is what must stay argument-blind.
pub struct PolicyInput<'a> {
    pub request: &'a InvocationRequest,
    pub resource: &'a Resource,
    pub capability: &'a Capability,
}

/// A pluggable policy decision source. `evaluate` returns `None` to
/// abstain (defer to other plugins); `Some(decision)` participates in the
/// conjunctive composition.
pub trait DecisionPlugin: Send + Sync {
    fn name(&self) -> &str;
    /// Higher runs first; the first plugin to return a denying decision
    /// short-circuits the rest.
    fn priority(&self) -> i32 {
        0
    }
    fn evaluate(&self, input: &PolicyInput<'_>) -> Option<Decision>;
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyChangeLogEntry {
    pub kind: String,
    pub version: String,
    pub actor: String,
    pub content_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyEngineError {
    #[error("a plugin named '{0}' is already registered")]
    DuplicatePlugin(String),
}

/// Evaluates registered [`DecisionPlugin`]s against a [`PolicyInput`] and
/// produces a single [`Decision`]. A plugin panic or parse error during
/// bundle reload degrades to fail-closed, never fail-open.
pub struct PolicyEngine {
    plugins: RwLock<Vec<Box<dyn DecisionPlugin>>>,
    names: RwLock<HashSet<String>>,
    bundle_version: RwLock<String>,
    change_log: RwLock<Vec<PolicyChangeLogEntry>>,
    sandbox: PluginSandbox,
}

impl PolicyEngine {
    pub fn new(sandbox_config: SandboxConfig) -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
            names: RwLock::new(HashSet::new()),
            bundle_version: RwLock::new("0".into()),
            change_log: RwLock::new(Vec::new()),
            sandbox: PluginSandbox::new(sandbox_config),
        }
    }

    pub fn register(&self, plugin: Box<dyn DecisionPlugin>) -> Result<(), PolicyEngineError> {
        let name = plugin.name().to_string();
        let mut names = self.names.write();
        if !names.insert(name.clone()) {
            return Err(PolicyEngineError::DuplicatePlugin(name));
        }
        let mut plugins = self.plugins.write();
        plugins.push(plugin);
        plugins.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        Ok(())
    }

    /// Evaluate every registered plugin. Composition: first deny wins;
    /// with no denies, allow iff at least one plugin allowed (all
    /// abstentions defaults to a closed deny with a distinguished reason).
    /// Each plugin runs under the sandbox's wall-time deadline in addition
    /// to the existing panic guard.
    pub async fn evaluate(&self, input: &PolicyInput<'_>) -> Decision {
        let plugins = self.plugins.read();
        let mut saw_allow = false;
        let mut filtered_parameters = Vec::new();
        let mut narrowest_ttl: Option<u64> = None;

        for plugin in plugins.iter() {
            let deadline_result = self
                .sandbox
                .run_with_deadline(async {
                    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| plugin.evaluate(input)))
                })
                .await;

            let outcome = match deadline_result {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::error!(plugin = plugin.name(), "policy plugin exceeded its wall-time deadline");
                    return Decision {
                        allow: false,
                        reason: format!("policy plugin '{}' exceeded its execution deadline", plugin.name()),
                        filtered_parameters: Vec::new(),
                        cache_ttl_secs: 0,
                        policy_version: Some(self.bundle_version.read().clone()),
                    };
                }
            };

            match outcome {
                Ok(Some(decision)) => {
                    if !decision.allow {
                        return decision;
                    }
                    saw_allow = true;
                    filtered_parameters.extend(decision.filtered_parameters.clone());
                    narrowest_ttl = Some(match narrowest_ttl {
                        Some(existing) => existing.min(decision.cache_ttl_secs),
                        None => decision.cache_ttl_secs,
                    });
                }
                Ok(None) => {}
                Err(_) => {
                    tracing::error!(plugin = plugin.name(), "policy plugin panicked");
                    return Decision {
                        allow: false,
                        reason: format!("policy plugin '{}' crashed", plugin.name()),
                        filtered_parameters: Vec::new(),
                        cache_ttl_secs: 0,
                        policy_version: Some(self.bundle_version.read().clone()),
                    };
                }
            }
        }

        let sensitivity_ttl = input.capability.sensitivity.cache_ttl_secs();
        Decision {
            allow: saw_allow,
            reason: if saw_allow {
                "allowed by policy".into()
            } else {
                "no policy allowed this action".into()
            },
            filtered_parameters,
            cache_ttl_secs: narrowest_ttl.unwrap_or(sensitivity_ttl).min(sensitivity_ttl),
            policy_version: Some(self.bundle_version.read().clone()),
        }
    }

    /// Validate and record a policy bundle reload. Bumps the version and
    /// appends a change-log entry; does not itself reload plugin code —
    /// that is the caller's responsibility (re-registering plugins). The
    /// bundle text is run through the same static scan a plugin's source
    /// gets, since it is the one place untrusted plugin-like text enters
    /// the engine.
    pub fn reload_bundle(
        &self,
        actor: &str,
        bundle_contents: &str,
    ) -> Result<PolicyChangeLogEntry, SandboxViolation> {
        self.sandbox.validate_source(bundle_contents)?;

        let hash = hex::encode(Sha256::digest(bundle_contents.as_bytes()));
        let mut version = self.bundle_version.write();
        let next = version.parse::<u64>().unwrap_or(0) + 1;
        *version = next.to_string();
        let entry = PolicyChangeLogEntry {
            kind: "bundle_reload".into(),
            version: version.clone(),
            actor: actor.to_string(),
            content_hash: hash,
        };
        self.change_log.write().push(entry.clone());
        tracing::info!(version = %entry.version, actor, "policy bundle reloaded");
        Ok(entry)
    }

    pub fn change_log(&self) -> Vec<PolicyChangeLogEntry> {
        self.change_log.read().clone()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sark_domain::{PrincipalKind, ProtocolKind, Sensitivity};

    struct AllowAll;
    impl DecisionPlugin for AllowAll {
        fn name(&self) -> &str {
            "allow_all"
        }
        fn evaluate(&self, input: &PolicyInput<'_>) -> Option<Decision> {
            Some(Decision {
                allow: true,
                reason: "ok".into(),
                filtered_parameters: Vec::new(),
                cache_ttl_secs: input.capability.sensitivity.cache_ttl_secs(),
                policy_version: None,
            })
        }
    }

    struct DenyAll;
    impl DecisionPlugin for DenyAll {
        fn name(&self) -> &str {
            "deny_all"
        }
        fn priority(&self) -> i32 {
            100
        }
        fn evaluate(&self, _input: &PolicyInput<'_>) -> Option<Decision> {
            Some(Decision {
                allow: false,
                reason: "denied by policy".into(),
                filtered_parameters: Vec::new(),
                cache_ttl_secs: 0,
                policy_version: None,
            })
        }
    }

    fn sample_input<'a>(
        request: &'a InvocationRequest,
        resource: &'a Resource,
        capability: &'a Capability,
    ) -> PolicyInput<'a> {
        PolicyInput { request, resource, capability }
    }

    fn fixtures() -> (InvocationRequest, Resource, Capability) {
        let request = InvocationRequest {
            request_id: "r1".into(),
            principal: sark_domain::Principal::new("p", PrincipalKind::ApiKey),
            resource_id: "res".into(),
            capability_id: "cap".into(),
            arguments: serde_json::json!({}),
            context: serde_json::json!({}),
        };
        let resource = Resource {
            id: "res".into(),
            protocol: ProtocolKind::Http,
            endpoint: "https://example.test".into(),
            metadata: serde_json::json!({}),
        };
        let capability = Capability {
            id: "cap".into(),
            resource_id: "res".into(),
            name: "do_thing".into(),
            sensitivity: Sensitivity::Medium,
            metadata: serde_json::json!({}),
        };
        (request, resource, capability)
    }

    #[test]
    fn duplicate_plugin_name_rejected() {
        let engine = PolicyEngine::new(SandboxConfig::default());
        engine.register(Box::new(AllowAll)).unwrap();
        let err = engine.register(Box::new(AllowAll)).unwrap_err();
        assert!(matches!(err, PolicyEngineError::DuplicatePlugin(_)));
    }

    #[tokio::test]
    async fn deny_short_circuits_allow() {
        let engine = PolicyEngine::new(SandboxConfig::default());
        engine.register(Box::new(AllowAll)).unwrap();
        engine.register(Box::new(DenyAll)).unwrap();
        let (request, resource, capability) = fixtures();
        let decision = engine.evaluate(&sample_input(&request, &resource, &capability)).await;
        assert!(!decision.allow);
        assert_eq!(decision.reason, "denied by policy");
    }

    #[tokio::test]
    async fn no_plugins_registered_denies_closed() {
        let engine = PolicyEngine::new(SandboxConfig::default());
        let (request, resource, capability) = fixtures();
        let decision = engine.evaluate(&sample_input(&request, &resource, &capability)).await;
        assert!(!decision.allow);
    }

    #[test]
    fn reload_bundle_bumps_version() {
        let engine = PolicyEngine::new(SandboxConfig::default());
        let first = engine.reload_bundle("admin", "package main\nallow = true\n").unwrap();
        assert_eq!(first.version, "1");
        let second = engine.reload_bundle("admin", "package main\nallow = false\n").unwrap();
        assert_eq!(second.version, "2");
        assert_eq!(engine.change_log().len(), 2);
    }

    #[test]
    fn reload_bundle_rejects_forbidden_source() {
        let engine = PolicyEngine::new(SandboxConfig::default());
        let err = engine.reload_bundle("admin", "import subprocess\nsubprocess.run(['ls'])\n").unwrap_err();
        assert!(err.kind.contains("forbidden construct"));
        assert!(engine.change_log().is_empty());
    }
}
