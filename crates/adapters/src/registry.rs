//! Adapter registry and the governance decorator wrapping every adapter
//! with retry, circuit-breaking, and a per-adapter rate limit before it
//! ever reaches adapter-specific transport code.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use sark_domain::{BoxStream, Capability, InvocationRequest, InvocationResult, Resource, StreamChunk};
use sark_domain::config::RateLimitConfig;
use sark_ratelimit::RateLimiter;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::AdapterError;
use crate::retry::{retry, RetryConfig};
use crate::traits::{AdapterResult, ProtocolAdapter};

/// Wraps a concrete [`ProtocolAdapter`] with the cross-cutting governance
/// every protocol gets uniformly: retry with backoff, a circuit breaker,
/// and a per-adapter rate limit. Concrete adapters only implement
/// protocol-specific wire logic; this struct is what the registry hands
/// back out.
pub struct GovernedAdapter {
    inner: Arc<dyn ProtocolAdapter>,
    breaker: CircuitBreaker,
    retry_config: RetryConfig,
    limiter: RateLimiter,
}

impl GovernedAdapter {
    pub fn new(
        inner: Arc<dyn ProtocolAdapter>,
        circuit_config: CircuitBreakerConfig,
        retry_config: RetryConfig,
        per_adapter_rate_limit: u64,
    ) -> Self {
        let name = inner.name().to_string();
        let limiter = RateLimiter::new(RateLimitConfig {
            default_limit: per_adapter_rate_limit,
            window_secs: 1,
            overrides: HashMap::new(),
            admin_bypass: Vec::new(),
        });
        Self {
            breaker: CircuitBreaker::new(name, circuit_config),
            inner,
            retry_config,
            limiter,
        }
    }

    fn check_governance(&self) -> AdapterResult<()> {
        self.breaker.before_call().map_err(|_| AdapterError::CircuitOpen {
            adapter: self.inner.name().to_string(),
            retry_after_secs: self.retry_config.backoff_max.as_secs(),
        })?;
        let decision = self.limiter.check(self.inner.name());
        if !decision.allowed {
            return Err(AdapterError::Connection {
                adapter: self.inner.name().to_string(),
                message: "per-adapter rate limit exceeded".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProtocolAdapter for GovernedAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn discover_resources(&self) -> AdapterResult<Vec<Resource>> {
        self.check_governance()?;
        let inner = &self.inner;
        let result = retry(&self.retry_config, || inner.discover_resources()).await;
        self.record(&result);
        result
    }

    async fn get_capabilities(&self, resource: &Resource) -> AdapterResult<Vec<Capability>> {
        self.check_governance()?;
        let inner = &self.inner;
        let result = retry(&self.retry_config, || inner.get_capabilities(resource)).await;
        self.record(&result);
        result
    }

    async fn validate_request(
        &self,
        capability: &Capability,
        request: &InvocationRequest,
    ) -> AdapterResult<()> {
        self.inner.validate_request(capability, request).await
    }

    async fn invoke(
        &self,
        resource: &Resource,
        capability: &Capability,
        request: &InvocationRequest,
    ) -> AdapterResult<InvocationResult> {
        self.check_governance()?;
        let inner = &self.inner;
        let result = retry(&self.retry_config, || inner.invoke(resource, capability, request)).await;
        self.record(&result);
        result
    }

    async fn invoke_streaming(
        &self,
        resource: &Resource,
        capability: &Capability,
        request: &InvocationRequest,
    ) -> AdapterResult<BoxStream<StreamChunk>> {
        self.check_governance()?;
        // Streaming results can't be retried transparently once the first
        // chunk is in flight, so only the initial handshake is retried.
        let inner = &self.inner;
        let result = retry(&self.retry_config, || inner.invoke_streaming(resource, capability, request)).await;
        self.record(&result);
        result
    }

    async fn health_check(&self) -> AdapterResult<()> {
        let result = self.inner.health_check().await;
        self.record(&result);
        result
    }

    async fn on_resource_unregistered(&self, resource: &Resource) {
        self.inner.on_resource_unregistered(resource).await;
    }
}

impl GovernedAdapter {
    fn record<T>(&self, result: &AdapterResult<T>) {
        match result {
            Ok(_) => self.breaker.record_success(),
            Err(err) if err.is_retryable() => self.breaker.record_failure(),
            Err(_) => {}
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("an adapter named '{0}' is already registered")]
    DuplicateAdapter(String),
    #[error("no adapter registered for protocol '{0}'")]
    Unknown(String),
}

/// Holds one governed adapter per protocol name and serves as the
/// gateway's single point of adapter lookup.
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<GovernedAdapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self { adapters: RwLock::new(HashMap::new()) }
    }

    pub fn register(&self, adapter: GovernedAdapter) -> Result<(), RegistryError> {
        let name = adapter.name().to_string();
        let mut adapters = self.adapters.write();
        if adapters.contains_key(&name) {
            return Err(RegistryError::DuplicateAdapter(name));
        }
        adapters.insert(name, Arc::new(adapter));
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.adapters.write().remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Result<Arc<GovernedAdapter>, RegistryError> {
        self.adapters
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.read().keys().cloned().collect()
    }

    /// Runs a health check against every registered adapter, returning the
    /// subset that failed. Used at startup and by the health endpoint.
    pub async fn initialize(&self) -> Vec<(String, AdapterError)> {
        let snapshot: Vec<_> = self.adapters.read().values().cloned().collect();
        let mut failures = Vec::new();
        for adapter in snapshot {
            if let Err(err) = adapter.health_check().await {
                failures.push((adapter.name().to_string(), err));
            }
        }
        failures
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sark_domain::ProtocolKind;

    struct StubAdapter {
        name: String,
        fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ProtocolAdapter for StubAdapter {
        fn name(&self) -> &str {
            &self.name
        }
        async fn discover_resources(&self) -> AdapterResult<Vec<Resource>> {
            Ok(Vec::new())
        }
        async fn get_capabilities(&self, _resource: &Resource) -> AdapterResult<Vec<Capability>> {
            Ok(Vec::new())
        }
        async fn validate_request(
            &self,
            _capability: &Capability,
            _request: &InvocationRequest,
        ) -> AdapterResult<()> {
            Ok(())
        }
        async fn invoke(
            &self,
            _resource: &Resource,
            _capability: &Capability,
            _request: &InvocationRequest,
        ) -> AdapterResult<InvocationResult> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                Err(AdapterError::Connection { adapter: self.name.clone(), message: "down".into() })
            } else {
                Ok(InvocationResult {
                    success: true,
                    data: serde_json::json!({}),
                    metadata: serde_json::json!({}),
                    usage: None,
                    error: None,
                })
            }
        }
        async fn invoke_streaming(
            &self,
            _resource: &Resource,
            _capability: &Capability,
            _request: &InvocationRequest,
        ) -> AdapterResult<BoxStream<StreamChunk>> {
            Err(AdapterError::UnsupportedOperation { adapter: self.name.clone(), operation: "stream".into() })
        }
        async fn health_check(&self) -> AdapterResult<()> {
            Ok(())
        }
    }

    fn fixtures() -> (Resource, Capability, InvocationRequest) {
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
            sensitivity: sark_domain::Sensitivity::Low,
            metadata: serde_json::json!({}),
        };
        let request = InvocationRequest {
            request_id: "r1".into(),
            principal: sark_domain::Principal::new("p", sark_domain::PrincipalKind::ApiKey),
            resource_id: "res".into(),
            capability_id: "cap".into(),
            arguments: serde_json::json!({}),
            context: serde_json::json!({}),
        };
        (resource, capability, request)
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = AdapterRegistry::new();
        let stub = Arc::new(StubAdapter { name: "http".into(), fail: std::sync::atomic::AtomicBool::new(false) });
        let governed = GovernedAdapter::new(stub.clone(), CircuitBreakerConfig::default(), RetryConfig::default(), 1000);
        registry.register(governed).unwrap();
        let governed2 = GovernedAdapter::new(stub, CircuitBreakerConfig::default(), RetryConfig::default(), 1000);
        assert!(matches!(registry.register(governed2), Err(RegistryError::DuplicateAdapter(_))));
    }

    #[tokio::test]
    async fn failures_trip_the_breaker_and_block_further_calls() {
        let stub = Arc::new(StubAdapter { name: "http".into(), fail: std::sync::atomic::AtomicBool::new(true) });
        let governed = GovernedAdapter::new(
            stub,
            CircuitBreakerConfig { failure_threshold: 1, success_threshold: 1, cooldown: std::time::Duration::from_secs(60) },
            RetryConfig { max_attempts: 1, backoff_base: 1.0, backoff_max: std::time::Duration::from_millis(1) },
            1000,
        );
        let (resource, capability, request) = fixtures();
        assert!(governed.invoke(&resource, &capability, &request).await.is_err());
        let second = governed.invoke(&resource, &capability, &request).await;
        assert!(matches!(second, Err(AdapterError::CircuitOpen { .. })));
    }
}
