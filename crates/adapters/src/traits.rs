//! The uniform contract every protocol adapter (MCP, HTTP, gRPC) implements,
//! so the gateway core never special-cases a protocol.

use async_trait::async_trait;
use sark_domain::{BoxStream, Capability, InvocationRequest, InvocationResult, Resource, StreamChunk};

use crate::error::AdapterError;

pub type AdapterResult<T> = Result<T, AdapterError>;

#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Stable identifier, used in logs, metrics, and error messages.
    fn name(&self) -> &str;

    /// Enumerate the resources currently reachable through this adapter.
    async fn discover_resources(&self) -> AdapterResult<Vec<Resource>>;

    /// List the capabilities a given resource exposes.
    async fn get_capabilities(&self, resource: &Resource) -> AdapterResult<Vec<Capability>>;

    /// Structural validation of a request's arguments against the
    /// capability's declared schema, before any policy evaluation runs.
    async fn validate_request(
        &self,
        capability: &Capability,
        request: &InvocationRequest,
    ) -> AdapterResult<()>;

    /// Perform a single, non-streaming invocation.
    async fn invoke(
        &self,
        resource: &Resource,
        capability: &Capability,
        request: &InvocationRequest,
    ) -> AdapterResult<InvocationResult>;

    /// Perform a streaming invocation. Adapters that cannot stream should
    /// return `AdapterError::UnsupportedOperation`.
    async fn invoke_streaming(
        &self,
        resource: &Resource,
        capability: &Capability,
        request: &InvocationRequest,
    ) -> AdapterResult<BoxStream<StreamChunk>>;

    /// Liveness/readiness probe used by the circuit breaker's half-open
    /// trial and by the gateway's own health endpoint.
    async fn health_check(&self) -> AdapterResult<()>;

    /// Called when a resource is deregistered, to let the adapter release
    /// any per-resource connection state. Default is a no-op.
    async fn on_resource_unregistered(&self, _resource: &Resource) {}
}
