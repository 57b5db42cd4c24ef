pub mod auth;
pub mod circuit_breaker;
pub mod error;
pub mod grpc;
pub mod http;
pub mod mcp;
pub mod registry;
pub mod retry;
pub mod traits;

pub use auth::AuthRotator;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use error::AdapterError;
pub use grpc::GrpcAdapter;
pub use http::HttpAdapter;
pub use mcp::{McpAdapter, McpServerConfig};
pub use registry::{AdapterRegistry, GovernedAdapter, RegistryError};
pub use retry::{retry as retry_with_backoff, RetryConfig};
pub use traits::{AdapterResult, ProtocolAdapter};
