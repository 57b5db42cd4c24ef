//! Adapter error hierarchy, flattened from the discovery / connection /
//! authentication / validation / invocation / timeout / protocol /
//! streaming / configuration error classes the original adapter layer
//! distinguished, into one tagged enum with the same structured fields.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("discovery failed for adapter '{adapter}': {message}")]
    Discovery { adapter: String, message: String },

    #[error("connection to adapter '{adapter}' failed: {message}")]
    Connection { adapter: String, message: String },

    #[error("authentication with adapter '{adapter}' failed: {message}")]
    Authentication { adapter: String, message: String },

    #[error("request rejected by adapter '{adapter}': {message}")]
    Validation { adapter: String, message: String },

    #[error("invocation of '{capability}' on adapter '{adapter}' failed: {message}")]
    Invocation {
        adapter: String,
        capability: String,
        message: String,
    },

    #[error("resource '{resource_id}' not found on adapter '{adapter}'")]
    ResourceNotFound { adapter: String, resource_id: String },

    #[error("capability '{capability_id}' not found on resource '{resource_id}'")]
    CapabilityNotFound {
        resource_id: String,
        capability_id: String,
    },

    #[error("adapter '{adapter}' timed out after {timeout_secs}s")]
    Timeout { adapter: String, timeout_secs: u64 },

    #[error("protocol error from adapter '{adapter}': {message}")]
    Protocol { adapter: String, message: String },

    #[error("streaming from adapter '{adapter}' failed: {message}")]
    Streaming { adapter: String, message: String },

    #[error("adapter '{adapter}' misconfigured: {message}")]
    Configuration { adapter: String, message: String },

    #[error("adapter '{adapter}' does not support operation '{operation}'")]
    UnsupportedOperation { adapter: String, operation: String },

    #[error("circuit open for adapter '{adapter}', retry after {retry_after_secs}s")]
    CircuitOpen { adapter: String, retry_after_secs: u64 },
}

impl AdapterError {
    /// Machine-readable tag, mirrored into audit events and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Discovery { .. } => "discovery",
            Self::Connection { .. } => "connection",
            Self::Authentication { .. } => "authentication",
            Self::Validation { .. } => "validation",
            Self::Invocation { .. } => "invocation",
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::CapabilityNotFound { .. } => "capability_not_found",
            Self::Timeout { .. } => "timeout",
            Self::Protocol { .. } => "protocol",
            Self::Streaming { .. } => "streaming",
            Self::Configuration { .. } => "configuration",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::CircuitOpen { .. } => "circuit_open",
        }
    }

    /// Whether a retry handler should retry this error class. Validation,
    /// authentication, configuration and not-found errors are permanent;
    /// connection/timeout/protocol errors are typically transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::Protocol { .. }
        )
    }

    pub fn adapter(&self) -> &str {
        match self {
            Self::Discovery { adapter, .. }
            | Self::Connection { adapter, .. }
            | Self::Authentication { adapter, .. }
            | Self::Validation { adapter, .. }
            | Self::Invocation { adapter, .. }
            | Self::ResourceNotFound { adapter, .. }
            | Self::Timeout { adapter, .. }
            | Self::Protocol { adapter, .. }
            | Self::Streaming { adapter, .. }
            | Self::Configuration { adapter, .. }
            | Self::UnsupportedOperation { adapter, .. }
            | Self::CircuitOpen { adapter, .. } => adapter,
            Self::CapabilityNotFound { .. } => "unknown",
        }
    }
}

impl From<AdapterError> for sark_domain::SarkError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Connection { adapter, message } => {
                sark_domain::SarkError::AdapterConnection { adapter, message }
            }
            AdapterError::Timeout { adapter, timeout_secs } => {
                sark_domain::SarkError::AdapterTimeout { adapter, timeout_secs }
            }
            AdapterError::CircuitOpen { adapter, retry_after_secs } => {
                sark_domain::SarkError::CircuitOpen { target: adapter, retry_after_secs }
            }
            other => sark_domain::SarkError::AdapterProtocol {
                adapter: other.adapter().to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_are_retryable() {
        let err = AdapterError::Connection {
            adapter: "a".into(),
            message: "refused".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "connection");
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        let err = AdapterError::Validation {
            adapter: "a".into(),
            message: "bad args".into(),
        };
        assert!(!err.is_retryable());
    }
}
