/// Shared error taxonomy used across all SARK crates.
///
/// Each variant carries only structured, already-redacted detail — never a
/// raw downstream payload. `AdapterError` (in `sark-adapters`) is folded
/// into `Adapter*` here once an invocation crosses the gateway boundary.
#[derive(thiserror::Error, Debug)]
pub enum SarkError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("authorization denied: {0}")]
    Authorization(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("budget exceeded: {reason}")]
    BudgetExceeded { reason: String },

    #[error("adapter connection error ({adapter}): {message}")]
    AdapterConnection { adapter: String, message: String },

    #[error("adapter timeout ({adapter}) after {timeout_secs}s")]
    AdapterTimeout { adapter: String, timeout_secs: f64 },

    #[error("adapter protocol error ({adapter}): {message}")]
    AdapterProtocol { adapter: String, message: String },

    #[error("circuit open for {target}, retry after {retry_after_secs}s")]
    CircuitOpen { target: String, retry_after_secs: u64 },

    #[error("sandbox violation: {kind}")]
    SandboxViolation { kind: String },

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SarkError {
    /// Stable machine-readable tag, used in audit events and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            SarkError::Authentication(_) => "authentication_error",
            SarkError::Authorization(_) => "authorization_error",
            SarkError::Validation(_) => "validation_error",
            SarkError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            SarkError::BudgetExceeded { .. } => "budget_exceeded",
            SarkError::AdapterConnection { .. } => "adapter_connection_error",
            SarkError::AdapterTimeout { .. } => "adapter_timeout_error",
            SarkError::AdapterProtocol { .. } => "adapter_protocol_error",
            SarkError::CircuitOpen { .. } => "circuit_open",
            SarkError::SandboxViolation { .. } => "sandbox_violation",
            SarkError::Io(_) => "internal_error",
            SarkError::Json(_) => "internal_error",
            SarkError::Config(_) => "internal_error",
            SarkError::Internal(_) => "internal_error",
        }
    }

    /// Whether this error class should fail the request closed (deny) rather
    /// than open (allow with a warning). See the fail-open/fail-closed matrix.
    pub fn is_fail_closed(&self) -> bool {
        matches!(
            self,
            SarkError::Authentication(_)
                | SarkError::Authorization(_)
                | SarkError::Validation(_)
                | SarkError::SandboxViolation { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SarkError>;
