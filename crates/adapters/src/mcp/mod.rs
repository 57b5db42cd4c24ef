pub mod adapter;
pub mod protocol;
pub mod transport;

pub use adapter::{McpAdapter, McpServerConfig};
pub use transport::{McpTransport, SseTransport, StdioTransport, TransportError};
