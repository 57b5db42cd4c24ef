use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for streaming invocation results.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// One chunk of a streaming invocation.
///
/// Every chunk carries a monotonically increasing `sequence` (starting at 0)
/// and a `terminal` flag; exactly one chunk in a stream has `terminal: true`,
/// and no chunk is emitted after it. Consumers may cancel mid-stream —
/// adapters must treat stream-receiver drop as a cancellation signal, not
/// an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub sequence: u64,
    pub terminal: bool,
    #[serde(flatten)]
    pub event: StreamEvent,
}

/// Payload of a single streamed chunk (protocol-agnostic).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A text/data token chunk.
    #[serde(rename = "token")]
    Token { data: String },

    /// Structured partial result (e.g. a tool-call fragment).
    #[serde(rename = "delta")]
    Delta { payload: serde_json::Value },

    /// Stream completed successfully.
    #[serde(rename = "done")]
    Done { usage: Option<Usage> },

    /// Stream failed; this is always the terminal chunk when present.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Token/unit usage for a completed invocation, used for cost attribution.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Usage {
    pub input_units: u64,
    pub output_units: u64,
    pub total_units: u64,
}
