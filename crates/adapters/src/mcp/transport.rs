//! Stdio transport for a child-process MCP server, adapted from the
//! teacher's `crates/mcp-client/src/transport.rs`: newline-delimited
//! JSON-RPC over stdin/stdout with a request-serializing lock.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;

use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

const MAX_SKIP_LINES: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to spawn MCP server process: {0}")]
    Spawn(String),
    #[error("transport I/O error: {0}")]
    Io(String),
    #[error("server returned malformed JSON-RPC: {0}")]
    MalformedResponse(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("server process exited")]
    ProcessExited,
    #[error("operation unsupported by this transport")]
    Unsupported,
}

#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn send_request(&self, method: &str, params: Option<serde_json::Value>) -> Result<serde_json::Value, TransportError>;
    async fn send_notification(&self, method: &str, params: Option<serde_json::Value>) -> Result<(), TransportError>;
    async fn is_alive(&self) -> bool;
    async fn shutdown(&self) -> Result<(), TransportError>;
}

pub struct StdioTransport {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<tokio::process::ChildStdout>>,
    request_lock: Mutex<()>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl StdioTransport {
    pub async fn spawn(command: &str, args: &[String], timeout: Duration) -> Result<Self, TransportError> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        let stdin = child.stdin.take().ok_or_else(|| TransportError::Spawn("no stdin".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| TransportError::Spawn("no stdout".into()))?;

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            request_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
            timeout,
        })
    }

    async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await.map_err(|e| TransportError::Io(e.to_string()))?;
        stdin.write_all(b"\n").await.map_err(|e| TransportError::Io(e.to_string()))?;
        stdin.flush().await.map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn read_response(&self, expected_id: u64) -> Result<JsonRpcResponse, TransportError> {
        let mut stdout = self.stdout.lock().await;
        for _ in 0..MAX_SKIP_LINES {
            let mut buf = String::new();
            let n = stdout.read_line(&mut buf).await.map_err(|e| TransportError::Io(e.to_string()))?;
            if n == 0 {
                return Err(TransportError::ProcessExited);
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(response) if response.id == Some(expected_id) => return Ok(response),
                Ok(_) => continue,
                Err(_) => continue,
            }
        }
        Err(TransportError::MalformedResponse("too many unmatched lines".into()))
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send_request(&self, method: &str, params: Option<serde_json::Value>) -> Result<serde_json::Value, TransportError> {
        let _guard = self.request_lock.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let line = serde_json::to_string(&request).map_err(|e| TransportError::Io(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, async {
            self.write_line(&line).await?;
            self.read_response(id).await
        })
        .await
        .map_err(|_| TransportError::Timeout(self.timeout))??;

        if let Some(error) = response.error {
            return Err(TransportError::MalformedResponse(format!("{}: {}", error.code, error.message)));
        }
        response.result.ok_or_else(|| TransportError::MalformedResponse("missing result".into()))
    }

    async fn send_notification(&self, method: &str, params: Option<serde_json::Value>) -> Result<(), TransportError> {
        let notification = JsonRpcNotification::new(method, params);
        let line = serde_json::to_string(&notification).map_err(|e| TransportError::Io(e.to_string()))?;
        self.write_line(&line).await
    }

    async fn is_alive(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        let mut child = self.child.lock().await;
        if let Err(e) = child.start_kill() {
            return Err(TransportError::Io(e.to_string()));
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
        Ok(())
    }
}

/// SSE transport is not implemented: every method returns `Unsupported`.
/// Kept as an explicit placeholder so `ProtocolKind::Mcp` resources
/// declaring an `sse` transport fail with a clear, typed error rather
/// than silently falling back to stdio.
pub struct SseTransport;

#[async_trait]
impl McpTransport for SseTransport {
    async fn send_request(&self, _method: &str, _params: Option<serde_json::Value>) -> Result<serde_json::Value, TransportError> {
        Err(TransportError::Unsupported)
    }
    async fn send_notification(&self, _method: &str, _params: Option<serde_json::Value>) -> Result<(), TransportError> {
        Err(TransportError::Unsupported)
    }
    async fn is_alive(&self) -> bool {
        false
    }
    async fn shutdown(&self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported)
    }
}
