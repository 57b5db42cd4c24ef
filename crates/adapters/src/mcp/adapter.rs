//! MCP protocol adapter: one configured child-process server per resource,
//! the initialize/tools-list/tools-call handshake adapted from the
//! teacher's `crates/mcp-client/src/manager.rs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use sark_domain::{BoxStream, Capability, InvocationRequest, InvocationResult, ProtocolKind, Resource, Sensitivity, StreamChunk};

use super::protocol::{ClientInfo, InitializeParams, ToolCallResult, ToolsListResult};
use super::transport::{McpTransport, StdioTransport};
use crate::error::AdapterError;
use crate::traits::{AdapterResult, ProtocolAdapter};

#[derive(Debug, Clone)]
pub struct McpServerConfig {
    pub resource_id: String,
    pub command: String,
    pub args: Vec<String>,
    pub request_timeout: Duration,
}

fn protocol_err(resource_id: &str, err: impl std::fmt::Display) -> AdapterError {
    AdapterError::Protocol { adapter: format!("mcp:{resource_id}"), message: err.to_string() }
}

/// Manages one MCP child-process server per configured resource,
/// spawning lazily on first use and reusing the connection afterward.
pub struct McpAdapter {
    servers: Vec<McpServerConfig>,
    transports: RwLock<HashMap<String, Arc<dyn McpTransport>>>,
}

impl McpAdapter {
    pub fn new(servers: Vec<McpServerConfig>) -> Self {
        Self { servers, transports: RwLock::new(HashMap::new()) }
    }

    fn config_for(&self, resource_id: &str) -> AdapterResult<&McpServerConfig> {
        self.servers
            .iter()
            .find(|s| s.resource_id == resource_id)
            .ok_or_else(|| AdapterError::ResourceNotFound { adapter: self.name().to_string(), resource_id: resource_id.to_string() })
    }

    async fn transport_for(&self, resource_id: &str) -> AdapterResult<Arc<dyn McpTransport>> {
        if let Some(existing) = self.transports.read().get(resource_id).cloned() {
            if existing.is_alive().await {
                return Ok(existing);
            }
        }

        let config = self.config_for(resource_id)?;
        let transport = StdioTransport::spawn(&config.command, &config.args, config.request_timeout)
            .await
            .map_err(|e| AdapterError::Connection { adapter: self.name().to_string(), message: e.to_string() })?;

        let init_params = InitializeParams {
            protocol_version: "2024-11-05".into(),
            capabilities: serde_json::json!({}),
            client_info: ClientInfo { name: "sark-gateway".into(), version: env!("CARGO_PKG_VERSION").into() },
        };
        transport
            .send_request("initialize", Some(serde_json::to_value(init_params).unwrap()))
            .await
            .map_err(|e| protocol_err(resource_id, e))?;
        transport
            .send_notification("notifications/initialized", None)
            .await
            .map_err(|e| protocol_err(resource_id, e))?;

        let transport: Arc<dyn McpTransport> = Arc::new(transport);
        self.transports.write().insert(resource_id.to_string(), transport.clone());
        Ok(transport)
    }
}

#[async_trait]
impl ProtocolAdapter for McpAdapter {
    fn name(&self) -> &str {
        "mcp"
    }

    async fn discover_resources(&self) -> AdapterResult<Vec<Resource>> {
        Ok(self
            .servers
            .iter()
            .map(|s| Resource {
                id: s.resource_id.clone(),
                protocol: ProtocolKind::Mcp,
                endpoint: s.command.clone(),
                metadata: serde_json::json!({}),
            })
            .collect())
    }

    async fn get_capabilities(&self, resource: &Resource) -> AdapterResult<Vec<Capability>> {
        let transport = self.transport_for(&resource.id).await?;
        let raw = transport
            .send_request("tools/list", None)
            .await
            .map_err(|e| protocol_err(&resource.id, e))?;
        let parsed: ToolsListResult = serde_json::from_value(raw).map_err(|e| protocol_err(&resource.id, e))?;
        Ok(parsed
            .tools
            .into_iter()
            .map(|tool| Capability {
                id: tool.name.clone(),
                resource_id: resource.id.clone(),
                name: tool.name,
                sensitivity: Sensitivity::Medium,
                metadata: tool.input_schema,
            })
            .collect())
    }

    async fn validate_request(&self, _capability: &Capability, _request: &InvocationRequest) -> AdapterResult<()> {
        Ok(())
    }

    async fn invoke(
        &self,
        resource: &Resource,
        capability: &Capability,
        request: &InvocationRequest,
    ) -> AdapterResult<InvocationResult> {
        let transport = self.transport_for(&resource.id).await?;
        let params = serde_json::json!({
            "name": capability.name,
            "arguments": request.arguments,
        });
        let raw = transport
            .send_request("tools/call", Some(params))
            .await
            .map_err(|e| AdapterError::Invocation {
                adapter: self.name().to_string(),
                capability: capability.name.clone(),
                message: e.to_string(),
            })?;
        let parsed: ToolCallResult = serde_json::from_value(raw).map_err(|e| protocol_err(&resource.id, e))?;
        let text = parsed
            .content
            .iter()
            .filter_map(|c| c.text.clone())
            .collect::<Vec<_>>()
            .join("");

        Ok(InvocationResult {
            success: !parsed.is_error,
            data: serde_json::json!({ "text": text }),
            metadata: serde_json::json!({}),
            usage: None,
            error: if parsed.is_error { Some(text) } else { None },
        })
    }

    async fn invoke_streaming(
        &self,
        _resource: &Resource,
        _capability: &Capability,
        _request: &InvocationRequest,
    ) -> AdapterResult<BoxStream<StreamChunk>> {
        Err(AdapterError::UnsupportedOperation { adapter: self.name().to_string(), operation: "invoke_streaming".into() })
    }

    async fn health_check(&self) -> AdapterResult<()> {
        for config in &self.servers {
            self.transport_for(&config.resource_id).await?;
        }
        Ok(())
    }

    async fn on_resource_unregistered(&self, resource: &Resource) {
        if let Some(transport) = self.transports.write().remove(&resource.id) {
            let _ = transport.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discover_resources_reflects_configured_servers() {
        let adapter = McpAdapter::new(vec![McpServerConfig {
            resource_id: "fs".into(),
            command: "mcp-fs-server".into(),
            args: vec![],
            request_timeout: Duration::from_secs(5),
        }]);
        let resources = adapter.discover_resources().await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "fs");
    }

    #[tokio::test]
    async fn unknown_resource_returns_not_found() {
        let adapter = McpAdapter::new(vec![]);
        let resource = Resource {
            id: "missing".into(),
            protocol: ProtocolKind::Mcp,
            endpoint: "".into(),
            metadata: serde_json::json!({}),
        };
        let err = adapter.get_capabilities(&resource).await.unwrap_err();
        assert!(matches!(err, AdapterError::ResourceNotFound { .. }));
    }
}
