//! HTTP protocol adapter: resources are plain REST endpoints that publish
//! a capability manifest and accept JSON invocations.

use async_trait::async_trait;
use reqwest::Client;
use sark_domain::{BoxStream, Capability, InvocationRequest, InvocationResult, Resource, Sensitivity, StreamChunk};
use std::time::Duration;

use crate::error::AdapterError;
use crate::traits::{AdapterResult, ProtocolAdapter};

#[derive(Debug, Clone, serde::Deserialize)]
struct CapabilityManifestEntry {
    name: String,
    #[serde(default)]
    sensitivity: Option<String>,
    #[serde(default)]
    metadata: serde_json::Value,
}

fn parse_sensitivity(raw: Option<&str>) -> Sensitivity {
    match raw {
        Some("low") => Sensitivity::Low,
        Some("high") => Sensitivity::High,
        Some("critical") => Sensitivity::Critical,
        _ => Sensitivity::Medium,
    }
}

pub struct HttpAdapter {
    client: Client,
    resources: Vec<Resource>,
    request_timeout: Duration,
}

impl HttpAdapter {
    pub fn new(resources: Vec<Resource>, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client must build");
        Self { client, resources, request_timeout }
    }

    fn resource(&self, resource_id: &str) -> AdapterResult<&Resource> {
        self.resources
            .iter()
            .find(|r| r.id == resource_id)
            .ok_or_else(|| AdapterError::ResourceNotFound { adapter: self.name().to_string(), resource_id: resource_id.to_string() })
    }
}

#[async_trait]
impl ProtocolAdapter for HttpAdapter {
    fn name(&self) -> &str {
        "http"
    }

    async fn discover_resources(&self) -> AdapterResult<Vec<Resource>> {
        Ok(self.resources.clone())
    }

    async fn get_capabilities(&self, resource: &Resource) -> AdapterResult<Vec<Capability>> {
        let response = self
            .client
            .get(format!("{}/capabilities", resource.endpoint.trim_end_matches('/')))
            .send()
            .await
            .map_err(|e| AdapterError::Connection { adapter: self.name().to_string(), message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(AdapterError::Protocol {
                adapter: self.name().to_string(),
                message: format!("capability manifest returned {}", response.status()),
            });
        }

        let entries: Vec<CapabilityManifestEntry> = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol { adapter: self.name().to_string(), message: e.to_string() })?;

        Ok(entries
            .into_iter()
            .map(|entry| Capability {
                id: entry.name.clone(),
                resource_id: resource.id.clone(),
                name: entry.name,
                sensitivity: parse_sensitivity(entry.sensitivity.as_deref()),
                metadata: entry.metadata,
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
        let url = format!("{}/{}", resource.endpoint.trim_end_matches('/'), capability.name);
        let response = self
            .client
            .post(url)
            .json(&request.arguments)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout { adapter: self.name().to_string(), timeout_secs: self.request_timeout.as_secs() }
                } else {
                    AdapterError::Connection { adapter: self.name().to_string(), message: e.to_string() }
                }
            })?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol { adapter: self.name().to_string(), message: e.to_string() })?;

        if !status.is_success() {
            return Err(AdapterError::Invocation {
                adapter: self.name().to_string(),
                capability: capability.name.clone(),
                message: format!("remote returned {status}: {body}"),
            });
        }

        Ok(InvocationResult {
            success: true,
            data: body.get("data").cloned().unwrap_or(body.clone()),
            metadata: body.get("metadata").cloned().unwrap_or(serde_json::json!({})),
            usage: None,
            error: None,
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
        for resource in &self.resources {
            self.client
                .get(resource.endpoint.clone())
                .send()
                .await
                .map_err(|e| AdapterError::Connection { adapter: self.name().to_string(), message: e.to_string() })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sark_domain::ProtocolKind;

    #[test]
    fn resource_lookup_rejects_unknown_id() {
        let adapter = HttpAdapter::new(vec![], Duration::from_secs(5));
        assert!(adapter.resource("missing").is_err());
    }

    #[test]
    fn sensitivity_parsing_defaults_to_medium() {
        assert_eq!(parse_sensitivity(None), Sensitivity::Medium);
        assert_eq!(parse_sensitivity(Some("critical")), Sensitivity::Critical);
    }

    #[tokio::test]
    async fn discover_resources_returns_configured_set() {
        let resource = Resource {
            id: "svc".into(),
            protocol: ProtocolKind::Http,
            endpoint: "https://example.test".into(),
            metadata: serde_json::json!({}),
        };
        let adapter = HttpAdapter::new(vec![resource], Duration::from_secs(5));
        let resources = adapter.discover_resources().await.unwrap();
        assert_eq!(resources.len(), 1);
    }
}
