//! gRPC protocol adapter. Resources are arbitrary gRPC services; since the
//! gateway has no compile-time knowledge of their `.proto` schemas,
//! invocations are forwarded as opaque, already-serialized protobuf bytes
//! (hex-encoded in the request/response JSON envelope) rather than typed
//! messages — a generic passthrough codec, the same shape the teacher's
//! HTTP-proxying adapters use for opaque payloads.

use std::time::Duration;

use async_trait::async_trait;
use sark_domain::{BoxStream, Capability, InvocationRequest, InvocationResult, Resource, Sensitivity, StreamChunk};
use tonic::client::Grpc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::transport::Channel;
use tonic::Status;

use crate::error::AdapterError;
use crate::traits::{AdapterResult, ProtocolAdapter};

#[derive(Debug, Clone, Default)]
struct BytesPayload(Vec<u8>);

#[derive(Debug, Clone, Default)]
struct PassthroughCodec;

#[derive(Debug, Clone, Default)]
struct PassthroughEncoder;

#[derive(Debug, Clone, Default)]
struct PassthroughDecoder;

impl Encoder for PassthroughEncoder {
    type Item = BytesPayload;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put_slice(&item.0);
        Ok(())
    }
}

impl Decoder for PassthroughDecoder {
    type Item = BytesPayload;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let remaining = src.remaining();
        let mut buf = vec![0u8; remaining];
        src.copy_to_slice(&mut buf);
        Ok(Some(BytesPayload(buf)))
    }
}

impl Codec for PassthroughCodec {
    type Encode = BytesPayload;
    type Decode = BytesPayload;
    type Encoder = PassthroughEncoder;
    type Decoder = PassthroughDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        PassthroughEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        PassthroughDecoder
    }
}

pub struct GrpcAdapter {
    resources: Vec<Resource>,
    connect_timeout: Duration,
}

impl GrpcAdapter {
    pub fn new(resources: Vec<Resource>, connect_timeout: Duration) -> Self {
        Self { resources, connect_timeout }
    }

    fn resource(&self, resource_id: &str) -> AdapterResult<&Resource> {
        self.resources
            .iter()
            .find(|r| r.id == resource_id)
            .ok_or_else(|| AdapterError::ResourceNotFound { adapter: self.name().to_string(), resource_id: resource_id.to_string() })
    }

    async fn channel_for(&self, resource: &Resource) -> AdapterResult<Channel> {
        Channel::from_shared(resource.endpoint.clone())
            .map_err(|e| AdapterError::Configuration { adapter: self.name().to_string(), message: e.to_string() })?
            .connect_timeout(self.connect_timeout)
            .connect()
            .await
            .map_err(|e| AdapterError::Connection { adapter: self.name().to_string(), message: e.to_string() })
    }
}

#[async_trait]
impl ProtocolAdapter for GrpcAdapter {
    fn name(&self) -> &str {
        "grpc"
    }

    async fn discover_resources(&self) -> AdapterResult<Vec<Resource>> {
        Ok(self.resources.clone())
    }

    async fn get_capabilities(&self, resource: &Resource) -> AdapterResult<Vec<Capability>> {
        // No runtime reflection client is wired up; capabilities for gRPC
        // resources come from the resource's own metadata (a list of
        // fully-qualified method names), populated at registration time.
        let methods = resource
            .metadata
            .get("methods")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(methods
            .into_iter()
            .filter_map(|m| m.as_str().map(str::to_string))
            .map(|method| Capability {
                id: method.clone(),
                resource_id: resource.id.clone(),
                name: method,
                sensitivity: Sensitivity::Medium,
                metadata: serde_json::json!({}),
            })
            .collect())
    }

    async fn validate_request(&self, _capability: &Capability, request: &InvocationRequest) -> AdapterResult<()> {
        if request.arguments.get("payload_hex").and_then(|v| v.as_str()).is_none() {
            return Err(AdapterError::Validation {
                adapter: self.name().to_string(),
                message: "gRPC invocation requires a hex-encoded 'payload_hex' argument".into(),
            });
        }
        Ok(())
    }

    async fn invoke(
        &self,
        resource: &Resource,
        capability: &Capability,
        request: &InvocationRequest,
    ) -> AdapterResult<InvocationResult> {
        let payload_hex = request
            .arguments
            .get("payload_hex")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AdapterError::Validation { adapter: self.name().to_string(), message: "missing payload_hex".into() })?;
        let payload = hex::decode(payload_hex)
            .map_err(|e| AdapterError::Validation { adapter: self.name().to_string(), message: e.to_string() })?;

        let channel = self.channel_for(resource).await?;
        let mut client = Grpc::new(channel);
        client
            .ready()
            .await
            .map_err(|e| AdapterError::Connection { adapter: self.name().to_string(), message: e.to_string() })?;

        let path = http::uri::PathAndQuery::try_from(capability.name.clone())
            .map_err(|e| AdapterError::Configuration { adapter: self.name().to_string(), message: e.to_string() })?;

        let response = client
            .unary(tonic::Request::new(BytesPayload(payload)), path, PassthroughCodec)
            .await
            .map_err(|status| AdapterError::Invocation {
                adapter: self.name().to_string(),
                capability: capability.name.clone(),
                message: status.to_string(),
            })?;

        let body = response.into_inner();
        Ok(InvocationResult {
            success: true,
            data: serde_json::json!({ "payload_hex": hex::encode(body.0) }),
            metadata: serde_json::json!({}),
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
            self.channel_for(resource).await?;
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
        let adapter = GrpcAdapter::new(vec![], Duration::from_secs(5));
        assert!(adapter.resource("missing").is_err());
    }

    #[tokio::test]
    async fn validate_request_requires_payload_hex() {
        let adapter = GrpcAdapter::new(vec![], Duration::from_secs(5));
        let capability = Capability {
            id: "c".into(),
            resource_id: "r".into(),
            name: "/svc.Service/Method".into(),
            sensitivity: Sensitivity::Medium,
            metadata: serde_json::json!({}),
        };
        let request = InvocationRequest {
            request_id: "1".into(),
            principal: sark_domain::Principal::new("p", sark_domain::PrincipalKind::ApiKey),
            resource_id: "r".into(),
            capability_id: "c".into(),
            arguments: serde_json::json!({}),
            context: serde_json::json!({}),
        };
        assert!(adapter.validate_request(&capability, &request).await.is_err());
    }

    #[tokio::test]
    async fn get_capabilities_reads_resource_metadata() {
        let resource = Resource {
            id: "r".into(),
            protocol: ProtocolKind::Grpc,
            endpoint: "http://localhost:50051".into(),
            metadata: serde_json::json!({ "methods": ["/svc.Service/Method"] }),
        };
        let adapter = GrpcAdapter::new(vec![resource.clone()], Duration::from_secs(5));
        let caps = adapter.get_capabilities(&resource).await.unwrap();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].name, "/svc.Service/Method");
    }
}
