//! SIEM sink implementations (Splunk HEC, Datadog logs intake). Each sink
//! sends an already-gzipped batch body; callers apply retry/circuit
//! breaking around `send`, not the sink itself.

use async_trait::async_trait;
use reqwest::Client;
use sark_domain::config::SiemSinkConfig;

#[derive(Debug, thiserror::Error)]
pub enum SiemError {
    #[error("failed to read sink credential from env var '{0}'")]
    MissingCredential(String),
    #[error("sink request failed: {0}")]
    Request(String),
    #[error("sink rejected batch with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait SiemSink: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, gzipped_body: Vec<u8>) -> Result<(), SiemError>;
}

pub struct SplunkHecSink {
    client: Client,
    endpoint: String,
    token: String,
    sourcetype: String,
}

impl SplunkHecSink {
    pub fn new(client: Client, endpoint: String, token: String, sourcetype: String) -> Self {
        Self { client, endpoint, token, sourcetype }
    }
}

#[async_trait]
impl SiemSink for SplunkHecSink {
    fn name(&self) -> &str {
        "splunk_hec"
    }

    async fn send(&self, gzipped_body: Vec<u8>) -> Result<(), SiemError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Splunk {}", self.token))
            .header("Content-Encoding", "gzip")
            .header("X-Sark-Sourcetype", self.sourcetype.clone())
            .body(gzipped_body)
            .send()
            .await
            .map_err(|e| SiemError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SiemError::Rejected(response.status().as_u16()))
        }
    }
}

pub struct DatadogSink {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl DatadogSink {
    pub fn new(client: Client, endpoint: String, api_key: String) -> Self {
        Self { client, endpoint, api_key }
    }
}

#[async_trait]
impl SiemSink for DatadogSink {
    fn name(&self) -> &str {
        "datadog"
    }

    async fn send(&self, gzipped_body: Vec<u8>) -> Result<(), SiemError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("DD-API-KEY", self.api_key.clone())
            .header("Content-Encoding", "gzip")
            .body(gzipped_body)
            .send()
            .await
            .map_err(|e| SiemError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SiemError::Rejected(response.status().as_u16()))
        }
    }
}

/// Builds a configured sink from its config entry, reading the secret
/// from the named environment variable rather than storing it in config.
pub fn build_sink(client: Client, config: &SiemSinkConfig) -> Result<Box<dyn SiemSink>, SiemError> {
    match config {
        SiemSinkConfig::SplunkHec { endpoint, token_env, sourcetype } => {
            let token = std::env::var(token_env).map_err(|_| SiemError::MissingCredential(token_env.clone()))?;
            Ok(Box::new(SplunkHecSink::new(client, endpoint.clone(), token, sourcetype.clone())))
        }
        SiemSinkConfig::Datadog { endpoint, api_key_env } => {
            let api_key = std::env::var(api_key_env).map_err(|_| SiemError::MissingCredential(api_key_env.clone()))?;
            Ok(Box::new(DatadogSink::new(client, endpoint.clone(), api_key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_sink_fails_without_env_var() {
        std::env::remove_var("SARK_TEST_MISSING_TOKEN");
        let config = SiemSinkConfig::SplunkHec {
            endpoint: "https://example.test".into(),
            token_env: "SARK_TEST_MISSING_TOKEN".into(),
            sourcetype: "sark:gateway".into(),
        };
        let result = build_sink(Client::new(), &config);
        assert!(matches!(result, Err(SiemError::MissingCredential(_))));
    }
}
