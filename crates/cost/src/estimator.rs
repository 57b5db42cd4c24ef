//! Cost Estimator — pre-call cost prediction and post-call actual-cost
//! extraction.
//!
//! Grounded on
//! `examples/original_source/src/sark/services/cost/estimator.py`'s
//! `CostEstimator` ABC and
//! `examples/original_source/src/sark/services/cost/providers/anthropic.py`'s
//! token-based pricing table, reimplemented with `rust_decimal::Decimal`
//! throughout — this arithmetic is never allowed to touch `f64`.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sark_domain::InvocationRequest;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CostEstimationError {
    #[error("cost estimation failed for provider {provider}: {message}")]
    Missing { provider: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CostEstimate {
    pub estimated_cost: Decimal,
    pub currency: String,
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    pub breakdown: serde_json::Value,
}

/// Generic invocation outcome shape a [`CostEstimator`] inspects to find
/// usage data — deliberately narrower than the full adapter
/// `InvocationResult` so estimators don't depend on the adapter crate.
pub struct InvocationOutcome<'a> {
    pub success: bool,
    pub metadata: &'a serde_json::Value,
}

#[async_trait]
pub trait CostEstimator: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn estimate(
        &self,
        request: &InvocationRequest,
        resource_metadata: &serde_json::Value,
    ) -> Result<CostEstimate, CostEstimationError>;

    /// Extract actual cost from response metadata, if the adapter surfaced
    /// usage counters. Returns `Ok(None)` when no usage data is present —
    /// this is the normal case for most calls, not an error.
    async fn record_actual(
        &self,
        _request: &InvocationRequest,
        _result: &InvocationOutcome<'_>,
        _resource_metadata: &serde_json::Value,
    ) -> Result<Option<CostEstimate>, CostEstimationError> {
        Ok(None)
    }
}

/// No-cost estimator for resources with no billing model.
pub struct FreeEstimator;

#[async_trait]
impl CostEstimator for FreeEstimator {
    fn provider_name(&self) -> &str {
        "free"
    }

    async fn estimate(
        &self,
        _request: &InvocationRequest,
        _resource_metadata: &serde_json::Value,
    ) -> Result<CostEstimate, CostEstimationError> {
        Ok(CostEstimate {
            estimated_cost: Decimal::ZERO,
            currency: "USD".into(),
            provider: "free".into(),
            model: None,
            breakdown: serde_json::json!({}),
        })
    }
}

/// Flat per-call cost, independent of arguments.
pub struct FixedCostEstimator {
    pub cost_per_call: Decimal,
}

#[async_trait]
impl CostEstimator for FixedCostEstimator {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    async fn estimate(
        &self,
        _request: &InvocationRequest,
        _resource_metadata: &serde_json::Value,
    ) -> Result<CostEstimate, CostEstimationError> {
        Ok(CostEstimate {
            estimated_cost: self.cost_per_call,
            currency: "USD".into(),
            provider: "fixed".into(),
            model: None,
            breakdown: serde_json::json!({"cost_per_call": self.cost_per_call.to_string()}),
        })
    }
}

/// Per-1M-token pricing, keyed by model id. Exact match, then longest
/// prefix match, then `"default"`.
pub struct TokenPricingTable {
    pub prices: HashMap<String, (Decimal, Decimal)>,
}

impl TokenPricingTable {
    fn lookup(&self, model: &str) -> (Decimal, Decimal) {
        let model_lower = model.to_lowercase();
        if let Some(p) = self.prices.get(&model_lower) {
            return *p;
        }
        for (key, pricing) in &self.prices {
            if key != "default" && model_lower.starts_with(key.as_str()) {
                return *pricing;
            }
        }
        tracing::warn!(model, "pricing not found for model, using default");
        self.prices
            .get("default")
            .copied()
            .unwrap_or((Decimal::new(300, 2), Decimal::new(1500, 2)))
    }
}

/// Token-based cost estimator for text-generation-style capabilities.
/// ~4 characters per token heuristic for input; `max_tokens` (or 50% of
/// input as a floor) for output when usage isn't yet known.
pub struct TokenBasedEstimator {
    pub provider: String,
    pub pricing: TokenPricingTable,
}

fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64 / 4).max(1)
}

#[async_trait]
impl CostEstimator for TokenBasedEstimator {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn estimate(
        &self,
        request: &InvocationRequest,
        resource_metadata: &serde_json::Value,
    ) -> Result<CostEstimate, CostEstimationError> {
        let model = resource_metadata
            .get("model")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CostEstimationError::Missing {
                provider: self.provider.clone(),
                message: "resource_metadata missing 'model'".into(),
            })?;

        let (input_price, output_price) = self.pricing.lookup(model);

        let mut input_tokens = 0u64;
        if let Some(system) = request.arguments.get("system").and_then(|v| v.as_str()) {
            input_tokens += estimate_tokens(system);
        }
        if let Some(messages) = request.arguments.get("messages").and_then(|v| v.as_array()) {
            for msg in messages {
                match msg.get("content") {
                    Some(serde_json::Value::Array(blocks)) => {
                        for block in blocks {
                            if block.get("type").and_then(|v| v.as_str()) == Some("text") {
                                if let Some(text) = block.get("text").and_then(|v| v.as_str()) {
                                    input_tokens += estimate_tokens(text);
                                }
                            }
                        }
                    }
                    Some(serde_json::Value::String(s)) => input_tokens += estimate_tokens(s),
                    _ => {}
                }
            }
        } else {
            return Err(CostEstimationError::Missing {
                provider: self.provider.clone(),
                message: "arguments missing 'messages'".into(),
            });
        }

        let output_tokens = request
            .arguments
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or_else(|| (input_tokens / 2).max(1024));

        let input_cost = Decimal::from(input_tokens) / Decimal::from(1_000_000u64) * input_price;
        let output_cost = Decimal::from(output_tokens) / Decimal::from(1_000_000u64) * output_price;

        Ok(CostEstimate {
            estimated_cost: input_cost + output_cost,
            currency: "USD".into(),
            provider: self.provider.clone(),
            model: Some(model.to_string()),
            breakdown: serde_json::json!({
                "input_tokens": input_tokens,
                "output_tokens": output_tokens,
                "input_cost": input_cost.to_string(),
                "output_cost": output_cost.to_string(),
            }),
        })
    }

    async fn record_actual(
        &self,
        request: &InvocationRequest,
        result: &InvocationOutcome<'_>,
        resource_metadata: &serde_json::Value,
    ) -> Result<Option<CostEstimate>, CostEstimationError> {
        if !result.success {
            return Ok(None);
        }
        let usage = match result.metadata.get("usage") {
            Some(u) => u,
            None => return Ok(None),
        };
        let model = match resource_metadata.get("model").and_then(|v| v.as_str()) {
            Some(m) => m,
            None => return Ok(None),
        };
        let (input_price, output_price) = self.pricing.lookup(model);
        let input_tokens = usage.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
        let output_tokens = usage.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0);

        let input_cost = Decimal::from(input_tokens) / Decimal::from(1_000_000u64) * input_price;
        let output_cost = Decimal::from(output_tokens) / Decimal::from(1_000_000u64) * output_price;

        let _ = request;
        Ok(Some(CostEstimate {
            estimated_cost: input_cost + output_cost,
            currency: "USD".into(),
            provider: self.provider.clone(),
            model: Some(model.to_string()),
            breakdown: serde_json::json!({
                "input_tokens": input_tokens,
                "output_tokens": output_tokens,
                "actual": true,
            }),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sark_domain::{Principal, PrincipalKind};

    fn pricing() -> TokenPricingTable {
        let mut prices = HashMap::new();
        prices.insert("claude-3-5-sonnet".to_string(), (Decimal::new(300, 2), Decimal::new(1500, 2)));
        prices.insert("default".to_string(), (Decimal::new(300, 2), Decimal::new(1500, 2)));
        TokenPricingTable { prices }
    }

    fn request(args: serde_json::Value) -> InvocationRequest {
        InvocationRequest {
            request_id: "r1".into(),
            principal: Principal::new("p", PrincipalKind::ApiKey),
            resource_id: "res".into(),
            capability_id: "cap".into(),
            arguments: args,
            context: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn estimates_from_messages() {
        let estimator = TokenBasedEstimator { provider: "anthropic".into(), pricing: pricing() };
        let req = request(serde_json::json!({
            "messages": [{"content": "hello world, this is a test message"}],
            "max_tokens": 256,
        }));
        let meta = serde_json::json!({"model": "claude-3-5-sonnet-20241022"});
        let estimate = estimator.estimate(&req, &meta).await.unwrap();
        assert!(estimate.estimated_cost > Decimal::ZERO);
    }

    #[tokio::test]
    async fn missing_model_is_an_error() {
        let estimator = TokenBasedEstimator { provider: "anthropic".into(), pricing: pricing() };
        let req = request(serde_json::json!({"messages": []}));
        let result = estimator.estimate(&req, &serde_json::json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn free_estimator_is_always_zero() {
        let estimator = FreeEstimator;
        let req = request(serde_json::json!({}));
        let estimate = estimator.estimate(&req, &serde_json::json!({})).await.unwrap();
        assert_eq!(estimate.estimated_cost, Decimal::ZERO);
    }

    #[tokio::test]
    async fn record_actual_uses_usage_metadata() {
        let estimator = TokenBasedEstimator { provider: "anthropic".into(), pricing: pricing() };
        let req = request(serde_json::json!({"messages": []}));
        let meta = serde_json::json!({"model": "claude-3-5-sonnet-20241022"});
        let outcome_meta = serde_json::json!({"usage": {"input_tokens": 100, "output_tokens": 50}});
        let outcome = InvocationOutcome { success: true, metadata: &outcome_meta };
        let actual = estimator.record_actual(&req, &outcome, &meta).await.unwrap();
        assert!(actual.is_some());
    }
}
