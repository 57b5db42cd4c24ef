//! Shared pre-call cost estimation, used by both `/v1/authorize` (to gate
//! the budget check) and `/v1/invoke` (to label the response and seed
//! `record_actual`'s estimate). Kept in one place so the two endpoints
//! can never drift on how an estimate is produced.

use rust_decimal::Decimal;
use sark_domain::InvocationRequest;

use crate::state::AppState;

/// Ask each registered estimator in turn, taking the first that prices
/// the call. `None` means no estimator could price it at all (for
/// example, none are registered for the resource's provider) — callers
/// that gate a budget on this should treat that the same as a zero-cost
/// estimate, matching `CostRecord::attributed_cost`'s fallback.
pub async fn estimate_cost(
    state: &AppState,
    request: &InvocationRequest,
    resource_metadata: &serde_json::Value,
) -> Option<Decimal> {
    for estimator in state.cost_estimators.iter() {
        if let Ok(estimate) = estimator.estimate(request, resource_metadata).await {
            return Some(estimate.estimated_cost);
        }
    }
    None
}
