use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cost Estimator configuration: which estimator kind each resource's
/// capabilities use, and the token-based pricing table.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CostConfig {
    /// Resource id -> estimator kind ("token_based", "fixed", "free").
    #[serde(default)]
    pub estimator_by_resource: HashMap<String, String>,
    /// Fixed per-call cost (USD), used by the "fixed" estimator.
    #[serde(default)]
    pub fixed_cost_usd: Option<String>,
    /// model id -> (input_cost_per_1m_usd, output_cost_per_1m_usd), as decimal strings.
    #[serde(default)]
    pub pricing_table: HashMap<String, (String, String)>,
}

/// Budget Controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default)]
    pub default_daily_limit_usd: Option<String>,
    #[serde(default)]
    pub per_principal_limit_usd: HashMap<String, String>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_daily_limit_usd: None,
            per_principal_limit_usd: HashMap::new(),
        }
    }
}
