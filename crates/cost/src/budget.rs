//! Budget Controller — pre-call spend gating and post-call attribution.
//!
//! Structurally grounded on the teacher's `QuotaTracker`
//! (`crates/gateway/src/runtime/quota.rs`): a `parking_lot::RwLock` over a
//! per-key daily counter that resets on UTC day rollover. Reworked here to
//! key by principal instead of agent, and to use `rust_decimal::Decimal`
//! for all money instead of `f64`.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use sark_domain::config::BudgetConfig;
use sark_domain::CostRecord;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct BudgetExceeded {
    pub used: Decimal,
    pub limit: Decimal,
}

impl std::fmt::Display for BudgetExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "budget exceeded: {} of {} spent", self.used, self.limit)
    }
}

struct DailySpend {
    date: NaiveDate,
    spent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetSummary {
    pub principal_id: String,
    pub spent: Decimal,
    pub limit: Option<Decimal>,
    pub period_start: NaiveDate,
}

pub struct BudgetController {
    config: BudgetConfig,
    spend: RwLock<HashMap<String, DailySpend>>,
}

impl BudgetController {
    pub fn new(config: BudgetConfig) -> Self {
        Self { config, spend: RwLock::new(HashMap::new()) }
    }

    fn limit_for(&self, principal_id: &str) -> Option<Decimal> {
        if let Some(raw) = self.config.per_principal_limit_usd.get(principal_id) {
            return raw.parse().ok();
        }
        self.config
            .default_daily_limit_usd
            .as_ref()
            .and_then(|raw| raw.parse().ok())
    }

    /// `allowed` iff there is no configured limit, or
    /// `spent_period + estimated <= limit`.
    pub fn check_budget(
        &self,
        principal_id: &str,
        estimated_cost: Decimal,
    ) -> Result<(), BudgetExceeded> {
        let limit = match self.limit_for(principal_id) {
            Some(l) => l,
            None => return Ok(()),
        };

        let today = Utc::now().date_naive();
        let spend = self.spend.read();
        let spent_so_far = match spend.get(principal_id) {
            Some(s) if s.date == today => s.spent,
            _ => Decimal::ZERO,
        };
        drop(spend);

        if spent_so_far + estimated_cost > limit {
            Err(BudgetExceeded { used: spent_so_far, limit })
        } else {
            Ok(())
        }
    }

    /// Attribute a cost record to its principal, using actual cost when
    /// known else the estimate. Resets the counter on day rollover.
    pub fn record(&self, record: &CostRecord) {
        let today = Utc::now().date_naive();
        let cost = record.attributed_cost();
        let mut spend = self.spend.write();
        let entry = spend
            .entry(record.principal_id.clone())
            .or_insert(DailySpend { date: today, spent: Decimal::ZERO });
        if entry.date != today {
            entry.date = today;
            entry.spent = Decimal::ZERO;
        }
        entry.spent += cost;
    }

    pub fn summary(&self, principal_id: &str) -> BudgetSummary {
        let today = Utc::now().date_naive();
        let spend = self.spend.read();
        let spent = match spend.get(principal_id) {
            Some(s) if s.date == today => s.spent,
            _ => Decimal::ZERO,
        };
        BudgetSummary {
            principal_id: principal_id.to_string(),
            spent,
            limit: self.limit_for(principal_id),
            period_start: today,
        }
    }

    /// Snapshot every principal with tracked spend this period, for the
    /// introspection surface.
    pub fn snapshot(&self) -> Vec<BudgetSummary> {
        let today = Utc::now().date_naive();
        self.spend
            .read()
            .iter()
            .map(|(principal_id, s)| BudgetSummary {
                principal_id: principal_id.clone(),
                spent: if s.date == today { s.spent } else { Decimal::ZERO },
                limit: self.limit_for(principal_id),
                period_start: today,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(principal_id: &str, actual: Decimal) -> CostRecord {
        CostRecord {
            principal_id: principal_id.into(),
            resource_id: "res".into(),
            capability_id: "cap".into(),
            estimated_cost: None,
            actual_cost: Some(actual),
            currency: "USD".into(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn no_limit_always_allows() {
        let controller = BudgetController::new(BudgetConfig::default());
        assert!(controller.check_budget("p1", Decimal::new(100000, 2)).is_ok());
    }

    #[test]
    fn exceeding_limit_is_rejected() {
        let mut config = BudgetConfig::default();
        config.default_daily_limit_usd = Some("10.00".into());
        let controller = BudgetController::new(config);
        controller.record(&record("p1", Decimal::new(900, 2)));
        assert!(controller.check_budget("p1", Decimal::new(50, 2)).is_ok());
        assert!(controller.check_budget("p1", Decimal::new(200, 2)).is_err());
    }

    #[test]
    fn per_principal_override_takes_precedence() {
        let mut config = BudgetConfig::default();
        config.default_daily_limit_usd = Some("1.00".into());
        config.per_principal_limit_usd.insert("vip".into(), "1000.00".into());
        let controller = BudgetController::new(config);
        assert!(controller.check_budget("vip", Decimal::new(50000, 2)).is_ok());
    }

    #[test]
    fn record_uses_actual_cost() {
        let controller = BudgetController::new(BudgetConfig::default());
        controller.record(&record("p1", Decimal::new(250, 2)));
        let summary = controller.summary("p1");
        assert_eq!(summary.spent, Decimal::new(250, 2));
    }
}
