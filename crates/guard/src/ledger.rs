//! C4: Spending Ledger.
//!
//! Computes usage cost against a price table and updates every matching
//! [`SpendingLimit`], emitting a spending alert the first time a limit
//! crosses its configured threshold.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::repository::SpendingLimitRepository;
use crate::types::{Alert, AlertSeverity, AlertType, SpendingLimit, Usage};

#[derive(Debug, Clone)]
pub struct PriceEntry {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

const DEFAULT_PRICE: PriceEntry = PriceEntry { input_per_million: 1.00, output_per_million: 3.00 };

pub struct SpendingLedger {
    repo: Arc<dyn SpendingLimitRepository>,
    /// Custom overrides take precedence over the built-in default table.
    custom_prices: RwLock<HashMap<String, PriceEntry>>,
}

/// Outcome of recording one usage event: the alerts that newly fired.
pub struct RecordOutcome {
    pub cost: f64,
    pub new_alerts: Vec<Alert>,
}

impl SpendingLedger {
    pub fn new(repo: Arc<dyn SpendingLimitRepository>) -> Self {
        Self { repo, custom_prices: RwLock::new(HashMap::new()) }
    }

    pub async fn set_custom_price(&self, model: impl Into<String>, price: PriceEntry) {
        self.custom_prices.write().await.insert(model.into(), price);
    }

    /// Lookup order: custom override -> exact default -> longest-prefix
    /// default -> fallback `(1.00, 3.00)`.
    async fn price_for(&self, model: &str) -> PriceEntry {
        if let Some(p) = self.custom_prices.read().await.get(model) {
            return p.clone();
        }
        if let Some(p) = default_price_table().get(model) {
            return p.clone();
        }
        let mut best: Option<(&str, &PriceEntry)> = None;
        for (name, price) in default_price_table().iter() {
            if model.starts_with(name.as_str()) {
                match best {
                    Some((best_name, _)) if best_name.len() >= name.len() => {}
                    _ => best = Some((name.as_str(), price)),
                }
            }
        }
        best.map(|(_, p)| p.clone()).unwrap_or(DEFAULT_PRICE)
    }

    pub async fn cost_of(&self, model: &str, usage: &Usage) -> f64 {
        let price = self.price_for(model).await;
        (usage.prompt_tokens as f64 * price.input_per_million
            + usage.completion_tokens as f64 * price.output_per_million)
            * 1e-6
    }

    /// Applies `cost` to every [`SpendingLimit`] whose `user_id` matches
    /// `user_id`, `""`, or `"*"`, emitting a spending alert on the first
    /// threshold crossing.
    pub async fn record_usage(&self, user_id: Option<&str>, model: &str, usage: &Usage) -> RecordOutcome {
        let cost = self.cost_of(model, usage).await;
        let user_id = user_id.unwrap_or("");

        let limits = self.repo.list().await;
        let mut new_alerts = Vec::new();

        for limit in limits {
            if limit.user_id != user_id && limit.user_id != "" && limit.user_id != "*" {
                continue;
            }

            let prev = limit.current_spend;
            let new_spend = prev + cost;

            let mut updated = limit.clone();
            updated.current_spend = new_spend;
            updated.updated_at = Utc::now();

            if updated.alert_at > 0 {
                let threshold = updated.limit_amount * (updated.alert_at as f64) / 100.0;
                if prev < threshold && threshold <= new_spend {
                    let severity = if new_spend >= updated.limit_amount { AlertSeverity::High } else { AlertSeverity::Medium };
                    let mut alert = Alert::new(
                        AlertType::Spending,
                        severity,
                        "Spending threshold crossed",
                        format!(
                            "Limit {} crossed {}% threshold (${:.2} of ${:.2})",
                            updated.id, updated.alert_at, new_spend, updated.limit_amount
                        ),
                    );
                    if !updated.user_id.is_empty() && updated.user_id != "*" {
                        alert.user_id = Some(updated.user_id.clone());
                    }
                    new_alerts.push(alert);
                }
            }

            self.repo.update(updated).await;
        }

        RecordOutcome { cost, new_alerts }
    }

    /// Returns `(exceeded, current, cap)` for the first matching limit whose
    /// `current_spend >= limit_amount`. Advisory only.
    pub async fn check_limit(&self, user_id: Option<&str>) -> (bool, f64, f64) {
        let user_id = user_id.unwrap_or("");
        for limit in self.repo.list().await {
            if limit.user_id != user_id && limit.user_id != "" && limit.user_id != "*" {
                continue;
            }
            if limit.current_spend >= limit.limit_amount {
                return (true, limit.current_spend, limit.limit_amount);
            }
        }
        (false, 0.0, 0.0)
    }
}

fn default_price_table() -> &'static HashMap<String, PriceEntry> {
    use std::sync::OnceLock;
    static TABLE: OnceLock<HashMap<String, PriceEntry>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        table.insert("gpt-4o".to_string(), PriceEntry { input_per_million: 2.50, output_per_million: 10.00 });
        table.insert("gpt-4o-mini".to_string(), PriceEntry { input_per_million: 0.15, output_per_million: 0.60 });
        table.insert("gpt-4".to_string(), PriceEntry { input_per_million: 30.00, output_per_million: 60.00 });
        table.insert("gpt-3.5-turbo".to_string(), PriceEntry { input_per_million: 0.50, output_per_million: 1.50 });
        table.insert("claude-3-opus".to_string(), PriceEntry { input_per_million: 15.00, output_per_million: 75.00 });
        table.insert("claude-3-5-sonnet".to_string(), PriceEntry { input_per_million: 3.00, output_per_million: 15.00 });
        table.insert("claude-3-haiku".to_string(), PriceEntry { input_per_million: 0.25, output_per_million: 1.25 });
        table
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemorySpendingLimitRepository;
    use crate::types::LimitType;

    fn limit(user_id: &str, limit_amount: f64, current_spend: f64, alert_at: u8) -> SpendingLimit {
        SpendingLimit {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            limit_type: LimitType::Monthly,
            limit_amount,
            current_spend,
            currency: "USD".to_string(),
            reset_at: Utc::now(),
            alert_at,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn spending_alert_fires_once_on_threshold_crossing() {
        let repo = Arc::new(InMemorySpendingLimitRepository::new());
        repo.create(limit("u1", 10.00, 7.50, 80)).await;
        let ledger = SpendingLedger::new(repo.clone());

        let usage = Usage { prompt_tokens: 1_000_000, completion_tokens: 0, total_tokens: 1_000_000 };
        ledger.set_custom_price("test-model", PriceEntry { input_per_million: 1.0, output_per_million: 0.0 }).await;

        let outcome = ledger.record_usage(Some("u1"), "test-model", &usage).await;
        assert_eq!(outcome.new_alerts.len(), 1);

        let usage2 = Usage { prompt_tokens: 500_000, completion_tokens: 0, total_tokens: 500_000 };
        let outcome2 = ledger.record_usage(Some("u1"), "test-model", &usage2).await;
        assert_eq!(outcome2.new_alerts.len(), 0);
    }

    #[tokio::test]
    async fn global_limit_matches_any_user() {
        let repo = Arc::new(InMemorySpendingLimitRepository::new());
        repo.create(limit("*", 100.00, 0.0, 0)).await;
        let ledger = SpendingLedger::new(repo.clone());
        let usage = Usage { prompt_tokens: 1_000, completion_tokens: 1_000, total_tokens: 2_000 };
        ledger.record_usage(Some("anyone"), "gpt-4o-mini", &usage).await;
        let limits = repo.list().await;
        assert!(limits[0].current_spend > 0.0);
    }

    #[tokio::test]
    async fn spend_never_decreases_between_resets() {
        let repo = Arc::new(InMemorySpendingLimitRepository::new());
        repo.create(limit("u1", 100.0, 0.0, 0)).await;
        let ledger = SpendingLedger::new(repo.clone());
        let usage = Usage { prompt_tokens: 1_000, completion_tokens: 0, total_tokens: 1_000 };
        let mut last = 0.0;
        for _ in 0..5 {
            ledger.record_usage(Some("u1"), "gpt-4o-mini", &usage).await;
            let current = repo.list().await[0].current_spend;
            assert!(current >= last);
            last = current;
        }
    }
}
