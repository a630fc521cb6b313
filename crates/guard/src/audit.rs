//! C6: Audit/Alert Engine.
//!
//! Bounded in-memory ring of [`AuditLog`] entries plus a separate alert
//! list, each behind its own mutex per the locking table. Every append is
//! mirrored to `tracing`, matching `AuditLogger::log_event`'s dual-sink
//! behavior.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::types::{Alert, AuditEventType, AuditLog, AuditQuery, AuditStatus};

const DEFAULT_CAPACITY: usize = 10_000;

pub struct BackendHealth {
    pub healthy: bool,
    pub message: String,
    pub entry_count: usize,
    pub capacity: usize,
}

#[derive(Debug, Default)]
pub struct PeriodStats {
    pub total_events: usize,
    pub by_user: HashMap<String, usize>,
    pub by_model: HashMap<String, usize>,
    pub by_hour: HashMap<String, usize>,
    pub by_event_type: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct WindowMetrics {
    pub total_requests: usize,
    pub unique_users: usize,
    pub blocked_count: usize,
    pub total_spend: f64,
    pub injection_attempts: usize,
    pub pii_detections: usize,
    pub requests_by_model: HashMap<String, usize>,
    pub requests_by_provider: HashMap<String, usize>,
    pub spend_by_user: HashMap<String, f64>,
    pub spend_by_model: HashMap<String, f64>,
}

#[derive(Debug, Default)]
pub struct DashboardMetrics {
    pub current: WindowMetrics,
    pub previous: WindowMetrics,
    pub requests_change_pct: f64,
    pub spend_change_pct: f64,
}

pub struct AuditEngine {
    capacity: usize,
    entries: RwLock<Vec<AuditLog>>,
    alerts: RwLock<Vec<Alert>>,
}

impl Default for AuditEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AuditEngine {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: RwLock::new(Vec::new()), alerts: RwLock::new(Vec::new()) }
    }

    pub async fn log(&self, mut entry: AuditLog) {
        if entry.id.is_empty() {
            entry.id = uuid::Uuid::new_v4().to_string();
        }

        match entry.status {
            AuditStatus::Success => info!(id = %entry.id, action = %entry.action, resource = %entry.resource_type, "audit event"),
            AuditStatus::Warning => warn!(id = %entry.id, action = %entry.action, resource = %entry.resource_type, "audit event"),
            AuditStatus::Blocked | AuditStatus::Failure => {
                error!(id = %entry.id, action = %entry.action, resource = %entry.resource_type, "audit event")
            }
        }

        let mut guard = self.entries.write().await;
        guard.push(entry);
        if guard.len() > self.capacity {
            let overflow = guard.len() - self.capacity;
            guard.drain(0..overflow);
        }
    }

    pub async fn create_alert(&self, alert: Alert) {
        match alert.severity {
            crate::types::AlertSeverity::Low | crate::types::AlertSeverity::Medium => {
                info!(id = %alert.id, title = %alert.title, "alert raised")
            }
            crate::types::AlertSeverity::High | crate::types::AlertSeverity::Critical => {
                warn!(id = %alert.id, title = %alert.title, "alert raised")
            }
        }
        self.alerts.write().await.push(alert);
    }

    pub async fn query(&self, query: &AuditQuery) -> (Vec<AuditLog>, usize) {
        let guard = self.entries.read().await;
        let mut matched: Vec<&AuditLog> = guard
            .iter()
            .filter(|entry| {
                if let Some(start) = query.start_time {
                    if entry.ts < start {
                        return false;
                    }
                }
                if let Some(end) = query.end_time {
                    if entry.ts > end {
                        return false;
                    }
                }
                if !query.event_types.is_empty() && !query.event_types.contains(&entry.event_type) {
                    return false;
                }
                if let Some(user_id) = &query.user_id {
                    if entry.user_id.as_deref() != Some(user_id.as_str()) {
                        return false;
                    }
                }
                if let Some(resource_type) = &query.resource_type {
                    if &entry.resource_type != resource_type {
                        return false;
                    }
                }
                if let Some(status) = query.status {
                    if entry.status != status {
                        return false;
                    }
                }
                true
            })
            .collect();

        matched.sort_by(|a, b| b.ts.cmp(&a.ts));
        let total = matched.len();
        let page = matched.into_iter().skip(query.offset).take(query.limit).cloned().collect();
        (page, total)
    }

    pub async fn stats(&self, period: Duration) -> PeriodStats {
        let cutoff = Utc::now() - period;
        let guard = self.entries.read().await;
        let mut stats = PeriodStats::default();

        for entry in guard.iter().filter(|e| e.ts >= cutoff) {
            stats.total_events += 1;
            if let Some(user_id) = &entry.user_id {
                *stats.by_user.entry(user_id.clone()).or_insert(0) += 1;
            }
            if let Some(model) = entry.details.get("model").and_then(|v| v.as_str()) {
                *stats.by_model.entry(model.to_string()).or_insert(0) += 1;
            }
            let hour_bucket = entry.ts.format("%Y-%m-%dT%H").to_string();
            *stats.by_hour.entry(hour_bucket).or_insert(0) += 1;
            *stats.by_event_type.entry(format!("{:?}", entry.event_type).to_lowercase()).or_insert(0) += 1;
        }

        stats
    }

    pub async fn dashboard(&self) -> DashboardMetrics {
        let now = Utc::now();
        let current = self.window_metrics(now - Duration::hours(24), now).await;
        let previous = self.window_metrics(now - Duration::hours(48), now - Duration::hours(24)).await;

        let requests_change_pct = pct_change(current.total_requests as f64, previous.total_requests as f64);
        let spend_change_pct = pct_change(current.total_spend, previous.total_spend);

        DashboardMetrics { current, previous, requests_change_pct, spend_change_pct }
    }

    async fn window_metrics(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> WindowMetrics {
        let guard = self.entries.read().await;
        let mut metrics = WindowMetrics::default();
        let mut users = std::collections::HashSet::new();

        for entry in guard.iter().filter(|e| e.ts >= start && e.ts < end) {
            metrics.total_requests += 1;
            if let Some(user_id) = &entry.user_id {
                users.insert(user_id.clone());
            }
            if entry.status == AuditStatus::Blocked {
                metrics.blocked_count += 1;
            }
            if let Some(cost) = entry.details.get("cost").and_then(|v| v.as_f64()) {
                metrics.total_spend += cost;
                if let Some(user_id) = &entry.user_id {
                    *metrics.spend_by_user.entry(user_id.clone()).or_insert(0.0) += cost;
                }
                if let Some(model) = entry.details.get("model").and_then(|v| v.as_str()) {
                    *metrics.spend_by_model.entry(model.to_string()).or_insert(0.0) += cost;
                }
            }
            if entry.event_type == AuditEventType::SecurityAlert {
                metrics.injection_attempts += 1;
            }
            if let Some(pii_count) = entry.details.get("pii_count").and_then(|v| v.as_u64()) {
                metrics.pii_detections += pii_count as usize;
            }
            if let Some(model) = entry.details.get("model").and_then(|v| v.as_str()) {
                *metrics.requests_by_model.entry(model.to_string()).or_insert(0) += 1;
            }
            if let Some(provider) = entry.details.get("provider").and_then(|v| v.as_str()) {
                *metrics.requests_by_provider.entry(provider.to_string()).or_insert(0) += 1;
            }
        }

        metrics.unique_users = users.len();
        metrics
    }

    /// Always succeeds, even for an unknown `id`. First call wins; later
    /// calls on an already-acked alert are no-ops.
    pub async fn ack_alert(&self, id: &str, user_id: &str) {
        let mut guard = self.alerts.write().await;
        if let Some(alert) = guard.iter_mut().find(|a| a.id == id) {
            if alert.acked_at.is_none() {
                alert.acked_at = Some(Utc::now());
                alert.acked_by = Some(user_id.to_string());
            }
        }
    }

    pub async fn list_alerts(&self, limit: usize, include_acked: bool) -> Vec<Alert> {
        let guard = self.alerts.read().await;
        let mut alerts: Vec<Alert> = guard.iter().filter(|a| include_acked || a.acked_at.is_none()).cloned().collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit);
        alerts
    }

    pub async fn health_check(&self) -> BackendHealth {
        let entry_count = self.entries.read().await.len();
        BackendHealth { healthy: true, message: "ring buffer operational".to_string(), entry_count, capacity: self.capacity }
    }
}

fn pct_change(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertSeverity, AlertType};

    #[tokio::test]
    async fn ring_evicts_oldest_past_capacity() {
        let engine = AuditEngine::new(3);
        for i in 0..5 {
            engine.log(AuditLog::new(AuditEventType::Request, format!("a{i}"), "guard")).await;
        }
        let (page, total) = engine.query(&AuditQuery { limit: 10, ..Default::default() }).await;
        assert_eq!(total, 3);
        assert_eq!(page[0].action, "a4");
        assert_eq!(page[2].action, "a2");
    }

    #[tokio::test]
    async fn ack_is_idempotent_and_ok_for_unknown_id() {
        let engine = AuditEngine::default();
        engine.ack_alert("missing", "u1").await;

        let alert = Alert::new(AlertType::Security, AlertSeverity::High, "t", "m");
        let id = alert.id.clone();
        engine.create_alert(alert).await;
        engine.ack_alert(&id, "u1").await;
        engine.ack_alert(&id, "u2").await;

        let alerts = engine.list_alerts(10, true).await;
        assert_eq!(alerts[0].acked_by.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn query_pagination_counts_before_paging() {
        let engine = AuditEngine::default();
        for i in 0..10 {
            engine.log(AuditLog::new(AuditEventType::Request, format!("a{i}"), "guard")).await;
        }
        let (page, total) = engine.query(&AuditQuery { limit: 3, offset: 2, ..Default::default() }).await;
        assert_eq!(total, 10);
        assert_eq!(page.len(), 3);
    }

    #[tokio::test]
    async fn dashboard_handles_zero_previous_window() {
        let engine = AuditEngine::default();
        let dashboard = engine.dashboard().await;
        assert_eq!(dashboard.requests_change_pct, 0.0);
    }
}
