//! Domain types shared across the pipeline components and the control plane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl GuardRequest {
    pub fn request_id_or_generate(&mut self) -> String {
        if self.request_id.is_none() {
            self.request_id = Some(new_id());
        }
        self.request_id.clone().unwrap()
    }
}

// --- C1: Injection classifier -------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "type")]
    pub detection_type: String,
    pub pattern: String,
    pub location: usize,
    pub confidence: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    pub injection_detected: bool,
    pub threat_level: ThreatLevel,
    pub detections: Vec<Detection>,
    pub blocked_reason: Option<String>,
    pub recommendations: Vec<String>,
}

// --- C2: PII redactor -----------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PIIMatch {
    #[serde(rename = "type")]
    pub pii_type: String,
    pub original: String,
    pub masked: String,
    pub location: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PIIReport {
    pub pii_detected: bool,
    pub pii_count: usize,
    pub pii_types: Vec<PIIMatch>,
}

// --- C5: Policy engine -----------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyType {
    Spending,
    RateLimit,
    Content,
    Access,
    Compliance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    Active,
    Inactive,
    Draft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCondition {
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub field: String,
    pub operator: RuleOperator,
    pub value: serde_json::Value,
    pub condition: RuleCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Allow,
    Deny,
    Warn,
    Audit,
    Throttle,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Targets {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub all_users: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actions {
    pub action: PolicyAction,
    #[serde(default)]
    pub notify: Vec<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Schema-complete config bag. `burst_limit`/`requests_per_hour` are carried
/// for rate_limit policies but never consulted by the evaluator (§9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub burst_limit: Option<u32>,
    #[serde(default)]
    pub requests_per_hour: Option<u32>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub status: PolicyStatus,
    pub priority: i32,
    #[serde(default)]
    pub config: PolicyConfig,
    pub rules: Vec<PolicyRule>,
    pub targets: Targets,
    pub actions: Actions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    pub policy_id: String,
    pub name: String,
    pub matched: bool,
    pub action: PolicyAction,
    pub message: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub user_id: Option<String>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub token_count: u64,
    pub cost: f64,
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub blocked_by: Option<String>,
    pub block_reason: Option<String>,
    pub warnings: Vec<String>,
    pub throttled: bool,
    pub evaluations: Vec<PolicyEvaluation>,
}

// --- C4: Spending ledger ----------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitType {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingLimit {
    pub id: String,
    /// empty or "*" means global
    pub user_id: String,
    pub limit_type: LimitType,
    pub limit_amount: f64,
    pub current_spend: f64,
    pub currency: String,
    pub reset_at: DateTime<Utc>,
    /// percent, 1..100
    pub alert_at: u8,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// --- C6: Audit / alerts ------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Request,
    PolicyChange,
    UserAction,
    SystemEvent,
    SecurityAlert,
    SpendingAlert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failure,
    Blocked,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub action: String,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub request_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub status: AuditStatus,
    /// milliseconds
    pub duration: u64,
    pub details: HashMap<String, serde_json::Value>,
}

impl AuditLog {
    pub fn new(event_type: AuditEventType, action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            ts: Utc::now(),
            event_type,
            action: action.into(),
            user_id: None,
            user_email: None,
            resource_type: resource_type.into(),
            resource_id: None,
            request_id: None,
            ip: None,
            user_agent: None,
            status: AuditStatus::Success,
            duration: 0,
            details: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Security,
    Spending,
    Policy,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub user_id: Option<String>,
    pub policy_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub acked_at: Option<DateTime<Utc>>,
    pub acked_by: Option<String>,
}

impl Alert {
    pub fn new(alert_type: AlertType, severity: AlertSeverity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            user_id: None,
            policy_id: None,
            created_at: Utc::now(),
            acked_at: None,
            acked_by: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_types: Vec<AuditEventType>,
    pub user_id: Option<String>,
    pub resource_type: Option<String>,
    pub status: Option<AuditStatus>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn default_limit() -> usize {
    50
}

// --- Users --------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
