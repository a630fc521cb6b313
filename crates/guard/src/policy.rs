//! C5: Policy Evaluator.
//!
//! Evaluates active policies in ascending priority order against a request
//! context, accumulating warnings/throttle/deny decisions. Deterministic:
//! identical policy set and context produce byte-identical output.

use chrono::Utc;
use std::sync::Arc;

use crate::repository::PolicyRepository;
use crate::types::{
    PolicyAction, PolicyDecision, PolicyEvaluation, PolicyRule, PolicyStatus, RequestContext, RuleCondition, RuleOperator, Targets,
};

pub struct PolicyEvaluator {
    repo: Arc<dyn PolicyRepository>,
}

impl PolicyEvaluator {
    pub fn new(repo: Arc<dyn PolicyRepository>) -> Self {
        Self { repo }
    }

    pub async fn evaluate(&self, ctx: &RequestContext, user_groups: &[String]) -> PolicyDecision {
        let mut policies = self.repo.list().await;
        policies.retain(|p| p.status == PolicyStatus::Active);
        policies.sort_by_key(|p| p.priority);

        let mut decision = PolicyDecision {
            allowed: true,
            blocked_by: None,
            block_reason: None,
            warnings: Vec::new(),
            throttled: false,
            evaluations: Vec::new(),
        };

        for policy in &policies {
            if !targets_match(&policy.targets, ctx, user_groups) {
                continue;
            }
            let matched = rules_match(&policy.rules, ctx);
            if !matched {
                continue;
            }

            decision.evaluations.push(PolicyEvaluation {
                policy_id: policy.id.clone(),
                name: policy.name.clone(),
                matched: true,
                action: policy.actions.action,
                message: policy.actions.message.clone(),
                evaluated_at: Utc::now(),
            });

            match policy.actions.action {
                PolicyAction::Deny => {
                    decision.allowed = false;
                    decision.blocked_by = Some(policy.id.clone());
                    decision.block_reason = policy.actions.message.clone();
                }
                PolicyAction::Warn => {
                    if let Some(msg) = &policy.actions.message {
                        decision.warnings.push(msg.clone());
                    }
                }
                PolicyAction::Throttle => {
                    decision.throttled = true;
                }
                PolicyAction::Allow | PolicyAction::Audit => {}
            }
        }

        decision
    }
}

fn targets_match(targets: &Targets, ctx: &RequestContext, user_groups: &[String]) -> bool {
    if targets.all_users {
        return true;
    }
    if targets.users.is_empty() && targets.groups.is_empty() {
        return true;
    }
    if let Some(user_id) = &ctx.user_id {
        if targets.users.iter().any(|u| u == user_id) {
            return true;
        }
    }
    targets.groups.iter().any(|g| user_groups.contains(g))
}

fn rules_match(rules: &[PolicyRule], ctx: &RequestContext) -> bool {
    let mut iter = rules.iter();
    let first = match iter.next() {
        Some(rule) => rule,
        None => return true,
    };
    let mut result = evaluate_rule(first, ctx);

    for rule in iter {
        let this_match = evaluate_rule(rule, ctx);
        result = match rule.condition {
            RuleCondition::And => {
                if !this_match {
                    return false;
                }
                result && this_match
            }
            RuleCondition::Or => {
                if this_match {
                    return true;
                }
                result || this_match
            }
        };
    }
    result
}

fn evaluate_rule(rule: &PolicyRule, ctx: &RequestContext) -> bool {
    let field_value = resolve_field(&rule.field, ctx);
    match rule.operator {
        RuleOperator::Equals => value_eq(&field_value, &rule.value),
        RuleOperator::NotEquals => !value_eq(&field_value, &rule.value),
        RuleOperator::Contains => field_value.as_deref().map(|v| v.contains(rule_value_str(&rule.value).as_str())).unwrap_or(false),
        RuleOperator::NotContains => !field_value.as_deref().map(|v| v.contains(rule_value_str(&rule.value).as_str())).unwrap_or(false),
        RuleOperator::In => {
            let haystack: Vec<String> = rule.value.as_array().map(|a| a.iter().map(rule_value_str).collect()).unwrap_or_default();
            field_value.map(|v| haystack.contains(&v)).unwrap_or(false)
        }
        RuleOperator::NotIn => {
            let haystack: Vec<String> = rule.value.as_array().map(|a| a.iter().map(rule_value_str).collect()).unwrap_or_default();
            !field_value.map(|v| haystack.contains(&v)).unwrap_or(false)
        }
        RuleOperator::GreaterThan => numeric(&field_value) > numeric_value(&rule.value),
        RuleOperator::LessThan => numeric(&field_value) < numeric_value(&rule.value),
    }
}

fn value_eq(field_value: &Option<String>, rule_value: &serde_json::Value) -> bool {
    match field_value {
        Some(v) => v == &rule_value_str(rule_value),
        None => false,
    }
}

fn rule_value_str(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn resolve_field(field: &str, ctx: &RequestContext) -> Option<String> {
    match field {
        "user_id" => ctx.user_id.clone(),
        "model" => ctx.model.clone(),
        "provider" => ctx.provider.clone(),
        "token_count" => Some(ctx.token_count.to_string()),
        "cost" => Some(ctx.cost.to_string()),
        other => ctx.metadata.get(other).cloned(),
    }
}

fn numeric(value: &Option<String>) -> f64 {
    value.as_deref().and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0)
}

fn numeric_value(value: &serde_json::Value) -> f64 {
    value.as_f64().or_else(|| value.as_str().and_then(|s| s.parse().ok())).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryPolicyRepository;
    use crate::types::{Actions, Policy, PolicyConfig, PolicyType};
    use chrono::Utc;

    fn policy(id: &str, priority: i32, action: PolicyAction, rules: Vec<PolicyRule>, targets: Targets) -> Policy {
        Policy {
            id: id.to_string(),
            name: id.to_string(),
            policy_type: PolicyType::Content,
            status: PolicyStatus::Active,
            priority,
            config: PolicyConfig::default(),
            rules,
            targets,
            actions: Actions { action, notify: vec![], webhook_url: None, log_level: None, message: Some(format!("{id} fired")) },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ctx(user_id: &str, model: &str) -> RequestContext {
        RequestContext {
            user_id: Some(user_id.to_string()),
            model: Some(model.to_string()),
            provider: None,
            token_count: 100,
            cost: 0.5,
            content_type: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn empty_rule_list_matches() {
        let repo = InMemoryPolicyRepository::new();
        repo.create(policy("p1", 1, PolicyAction::Deny, vec![], Targets { all_users: true, ..Default::default() })).await;
        let evaluator = PolicyEvaluator::new(Arc::new(repo));
        let decision = evaluator.evaluate(&ctx("u1", "gpt-4o"), &[]).await;
        assert!(!decision.allowed);
        assert_eq!(decision.blocked_by.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn deny_cannot_be_flipped_back_by_a_lower_priority_allow() {
        let repo = InMemoryPolicyRepository::new();
        repo.create(policy("deny-first", 1, PolicyAction::Deny, vec![], Targets { all_users: true, ..Default::default() })).await;
        repo.create(policy("allow-second", 2, PolicyAction::Allow, vec![], Targets { all_users: true, ..Default::default() })).await;
        let evaluator = PolicyEvaluator::new(Arc::new(repo));
        let decision = evaluator.evaluate(&ctx("u1", "gpt-4o"), &[]).await;
        assert!(!decision.allowed);
        assert_eq!(decision.evaluations.len(), 2);
    }

    #[tokio::test]
    async fn untargeted_user_does_not_match() {
        let repo = InMemoryPolicyRepository::new();
        let targets = Targets { users: vec!["someone-else".to_string()], ..Default::default() };
        repo.create(policy("p1", 1, PolicyAction::Deny, vec![], targets)).await;
        let evaluator = PolicyEvaluator::new(Arc::new(repo));
        let decision = evaluator.evaluate(&ctx("u1", "gpt-4o"), &[]).await;
        assert!(decision.allowed);
        assert!(decision.evaluations.is_empty());
    }

    #[tokio::test]
    async fn greater_than_rule_coerces_to_float() {
        let rule = PolicyRule {
            field: "cost".to_string(),
            operator: RuleOperator::GreaterThan,
            value: serde_json::json!(0.1),
            condition: RuleCondition::And,
        };
        let repo = InMemoryPolicyRepository::new();
        repo.create(policy("p1", 1, PolicyAction::Warn, vec![rule], Targets { all_users: true, ..Default::default() })).await;
        let evaluator = PolicyEvaluator::new(Arc::new(repo));
        let decision = evaluator.evaluate(&ctx("u1", "gpt-4o"), &[]).await;
        assert_eq!(decision.warnings.len(), 1);
    }

    #[tokio::test]
    async fn deterministic_for_identical_input() {
        let repo = Arc::new(InMemoryPolicyRepository::new());
        repo.create(policy("p1", 1, PolicyAction::Warn, vec![], Targets { all_users: true, ..Default::default() })).await;
        let evaluator = PolicyEvaluator::new(repo);
        let a = evaluator.evaluate(&ctx("u1", "gpt-4o"), &[]).await;
        let b = evaluator.evaluate(&ctx("u1", "gpt-4o"), &[]).await;
        assert_eq!(a.warnings, b.warnings);
        assert_eq!(a.allowed, b.allowed);
    }
}
