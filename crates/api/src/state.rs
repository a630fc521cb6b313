use std::sync::Arc;

use gateway_core::Config;
use gateway_guard::audit::AuditEngine;
use gateway_guard::ledger::SpendingLedger;
use gateway_guard::pipeline::GuardPipeline;
use gateway_guard::policy::PolicyEvaluator;
use gateway_guard::providers::ProviderFactory;
use gateway_guard::repository::{PolicyRepository, SettingsRepository, SpendingLimitRepository, UserRepository};
use gateway_guard::settings::SettingsProvider;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<GuardPipeline>,
    pub policy_evaluator: Arc<PolicyEvaluator>,
    pub ledger: Arc<SpendingLedger>,
    pub audit: Arc<AuditEngine>,
    pub settings: Arc<SettingsProvider>,
    pub users: Arc<dyn UserRepository>,
    pub policies: Arc<dyn PolicyRepository>,
    pub spending_limits: Arc<dyn SpendingLimitRepository>,
}

#[allow(clippy::too_many_arguments)]
impl AppState {
    pub fn new(
        config: Config,
        users: Arc<dyn UserRepository>,
        policies: Arc<dyn PolicyRepository>,
        spending_limits: Arc<dyn SpendingLimitRepository>,
        settings_repo: Arc<dyn SettingsRepository>,
    ) -> Self {
        let audit = Arc::new(AuditEngine::default());
        let ledger = Arc::new(SpendingLedger::new(spending_limits.clone()));
        let policy_evaluator = Arc::new(PolicyEvaluator::new(policies.clone()));
        let settings = Arc::new(SettingsProvider::new(settings_repo));

        let default_config = if config.llm.api_key.is_some() {
            Some(gateway_guard::providers::ProviderConfig {
                provider: config.llm.provider.clone(),
                model: config.llm.model.clone(),
                api_key: config.llm.api_key.clone(),
                base_url: config.llm.base_url.clone(),
            })
        } else {
            None
        };
        let factory = Arc::new(ProviderFactory::new(default_config, Some(settings.clone())));

        let classifier = Arc::new(gateway_guard::classifier::InjectionClassifier::new(Default::default()));
        let redactor = Arc::new(gateway_guard::redactor::PiiRedactor::default());
        let pipeline = Arc::new(GuardPipeline::new(
            classifier,
            redactor,
            policy_evaluator.clone(),
            users.clone(),
            factory,
            ledger.clone(),
            audit.clone(),
        ));

        Self { config, pipeline, policy_evaluator, ledger, audit, settings, users, policies, spending_limits }
    }
}
