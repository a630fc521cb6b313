//! Gateway guard pipeline: injection classification, PII redaction, policy
//! evaluation, spending ledger, provider dispatch, and the audit/alert
//! engine behind a single orchestrated entry point.

pub mod audit;
pub mod classifier;
pub mod ledger;
pub mod pipeline;
pub mod policy;
pub mod providers;
pub mod redactor;
pub mod repository;
pub mod settings;
pub mod types;

pub use audit::AuditEngine;
pub use classifier::{ClassifierConfig, InjectionClassifier};
pub use ledger::SpendingLedger;
pub use pipeline::{GuardPipeline, GuardResponse};
pub use policy::PolicyEvaluator;
pub use providers::{ChatClient, ProviderConfig, ProviderFactory};
pub use redactor::PiiRedactor;
pub use settings::SettingsProvider;
