//! fincore — multi-tenant personal-finance tools service.
//!
//! Guided multi-step wizards (financial health, budget, net worth,
//! emergency fund, quiz) whose drafts and results attach to either an
//! authenticated account or an anonymous browser session, plus a bill
//! tracker, a learning hub, and admin analytics over the usage event
//! stream. Served as an HTTP JSON API.

pub mod analytics;
pub mod auth;
pub mod bills;
pub mod config;
pub mod error;
pub mod identity;
pub mod learning;
pub mod notify;
pub mod rest;
pub mod scoring;
pub mod storage;
pub mod wizard;

use std::sync::Arc;
use std::time::Instant;

use analytics::AnalyticsStorage;
use auth::{CredentialHasher, Sha256Hasher};
use config::ServiceConfig;
use identity::IdentityResolver;
use notify::{LogMailer, Mailer};
use storage::{usage_log::UsageLog, Storage};
use wizard::CarryOver;

/// Shared state handed to every request handler.
pub struct AppContext {
    pub config: ServiceConfig,
    pub storage: Arc<Storage>,
    pub usage_log: UsageLog,
    pub identity: IdentityResolver,
    pub analytics: AnalyticsStorage,
    pub carryover: CarryOver,
    pub mailer: Arc<dyn Mailer>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub started_at: Instant,
}

/// Open storage, seed the course catalog, bootstrap the admin account and
/// assemble the shared context.
pub async fn build_context(config: ServiceConfig) -> anyhow::Result<Arc<AppContext>> {
    let storage = Arc::new(Storage::new(&config.data_dir).await?);
    let hasher: Arc<dyn CredentialHasher> = Arc::new(Sha256Hasher);

    learning::seed_courses(&storage).await.map_err(anyhow::Error::new)?;
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        auth::bootstrap_admin(&storage, hasher.as_ref(), email, password, &config.default_lang)
            .await
            .map_err(anyhow::Error::new)?;
    }

    Ok(Arc::new(AppContext {
        usage_log: UsageLog::new(storage.pool()),
        identity: IdentityResolver::new(
            storage.clone(),
            config.session_ttl_days,
            config.default_lang.clone(),
        ),
        analytics: AnalyticsStorage::new(storage.pool()),
        carryover: CarryOver::new(std::time::Duration::from_secs(
            config.session_ttl_days.max(1) as u64 * 24 * 60 * 60,
        )),
        mailer: Arc::new(LogMailer),
        hasher,
        storage,
        config,
        started_at: Instant::now(),
    }))
}
