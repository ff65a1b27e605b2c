//! Outbound notification seam.
//!
//! Email delivery is an external collaborator; the core only hands over a
//! recipient, a template name and plain data. Sends are fire-and-forget:
//! a delivery failure is logged by the caller and never fails a wizard.

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Render `template` with `data` in `lang` and deliver it to `to`.
    async fn send(
        &self,
        to: &str,
        subject_key: &str,
        template: &str,
        data: &Value,
        lang: &str,
    ) -> anyhow::Result<()>;
}

/// Default mailer: logs the send instead of delivering anything. Stands in
/// until an SMTP/provider-backed implementation is wired up.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        to: &str,
        subject_key: &str,
        template: &str,
        _data: &Value,
        lang: &str,
    ) -> anyhow::Result<()> {
        tracing::info!(to, subject_key, template, lang, "mail send (log only)");
        Ok(())
    }
}

/// Spawn a best-effort send; failures are logged and dropped.
pub fn send_detached(
    mailer: std::sync::Arc<dyn Mailer>,
    to: String,
    subject_key: &'static str,
    template: &'static str,
    data: Value,
    lang: String,
) {
    tokio::spawn(async move {
        if let Err(e) = mailer.send(&to, subject_key, template, &data, &lang).await {
            tracing::warn!(to, template, error = %e, "mail delivery failed");
        }
    });
}
