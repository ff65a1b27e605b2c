//! Append-only usage event log.
//!
//! Every wizard step transition and auth lifecycle action lands here as one
//! immutable `usage_events` row — the sole input to the analytics layer.
//! Writes go through their own pool connection, decoupled from any caller
//! transaction: a logging failure is reported at WARN and never propagated,
//! so it cannot roll back the primary operation.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::identity::Actor;

pub struct UsageLog {
    pool: SqlitePool,
}

impl UsageLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one usage event on behalf of `actor`. Best-effort: errors are
    /// logged with structured context and swallowed.
    pub async fn record(&self, tool_name: &str, actor: &Actor, action: &str) {
        if let Err(e) = self.try_record(tool_name, actor, action).await {
            tracing::warn!(
                err = %e,
                tool = tool_name,
                action = action,
                session = actor.session_token(),
                "usage event write failed"
            );
        }
    }

    async fn try_record(&self, tool_name: &str, actor: &Actor, action: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_events (id, tool_name, account_id, session_token, action, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(tool_name)
        .bind(actor.account_id())
        .bind(actor.session_token())
        .bind(action)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
