//! Analytics query layer — reads the usage_events, accounts and feedback
//! tables and shapes the aggregates the admin endpoints return.

use anyhow::{Context as _, Result};
use chrono::{Duration, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;

use super::model::{ActionCount, DailyCount, EventFilter, OverviewMetrics, ToolBreakdown};
use crate::storage::UsageEventRow;

/// Most rows a JSON drill-down response carries; the CSV export is uncapped.
pub const DRILL_DOWN_ROW_CAP: i64 = 100;

pub struct AnalyticsStorage {
    pool: SqlitePool,
}

impl AnalyticsStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ─── Overview ─────────────────────────────────────────────────────────────

    /// Compute the admin overview. The daily series covers the last
    /// `window_days` calendar days ending today, zero-filled.
    pub async fn overview(&self, window_days: u32) -> Result<OverviewMetrics> {
        let day_ago = (Utc::now() - Duration::hours(24)).to_rfc3339();

        let total_accounts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await
            .context("total accounts")?;
        let new_accounts_24h: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE created_at >= ?")
                .bind(&day_ago)
                .fetch_one(&self.pool)
                .await
                .context("new accounts")?;
        let total_referrals: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE referred_by IS NOT NULL")
                .fetch_one(&self.pool)
                .await
                .context("total referrals")?;
        let new_referrals_24h: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM accounts WHERE referred_by IS NOT NULL AND created_at >= ?",
        )
        .bind(&day_ago)
        .fetch_one(&self.pool)
        .await
        .context("new referrals")?;

        let referral_conversion_rate = if total_accounts > 0 {
            total_referrals as f64 / total_accounts as f64 * 100.0
        } else {
            0.0
        };

        let total_tool_events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usage_events")
            .fetch_one(&self.pool)
            .await
            .context("total events")?;

        let top_tools = self.top_tools().await?;
        let multi_tool_ratio = self.multi_tool_ratio().await?;
        let anon_conversion_rate = self.anon_conversion_rate().await?;

        let avg_feedback_rating: Option<f64> =
            sqlx::query_scalar("SELECT AVG(rating) FROM feedback")
                .fetch_one(&self.pool)
                .await
                .context("average feedback rating")?;

        let (start, end) = window_bounds(window_days);
        let daily_events = self.daily_series(&EventFilter::default(), start, end).await?;

        Ok(OverviewMetrics {
            total_accounts: total_accounts as u64,
            new_accounts_24h: new_accounts_24h as u64,
            total_referrals: total_referrals as u64,
            new_referrals_24h: new_referrals_24h as u64,
            referral_conversion_rate,
            total_tool_events: total_tool_events as u64,
            top_tools,
            multi_tool_ratio,
            anon_conversion_rate,
            avg_feedback_rating,
            daily_events,
        })
    }

    /// Top 3 tools by event count, each with its top 5 actions.
    async fn top_tools(&self) -> Result<Vec<ToolBreakdown>> {
        let tools: Vec<(String, i64)> = sqlx::query_as(
            "SELECT tool_name, COUNT(*) AS cnt
               FROM usage_events
           GROUP BY tool_name
           ORDER BY cnt DESC, tool_name ASC
              LIMIT 3",
        )
        .fetch_all(&self.pool)
        .await
        .context("top tools")?;

        let mut out = Vec::with_capacity(tools.len());
        for (tool_name, events) in tools {
            let actions: Vec<(String, i64)> = sqlx::query_as(
                "SELECT action, COUNT(*) AS cnt
                   FROM usage_events
                  WHERE tool_name = ?
               GROUP BY action
               ORDER BY cnt DESC, action ASC
                  LIMIT 5",
            )
            .bind(&tool_name)
            .fetch_all(&self.pool)
            .await
            .context("top actions")?;

            out.push(ToolBreakdown {
                tool_name,
                events: events as u64,
                top_actions: actions
                    .into_iter()
                    .map(|(action, count)| ActionCount { action, count: count as u64 })
                    .collect(),
            });
        }
        Ok(out)
    }

    /// Sessions touching more than one distinct tool over sessions touching
    /// any tool, as a percentage. 0.0 when no session has logged anything.
    async fn multi_tool_ratio(&self) -> Result<f64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT session_token) FROM usage_events")
                .fetch_one(&self.pool)
                .await
                .context("sessions touching any tool")?;
        if total == 0 {
            return Ok(0.0);
        }
        let multi: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (
                SELECT session_token
                  FROM usage_events
              GROUP BY session_token
                HAVING COUNT(DISTINCT tool_name) > 1
            )",
        )
        .fetch_one(&self.pool)
        .await
        .context("multi-tool sessions")?;
        Ok(multi as f64 / total as f64 * 100.0)
    }

    /// Anonymous sessions that later logged a register event, over all
    /// anonymous sessions seen, as a percentage.
    async fn anon_conversion_rate(&self) -> Result<f64> {
        let anon_seen: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT session_token) FROM usage_events WHERE account_id IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .context("anonymous sessions seen")?;
        if anon_seen == 0 {
            return Ok(0.0);
        }
        let converted: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT session_token)
               FROM usage_events
              WHERE action = 'register'
                AND session_token IN (
                    SELECT DISTINCT session_token FROM usage_events WHERE account_id IS NULL
                )",
        )
        .fetch_one(&self.pool)
        .await
        .context("converted sessions")?;
        Ok(converted as f64 / anon_seen as f64 * 100.0)
    }

    // ─── Drill-down ───────────────────────────────────────────────────────────

    /// Filtered event rows (newest first, at most [`DRILL_DOWN_ROW_CAP`])
    /// plus a zero-filled daily series over the filter's date range,
    /// defaulting to the last `window_days` days.
    pub async fn filtered(
        &self,
        filter: &EventFilter,
        window_days: u32,
    ) -> Result<(Vec<UsageEventRow>, Vec<DailyCount>)> {
        let rows = self.filtered_rows(filter, Some(DRILL_DOWN_ROW_CAP)).await?;
        let (default_start, default_end) = window_bounds(window_days);
        let start = filter.start_date.unwrap_or(default_start);
        let end = filter.end_date.unwrap_or(default_end);
        let series = self.daily_series(filter, start, end).await?;
        Ok((rows, series))
    }

    /// CSV export over the identical filter logic as [`Self::filtered`]: one
    /// row per matching event, `actor` is the account id or `"anonymous"`.
    pub async fn export_csv(&self, filter: &EventFilter) -> Result<String> {
        let rows = self.filtered_rows(filter, None).await?;
        let mut out = String::from("id,actor,session_token,tool_name,action,timestamp\n");
        for row in rows {
            let actor = row
                .account_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "anonymous".to_string());
            for (i, field) in [
                row.id.as_str(),
                &actor,
                &row.session_token,
                &row.tool_name,
                &row.action,
                &row.created_at,
            ]
            .into_iter()
            .enumerate()
            {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&csv_field(field));
            }
            out.push('\n');
        }
        Ok(out)
    }

    async fn filtered_rows(
        &self,
        filter: &EventFilter,
        cap: Option<i64>,
    ) -> Result<Vec<UsageEventRow>> {
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM usage_events WHERE 1=1");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(cap) = cap {
            qb.push(" LIMIT ").push_bind(cap);
        }
        Ok(qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("filtered events")?)
    }

    async fn daily_series(
        &self,
        filter: &EventFilter,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyCount>> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT date(created_at) AS day, COUNT(*) AS cnt FROM usage_events WHERE 1=1",
        );
        push_filter(&mut qb, filter);
        qb.push(" AND created_at >= ").push_bind(start.to_string());
        qb.push(" AND created_at < ")
            .push_bind((end + Duration::days(1)).to_string());
        qb.push(" GROUP BY day");
        let rows: Vec<(String, i64)> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("daily event counts")?;
        let counts: HashMap<String, i64> = rows.into_iter().collect();
        Ok(zero_filled(start, end, &counts))
    }
}

/// Append the drill-down predicates shared by row, series and CSV queries.
/// Timestamps are RFC 3339 text, so plain `YYYY-MM-DD` bounds compare
/// correctly: the end bound is the day after the inclusive end date.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &EventFilter) {
    if let Some(tool) = &filter.tool_name {
        qb.push(" AND tool_name = ").push_bind(tool.clone());
    }
    if let Some(action) = &filter.action {
        qb.push(" AND action = ").push_bind(action.clone());
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND created_at >= ").push_bind(start.to_string());
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND created_at < ")
            .push_bind((end + Duration::days(1)).to_string());
    }
}

/// Window of `window_days` calendar days ending today (UTC).
fn window_bounds(window_days: u32) -> (NaiveDate, NaiveDate) {
    let end = Utc::now().date_naive();
    let start = end - Duration::days(window_days.max(1) as i64 - 1);
    (start, end)
}

/// One bucket per day from `start` through `end` inclusive. Days with no
/// events appear as 0 so chart series stay aligned to label count.
fn zero_filled(start: NaiveDate, end: NaiveDate, counts: &HashMap<String, i64>) -> Vec<DailyCount> {
    let mut out = Vec::new();
    let mut day = start;
    while day <= end {
        let key = day.to_string();
        let count = counts.get(&key).copied().unwrap_or(0).max(0) as u64;
        out.push(DailyCount { date: key, count });
        day += Duration::days(1);
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
