//! Analytics data models — serialisable types returned by the admin endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Overview ─────────────────────────────────────────────────────────────────

/// Top-level admin overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewMetrics {
    pub total_accounts: u64,
    pub new_accounts_24h: u64,
    pub total_referrals: u64,
    pub new_referrals_24h: u64,

    /// `referrals / total_accounts * 100`; 0.0 when there are no accounts.
    pub referral_conversion_rate: f64,

    pub total_tool_events: u64,

    /// Top 3 tools by event count, each with its top 5 action breakdown.
    pub top_tools: Vec<ToolBreakdown>,

    /// Share of sessions that touched more than one distinct tool, as a
    /// percentage of all sessions that touched any tool.
    pub multi_tool_ratio: f64,

    /// Share of anonymous sessions that later logged a successful register
    /// event, as a percentage of all anonymous sessions seen.
    pub anon_conversion_rate: f64,

    /// Mean feedback rating, `None` until any feedback exists.
    pub avg_feedback_rating: Option<f64>,

    /// One bucket per calendar day across the window, zero-filled.
    pub daily_events: Vec<DailyCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolBreakdown {
    pub tool_name: String,
    pub events: u64,
    pub top_actions: Vec<ActionCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCount {
    pub action: String,
    pub count: u64,
}

// ─── Daily Count ──────────────────────────────────────────────────────────────

/// A (date, count) pair used in time-series data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    /// ISO 8601 calendar date, e.g. `"2026-08-30"`.
    pub date: String,

    pub count: u64,
}

// ─── Filters ──────────────────────────────────────────────────────────────────

/// Drill-down filter shared by the filtered-events and CSV-export endpoints
/// so both always see the same row set. Dates are inclusive calendar days.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub tool_name: Option<String>,
    pub action: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
