//! Admin analytics endpoints. Every route requires a signed-in admin
//! account; filters are shared between the JSON drill-down and the CSV
//! export so both always see the same row set.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::analytics::EventFilter;
use crate::error::AppError;
use crate::identity::Actor;
use crate::AppContext;

#[derive(Debug, Default, Deserialize)]
pub struct UsageQuery {
    pub tool_name: Option<String>,
    pub action: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub end_date: Option<String>,
}

async fn require_admin(ctx: &AppContext, headers: &HeaderMap) -> Result<(), AppError> {
    let resolved = ctx.identity.resolve(headers).await;
    let Actor::Account { id, .. } = resolved.actor else {
        return Err(AppError::Unauthorized);
    };
    let account = ctx.storage.get_account(id).await?.ok_or(AppError::Unauthorized)?;
    if !account.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn parse_date(field: &str, value: &Option<String>) -> Result<Option<NaiveDate>, AppError> {
    match value {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                let mut errors = BTreeMap::new();
                errors.insert(field.to_string(), format!("{field}_invalid"));
                AppError::Validation(errors)
            }),
    }
}

fn to_filter(query: &UsageQuery) -> Result<EventFilter, AppError> {
    Ok(EventFilter {
        tool_name: query.tool_name.clone().filter(|s| !s.is_empty()),
        action: query.action.clone().filter(|s| !s.is_empty()),
        start_date: parse_date("start_date", &query.start_date)?,
        end_date: parse_date("end_date", &query.end_date)?,
    })
}

pub async fn overview(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    require_admin(&ctx, &headers).await?;
    let metrics = ctx
        .analytics
        .overview(ctx.config.analytics_window_days as u32)
        .await?;
    Ok(Json(metrics).into_response())
}

pub async fn usage(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(query): Query<UsageQuery>,
) -> Result<Response, AppError> {
    require_admin(&ctx, &headers).await?;
    let filter = to_filter(&query)?;
    let (events, daily) = ctx
        .analytics
        .filtered(&filter, ctx.config.analytics_window_days as u32)
        .await?;
    Ok(Json(json!({ "events": events, "daily": daily })).into_response())
}

pub async fn usage_csv(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(query): Query<UsageQuery>,
) -> Result<Response, AppError> {
    require_admin(&ctx, &headers).await?;
    let filter = to_filter(&query)?;
    let csv = ctx.analytics.export_csv(&filter).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"usage_events.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_dates_are_field_errors() {
        let query = UsageQuery {
            start_date: Some("30-08-2026".to_string()),
            ..UsageQuery::default()
        };
        assert!(matches!(to_filter(&query), Err(AppError::Validation(_))));
    }

    #[test]
    fn empty_filter_params_are_dropped() {
        let query = UsageQuery {
            tool_name: Some(String::new()),
            action: Some("view".to_string()),
            ..UsageQuery::default()
        };
        let filter = to_filter(&query).unwrap();
        assert_eq!(filter.tool_name, None);
        assert_eq!(filter.action.as_deref(), Some("view"));
    }
}
