//! Dashboards: per-tool latest result (with cross-actor comparison for
//! scored tools) and an overview across every tool.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::bills;
use crate::error::AppError;
use crate::learning;
use crate::rest::with_session_cookie;
use crate::scoring;
use crate::wizard::tools::Tool;
use crate::AppContext;

fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or(Value::Null)
}

pub async fn tool_dashboard(
    State(ctx): State<Arc<AppContext>>,
    Path(tool_name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tool = Tool::parse(&tool_name).ok_or(AppError::NotFound)?;
    let resolved = ctx.identity.resolve(&headers).await;
    ctx.usage_log.record(tool.as_str(), &resolved.actor, "dashboard_view").await;

    let actor_key = resolved.actor.key();
    let latest = ctx.storage.latest_result(&actor_key, tool.as_str()).await?;
    let history = ctx.storage.list_results(&actor_key, tool.as_str()).await?;

    // Cross-actor comparison for tools with a headline score: mean score and
    // the actor's rank among all completed runs.
    let mut rank = 0usize;
    let mut total_runs = 0usize;
    let comparison = match &latest {
        Some(row) if row.score.is_some() => {
            let user_score = row.score.unwrap_or(0.0);
            let all = ctx.storage.all_scores(tool.as_str()).await?;
            if all.is_empty() {
                None
            } else {
                let average = all.iter().sum::<f64>() / all.len() as f64;
                rank = all.iter().filter(|s| **s > user_score).count() + 1;
                total_runs = all.len();
                Some(json!({
                    "average_score": average,
                    "rank": rank,
                    "total_runs": total_runs,
                }))
            }
        }
        _ => None,
    };

    // The health dashboard additionally carries rule-driven insight and tip
    // keys derived from the latest result's ratios and the actor's rank.
    let (insights, tips) = if tool == Tool::FinancialHealth {
        let parsed = latest
            .as_ref()
            .and_then(|r| serde_json::from_str::<scoring::health::HealthScore>(&r.payload).ok());
        (
            Some(scoring::health::insights(parsed.as_ref(), rank, total_runs)),
            Some(scoring::health::TIPS.to_vec()),
        )
    } else {
        (None, None)
    };

    let body = Json(json!({
        "tool": tool.as_str(),
        "latest": latest.as_ref().map(|r| parse_payload(&r.payload)),
        "completed_at": latest.as_ref().map(|r| r.created_at.clone()),
        "completed_runs": history.len(),
        "comparison": comparison,
        "insights": insights,
        "tips": tips,
        "lang": resolved.lang,
    }))
    .into_response();
    Ok(with_session_cookie(body, &resolved, ctx.config.session_ttl_days))
}

pub async fn overview(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;
    let actor_key = resolved.actor.key();

    let mut tools = serde_json::Map::new();
    for tool in Tool::ALL {
        let latest = ctx.storage.latest_result(&actor_key, tool.as_str()).await?;
        tools.insert(
            tool.as_str().to_string(),
            match latest {
                Some(row) => json!({
                    "payload": parse_payload(&row.payload),
                    "score": row.score,
                    "completed_at": row.created_at,
                }),
                None => Value::Null,
            },
        );
    }

    let bills = bills::list_bills(&ctx.storage, &resolved.actor).await?;
    let courses = learning::progress_overview(&ctx.storage, &resolved.actor).await?;

    let body = Json(json!({
        "tools": tools,
        "bills": bills.iter().map(|b| json!({
            "bill_name": b.bill_name,
            "amount": b.amount,
            "due_date": b.due_date,
            "status": b.status,
        })).collect::<Vec<_>>(),
        "learning": courses,
        "lang": resolved.lang,
    }))
    .into_response();
    Ok(with_session_cookie(body, &resolved, ctx.config.session_ttl_days))
}
