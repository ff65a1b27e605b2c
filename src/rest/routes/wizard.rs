//! Wizard step endpoints: GET renders the current draft state, POST submits
//! the step. Every path records a usage event (view, submit_success,
//! submit_error) so funnel analytics stay accurate.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::AppError;
use crate::notify;
use crate::rest::{see_other, with_session_cookie};
use crate::wizard::tools::Tool;
use crate::wizard::{self, StepOutcome};
use crate::AppContext;

fn parse_tool(name: &str) -> Result<Tool, AppError> {
    Tool::parse(name).ok_or(AppError::NotFound)
}

pub async fn get_step(
    State(ctx): State<Arc<AppContext>>,
    Path((tool_name, step)): Path<(String, u32)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tool = parse_tool(&tool_name)?;
    let spec = tool.wizard();
    let step_spec = spec.step(step).ok_or(AppError::NotFound)?;

    let resolved = ctx.identity.resolve(&headers).await;
    ctx.usage_log.record(tool.as_str(), &resolved.actor, "view").await;

    let draft = ctx
        .storage
        .get_draft(&resolved.actor.key(), tool.as_str(), step as i64)
        .await?;
    let fields: Value = match &draft {
        Some(row) => serde_json::from_str(&row.fields).unwrap_or(Value::Null),
        None => Value::Null,
    };

    let body = Json(json!({
        "tool": tool.as_str(),
        "step": step,
        "step_name": step_spec.name,
        "total_steps": spec.last_step(),
        "fields": fields,
        "lang": resolved.lang,
    }))
    .into_response();
    Ok(with_session_cookie(body, &resolved, ctx.config.session_ttl_days))
}

pub async fn submit_step(
    State(ctx): State<Arc<AppContext>>,
    Path((tool_name, step)): Path<(String, u32)>,
    headers: HeaderMap,
    Json(raw): Json<Map<String, Value>>,
) -> Result<Response, AppError> {
    let tool = parse_tool(&tool_name)?;
    let resolved = ctx.identity.resolve(&headers).await;
    let actor = &resolved.actor;

    // Captured before submission: the terminal step clears carry-over, and
    // the notification opt-in lives on an earlier step.
    let carried = ctx.carryover.merged(&actor.key(), tool);

    let outcome = wizard::upsert_step(&ctx.storage, &ctx.carryover, actor, tool, step, &raw).await;

    let response = match outcome {
        Ok(StepOutcome::Advanced { next_step }) => {
            ctx.usage_log.record(tool.as_str(), actor, "submit_success").await;
            see_other(format!("/api/v1/tools/{}/steps/{next_step}", tool.as_str()))
        }
        Ok(StepOutcome::Completed { result }) => {
            ctx.usage_log.record(tool.as_str(), actor, "submit_success").await;
            if carried.flag("send_email") && !carried.text("email").is_empty() {
                let payload: Value = serde_json::from_str(&result.payload).unwrap_or(Value::Null);
                notify::send_detached(
                    ctx.mailer.clone(),
                    carried.text("email").to_string(),
                    "tool_result_subject",
                    "tool_result",
                    json!({ "tool": tool.as_str(), "result": payload }),
                    resolved.lang.clone(),
                );
            }
            see_other(format!("/api/v1/tools/{}/dashboard", tool.as_str()))
        }
        Ok(StepOutcome::ValidationFailed { errors }) => {
            ctx.usage_log.record(tool.as_str(), actor, "submit_error").await;
            AppError::Validation(errors).into_response()
        }
        Ok(StepOutcome::OutOfOrder { redirect_to }) => {
            see_other(format!("/api/v1/tools/{}/steps/{redirect_to}", tool.as_str()))
        }
        Err(e) => {
            ctx.usage_log.record(tool.as_str(), actor, "submit_error").await;
            return Err(e);
        }
    };
    Ok(with_session_cookie(response, &resolved, ctx.config.session_ttl_days))
}
