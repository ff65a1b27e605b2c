use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::AppError;
use crate::learning;
use crate::rest::with_session_cookie;
use crate::AppContext;

const LEARNING_TOOL: &str = "learning_hub";

#[derive(Debug, Deserialize)]
pub struct QuizBody {
    pub score: f64,
}

pub async fn overview(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;
    ctx.usage_log.record(LEARNING_TOOL, &resolved.actor, "view").await;

    let courses = learning::progress_overview(&ctx.storage, &resolved.actor).await?;
    let body = Json(json!({ "courses": courses, "lang": resolved.lang })).into_response();
    Ok(with_session_cookie(body, &resolved, ctx.config.session_ttl_days))
}

pub async fn complete_lesson(
    State(ctx): State<Arc<AppContext>>,
    Path((course, lesson)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;

    let response =
        match learning::complete_lesson(&ctx.storage, &resolved.actor, &course, &lesson).await {
            Ok(progress) => {
                ctx.usage_log.record(LEARNING_TOOL, &resolved.actor, "lesson_complete").await;
                Json(progress).into_response()
            }
            Err(e) => {
                ctx.usage_log.record(LEARNING_TOOL, &resolved.actor, "submit_error").await;
                return Err(e);
            }
        };
    Ok(with_session_cookie(response, &resolved, ctx.config.session_ttl_days))
}

pub async fn record_quiz(
    State(ctx): State<Arc<AppContext>>,
    Path((course, lesson)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<QuizBody>,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;

    match learning::record_quiz_score(&ctx.storage, &resolved.actor, &course, &lesson, body.score)
        .await
    {
        Ok(()) => {
            ctx.usage_log.record(LEARNING_TOOL, &resolved.actor, "quiz_complete").await;
        }
        Err(e) => {
            ctx.usage_log.record(LEARNING_TOOL, &resolved.actor, "submit_error").await;
            return Err(e);
        }
    }
    let response = Json(json!({ "course": course, "lesson": lesson, "score": body.score }))
        .into_response();
    Ok(with_session_cookie(response, &resolved, ctx.config.session_ttl_days))
}
