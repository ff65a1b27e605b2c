use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::AppError;
use crate::rest::with_session_cookie;
use crate::wizard::tools::Tool;
use crate::AppContext;

/// Surfaces feedback can be left about: the five wizards plus the
/// non-wizard tools and a general bucket.
const FEEDBACK_TARGETS: &[&str] = &["bill", "learning_hub", "general"];

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub tool_name: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

fn validate(body: &FeedbackBody) -> Result<(), AppError> {
    let mut errors = BTreeMap::new();
    let known = Tool::parse(&body.tool_name).is_some()
        || FEEDBACK_TARGETS.contains(&body.tool_name.as_str());
    if !known {
        errors.insert("tool_name".to_string(), "tool_name_invalid".to_string());
    }
    if !(1..=5).contains(&body.rating) {
        errors.insert("rating".to_string(), "rating_out_of_range".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

pub async fn submit(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<FeedbackBody>,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;
    validate(&body)?;

    ctx.storage
        .insert_feedback(
            resolved.actor.account_id(),
            resolved.actor.session_token(),
            &body.tool_name,
            body.rating,
            body.comment.as_deref(),
        )
        .await?;
    ctx.usage_log.record(&body.tool_name, &resolved.actor, "feedback").await;

    let response = StatusCode::CREATED.into_response();
    Ok(with_session_cookie(response, &resolved, ctx.config.session_ttl_days))
}
