//! Signup, signin, signout and profile. Signing in binds the current
//! session token to the account so later requests resolve as that account;
//! signing out unbinds it but keeps the token for analytics continuity.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth;
use crate::error::AppError;
use crate::identity::Actor;
use crate::rest::with_session_cookie;
use crate::storage::AccountRow;
use crate::AppContext;

const AUTH_TOOL: &str = "auth";

#[derive(Debug, Deserialize)]
pub struct SignupBody {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninBody {
    pub email: String,
    pub password: String,
}

fn profile_json(account: &AccountRow, direct_referrals: i64, base_url: &str) -> serde_json::Value {
    json!({
        "id": account.id,
        "username": account.username,
        "email": account.email,
        "lang": account.lang,
        "is_admin": account.is_admin,
        "referral_code": account.referral_code,
        "referral_link": auth::referral_link(base_url, &account.referral_code),
        "referred_by": account.referred_by,
        "direct_referrals": direct_referrals,
    })
}

pub async fn signup(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<SignupBody>,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;

    let request = auth::SignupRequest {
        username: body.username,
        email: body.email,
        password: body.password,
        lang: resolved.lang.clone(),
        referral_code: body.referral_code,
    };
    let account =
        auth::signup(&ctx.storage, ctx.hasher.as_ref(), &request, ctx.config.referral_limit)
            .await?;

    let token = resolved.actor.session_token().to_string();
    ctx.storage
        .bind_session_account(&token, account.id, ctx.config.session_ttl_days)
        .await?;

    // The register event is recorded against the pre-signup (anonymous)
    // actor so session conversion analytics can see the transition.
    ctx.usage_log.record(AUTH_TOOL, &resolved.actor, "register").await;

    let body =
        (StatusCode::CREATED, Json(profile_json(&account, 0, &ctx.config.base_url))).into_response();
    Ok(with_session_cookie(body, &resolved, ctx.config.session_ttl_days))
}

pub async fn signin(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<SigninBody>,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;

    let account = auth::signin(&ctx.storage, ctx.hasher.as_ref(), &body.email, &body.password)
        .await
        .inspect_err(|_| {
            tracing::warn!(session = resolved.actor.session_token(), "failed signin attempt");
        })?;

    let token = resolved.actor.session_token().to_string();
    ctx.storage
        .bind_session_account(&token, account.id, ctx.config.session_ttl_days)
        .await?;

    let actor = Actor::Account { id: account.id, session_token: token };
    ctx.usage_log.record(AUTH_TOOL, &actor, "login").await;

    let referrals = ctx.storage.count_direct_referrals(account.id).await?;
    let body = Json(profile_json(&account, referrals, &ctx.config.base_url)).into_response();
    Ok(with_session_cookie(body, &resolved, ctx.config.session_ttl_days))
}

pub async fn signout(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;
    if let Actor::Account { .. } = &resolved.actor {
        ctx.storage
            .clear_session_account(resolved.actor.session_token())
            .await?;
        ctx.usage_log.record(AUTH_TOOL, &resolved.actor, "logout").await;
    }
    let body = StatusCode::NO_CONTENT.into_response();
    Ok(with_session_cookie(body, &resolved, ctx.config.session_ttl_days))
}

pub async fn profile(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;
    let Actor::Account { id, .. } = resolved.actor else {
        return Err(AppError::Unauthorized);
    };
    let account = ctx.storage.get_account(id).await?.ok_or(AppError::Unauthorized)?;
    let referred = ctx.storage.list_direct_referrals(account.id).await?;

    let mut profile = profile_json(&account, referred.len() as i64, &ctx.config.base_url);
    profile["referrals"] = referred
        .iter()
        .map(|r| json!({ "username": r.username, "joined_at": r.created_at }))
        .collect();
    let body = Json(profile).into_response();
    Ok(with_session_cookie(body, &resolved, ctx.config.session_ttl_days))
}
