// rest/mod.rs — HTTP JSON API server.
//
// Endpoints:
//   GET       /api/v1/health
//   GET|POST  /api/v1/tools/{tool}/steps/{step}
//   GET       /api/v1/tools/{tool}/dashboard
//   GET       /api/v1/dashboard
//   POST      /api/v1/auth/signup | signin | signout
//   GET       /api/v1/auth/profile
//   GET|POST  /api/v1/bills
//   GET       /api/v1/learning
//   POST      /api/v1/learning/{course}/lessons/{lesson}/complete
//   POST      /api/v1/learning/{course}/lessons/{lesson}/quiz
//   POST      /api/v1/feedback
//   GET       /api/v1/admin/overview | usage | usage.csv

pub mod routes;

use anyhow::Result;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::identity::Resolved;
use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        // Wizards
        .route(
            "/api/v1/tools/{tool}/steps/{step}",
            get(routes::wizard::get_step).post(routes::wizard::submit_step),
        )
        .route(
            "/api/v1/tools/{tool}/dashboard",
            get(routes::dashboard::tool_dashboard),
        )
        .route("/api/v1/dashboard", get(routes::dashboard::overview))
        // Auth
        .route("/api/v1/auth/signup", post(routes::auth::signup))
        .route("/api/v1/auth/signin", post(routes::auth::signin))
        .route("/api/v1/auth/signout", post(routes::auth::signout))
        .route("/api/v1/auth/profile", get(routes::auth::profile))
        // Bills
        .route(
            "/api/v1/bills",
            get(routes::bills::list_bills).post(routes::bills::create_bill),
        )
        // Learning hub
        .route("/api/v1/learning", get(routes::learning::overview))
        .route(
            "/api/v1/learning/{course}/lessons/{lesson}/complete",
            post(routes::learning::complete_lesson),
        )
        .route(
            "/api/v1/learning/{course}/lessons/{lesson}/quiz",
            post(routes::learning::record_quiz),
        )
        // Feedback
        .route("/api/v1/feedback", post(routes::feedback::submit))
        // Admin analytics
        .route("/api/v1/admin/overview", get(routes::admin::overview))
        .route("/api/v1/admin/usage", get(routes::admin::usage))
        .route("/api/v1/admin/usage.csv", get(routes::admin::usage_csv))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Attach the `Set-Cookie` for a freshly minted session token, when one was
/// minted this request.
pub(crate) fn with_session_cookie(
    mut response: Response,
    resolved: &Resolved,
    ttl_days: i64,
) -> Response {
    if let Some(cookie) = resolved.set_cookie(ttl_days) {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// 303 redirect used by wizard step flows.
pub(crate) fn see_other(location: String) -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
}
