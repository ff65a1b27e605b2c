use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use crate::bills::{self, NewBill};
use crate::error::AppError;
use crate::rest::with_session_cookie;
use crate::storage::BillRow;
use crate::AppContext;

const BILL_TOOL: &str = "bill";

fn bill_json(bill: &BillRow) -> serde_json::Value {
    json!({
        "id": bill.id,
        "bill_name": bill.bill_name,
        "amount": bill.amount,
        "due_date": bill.due_date,
        "frequency": bill.frequency,
        "category": bill.category,
        "status": bill.status,
        "reminder_days": bill.reminder_days,
    })
}

pub async fn list_bills(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;
    ctx.usage_log.record(BILL_TOOL, &resolved.actor, "view").await;

    let rows = bills::list_bills(&ctx.storage, &resolved.actor).await?;
    let body = Json(json!({
        "bills": rows.iter().map(bill_json).collect::<Vec<_>>(),
    }))
    .into_response();
    Ok(with_session_cookie(body, &resolved, ctx.config.session_ttl_days))
}

pub async fn create_bill(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(new_bill): Json<NewBill>,
) -> Result<Response, AppError> {
    let resolved = ctx.identity.resolve(&headers).await;

    let response = match bills::add_bill(&ctx.storage, &resolved.actor, &new_bill).await {
        Ok(row) => {
            ctx.usage_log.record(BILL_TOOL, &resolved.actor, "submit_success").await;
            (StatusCode::CREATED, Json(bill_json(&row))).into_response()
        }
        Err(e) => {
            ctx.usage_log.record(BILL_TOOL, &resolved.actor, "submit_error").await;
            return Err(e);
        }
    };
    Ok(with_session_cookie(response, &resolved, ctx.config.session_ttl_days))
}
