//! Bill tracker: record recurring bills and derive their due status.

use crate::error::AppError;
use crate::identity::Actor;
use crate::storage::{BillRow, Storage};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const FREQUENCIES: &[&str] = &["one_time", "weekly", "monthly", "quarterly", "yearly"];
pub const CATEGORIES: &[&str] =
    &["utilities", "rent", "school_fees", "food", "transport", "subscriptions", "other"];

/// Days before the due date at which a bill counts as due soon.
pub const DUE_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, Deserialize)]
pub struct NewBill {
    pub bill_name: String,
    pub amount: serde_json::Value,
    pub due_date: String,
    pub frequency: String,
    pub category: String,
    pub reminder_days: Option<i64>,
}

fn parse_amount(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

fn validate(bill: &NewBill) -> Result<(f64, NaiveDate), AppError> {
    let mut errors = BTreeMap::new();

    if bill.bill_name.trim().is_empty() {
        errors.insert("bill_name".to_string(), "bill_name_required".to_string());
    }
    let amount = match parse_amount(&bill.amount) {
        Some(a) if a.is_finite() && a >= 0.0 => a,
        _ => {
            errors.insert("amount".to_string(), "amount_invalid".to_string());
            0.0
        }
    };
    let due = match NaiveDate::parse_from_str(bill.due_date.trim(), "%Y-%m-%d") {
        Ok(d) => d,
        Err(_) => {
            errors.insert("due_date".to_string(), "due_date_invalid".to_string());
            NaiveDate::MIN
        }
    };
    if !FREQUENCIES.contains(&bill.frequency.as_str()) {
        errors.insert("frequency".to_string(), "frequency_invalid".to_string());
    }
    if !CATEGORIES.contains(&bill.category.as_str()) {
        errors.insert("category".to_string(), "category_invalid".to_string());
    }

    if errors.is_empty() {
        Ok((amount, due))
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Status derived from the due date relative to today (UTC).
pub fn status_for(due: NaiveDate, today: NaiveDate) -> &'static str {
    let days = (due - today).num_days();
    if days < 0 {
        "overdue"
    } else if days <= DUE_SOON_DAYS {
        "due_soon"
    } else {
        "upcoming"
    }
}

pub async fn add_bill(
    storage: &Storage,
    actor: &Actor,
    bill: &NewBill,
) -> Result<BillRow, AppError> {
    let (amount, due) = validate(bill)?;
    let status = status_for(due, Utc::now().date_naive());
    Ok(storage
        .insert_bill(
            &actor.key(),
            actor.account_id(),
            actor.session_token(),
            bill.bill_name.trim(),
            amount,
            &due.to_string(),
            &bill.frequency,
            &bill.category,
            status,
            bill.reminder_days,
        )
        .await?)
}

/// Bills for this actor, due soonest first, with status recomputed against
/// today rather than trusted from the stored row.
pub async fn list_bills(storage: &Storage, actor: &Actor) -> Result<Vec<BillRow>, AppError> {
    let today = Utc::now().date_naive();
    let mut bills = storage.list_bills(&actor.key()).await?;
    for bill in &mut bills {
        if let Ok(due) = NaiveDate::parse_from_str(&bill.due_date, "%Y-%m-%d") {
            bill.status = status_for(due, today).to_string();
        }
    }
    Ok(bills)
}
