//! Emergency fund target and savings projection.

use super::ScoreError;
use crate::wizard::fields::Fields;
use serde::{Deserialize, Serialize};

pub const BADGE_FUND_STARTER: &str = "fund_starter";
pub const BADGE_FUND_BUILDER: &str = "fund_builder";
pub const BADGE_ON_TRACK: &str = "on_track";

#[derive(Debug, Clone, PartialEq)]
pub struct FundInputs {
    pub monthly_expenses: f64,
    pub monthly_income: f64,
    pub current_savings: f64,
    pub dependents: i64,
    pub risk_tolerance_level: String,
    /// Months until the fund should be fully built.
    pub timeline: i64,
}

impl FundInputs {
    pub fn from_fields(fields: &Fields) -> Self {
        FundInputs {
            monthly_expenses: fields.number("monthly_expenses"),
            monthly_income: fields.number("monthly_income"),
            current_savings: fields.number("current_savings"),
            dependents: fields.count("dependents"),
            risk_tolerance_level: fields.text("risk_tolerance_level").to_string(),
            timeline: fields.count("timeline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundProjection {
    pub monthly_expenses: f64,
    pub current_savings: f64,
    pub dependents: i64,
    pub risk_tolerance_level: String,
    pub recommended_months: i64,
    pub target_amount: f64,
    pub gap: f64,
    pub timeline: i64,
    pub monthly_contribution: f64,
    /// Contribution as a share of monthly income; zero when income unknown.
    pub percent_of_income: f64,
    pub status: String,
    pub badges: Vec<String>,
}

/// Months of cover by risk appetite. Low tolerance wants the deepest
/// cushion; each dependent adds a month, capped at four extra.
fn recommended_months(risk: &str, dependents: i64) -> i64 {
    let base = match risk {
        "low" => 9,
        "high" => 3,
        _ => 6,
    };
    base + dependents.clamp(0, 4)
}

pub fn project(inputs: &FundInputs) -> Result<FundProjection, ScoreError> {
    if inputs.monthly_expenses <= 0.0 {
        return Err(ScoreError::Precondition {
            field: "monthly_expenses",
            message: "fund_expenses_positive_required",
        });
    }

    let months = recommended_months(&inputs.risk_tolerance_level, inputs.dependents);
    let target_amount = inputs.monthly_expenses * months as f64;
    let gap = (target_amount - inputs.current_savings).max(0.0);
    let timeline = inputs.timeline.max(1);
    let monthly_contribution = gap / timeline as f64;
    let percent_of_income = if inputs.monthly_income > 0.0 {
        monthly_contribution / inputs.monthly_income * 100.0
    } else {
        0.0
    };

    let status = if gap == 0.0 {
        "funded"
    } else if inputs.current_savings >= target_amount / 2.0 {
        "halfway"
    } else {
        "starting"
    };

    let mut badges = Vec::new();
    if inputs.current_savings > 0.0 {
        badges.push(BADGE_FUND_STARTER.to_string());
    }
    if inputs.current_savings >= target_amount / 2.0 {
        badges.push(BADGE_FUND_BUILDER.to_string());
    }
    if gap == 0.0 {
        badges.push(BADGE_ON_TRACK.to_string());
    }

    Ok(FundProjection {
        monthly_expenses: inputs.monthly_expenses,
        current_savings: inputs.current_savings,
        dependents: inputs.dependents,
        risk_tolerance_level: inputs.risk_tolerance_level.clone(),
        recommended_months: months,
        target_amount,
        gap,
        timeline,
        monthly_contribution,
        percent_of_income,
        status: status.to_string(),
        badges,
    })
}
