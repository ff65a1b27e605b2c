//! Financial health score.

use super::ScoreError;
use crate::wizard::fields::Fields;
use serde::{Deserialize, Serialize};

pub const BADGE_FINANCIAL_STAR: &str = "financial_star";
pub const BADGE_DEBT_MANAGER: &str = "debt_manager";
pub const BADGE_SAVINGS_PRO: &str = "savings_pro";
pub const BADGE_INTEREST_FREE: &str = "interest_free";

/// Static tip keys shown alongside every health dashboard.
pub const TIPS: [&str; 4] = [
    "health_tip_track_expenses",
    "health_tip_ajo_savings",
    "health_tip_pay_debts",
    "health_tip_plan_expenses",
];

/// Ranking insights need at least this many completed runs to be meaningful.
const MIN_PEERS_FOR_RANKING: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct HealthInputs {
    pub income: f64,
    pub expenses: f64,
    pub debt: f64,
    pub interest_rate: f64,
}

impl HealthInputs {
    pub fn from_fields(fields: &Fields) -> Self {
        HealthInputs {
            income: fields.number("income"),
            expenses: fields.number("expenses"),
            debt: fields.number("debt"),
            interest_rate: fields.number("interest_rate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub income: f64,
    pub expenses: f64,
    pub debt: f64,
    pub interest_rate: f64,
    pub debt_to_income: f64,
    pub savings_rate: f64,
    pub interest_burden: f64,
    pub score: f64,
    pub status: String,
    pub badges: Vec<String>,
}

/// Derived ratios, a 0-100 score, a status tier and independent badges.
/// Income must be positive; a non-positive income is a terminal input
/// error, not a zero-score result.
pub fn score(inputs: &HealthInputs) -> Result<HealthScore, ScoreError> {
    if inputs.income <= 0.0 {
        return Err(ScoreError::Precondition {
            field: "income",
            message: "health_income_positive_required",
        });
    }

    let debt_to_income = inputs.debt / inputs.income * 100.0;
    let savings_rate = (inputs.income - inputs.expenses) / inputs.income * 100.0;
    let interest_burden = if inputs.debt > 0.0 {
        ((inputs.interest_rate * inputs.debt / 100.0) / 12.0) / inputs.income * 100.0
    } else {
        0.0
    };

    let mut raw = 100.0;
    raw -= debt_to_income.min(50.0);
    if savings_rate < 0.0 {
        raw -= savings_rate.abs().min(30.0);
    } else {
        raw += (savings_rate / 2.0).min(20.0);
    }
    raw -= interest_burden.min(20.0);
    let score = raw.round().clamp(0.0, 100.0);

    let status = if score >= 80.0 {
        "excellent"
    } else if score >= 60.0 {
        "good"
    } else {
        "needs_improvement"
    };

    let mut badges = Vec::new();
    if score >= 80.0 {
        badges.push(BADGE_FINANCIAL_STAR.to_string());
    }
    if debt_to_income < 20.0 {
        badges.push(BADGE_DEBT_MANAGER.to_string());
    }
    if savings_rate >= 20.0 {
        badges.push(BADGE_SAVINGS_PRO.to_string());
    }
    if inputs.debt > 0.0 && interest_burden == 0.0 {
        badges.push(BADGE_INTEREST_FREE.to_string());
    }

    Ok(HealthScore {
        income: inputs.income,
        expenses: inputs.expenses,
        debt: inputs.debt,
        interest_rate: inputs.interest_rate,
        debt_to_income,
        savings_rate,
        interest_burden,
        score,
        status: status.to_string(),
        badges,
    })
}

/// Translation keys for the dashboard insight list, driven by the latest
/// result's ratios and the actor's rank among all completed runs.
pub fn insights(latest: Option<&HealthScore>, rank: usize, total_runs: usize) -> Vec<&'static str> {
    let Some(result) = latest else {
        return vec!["health_insight_no_data"];
    };
    let mut out = Vec::new();
    if result.debt_to_income > 40.0 {
        out.push("health_insight_high_debt");
    }
    if result.savings_rate < 0.0 {
        out.push("health_insight_negative_savings");
    } else if result.savings_rate >= 20.0 {
        out.push("health_insight_good_savings");
    }
    if result.interest_burden > 10.0 {
        out.push("health_insight_high_interest");
    }
    if total_runs >= MIN_PEERS_FOR_RANKING {
        if rank as f64 <= total_runs as f64 * 0.1 {
            out.push("health_insight_top_10");
        } else if rank as f64 <= total_runs as f64 * 0.3 {
            out.push("health_insight_top_30");
        } else {
            out.push("health_insight_below_30");
        }
    } else {
        out.push("health_insight_not_enough_users");
    }
    out
}
