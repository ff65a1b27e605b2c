//! Net worth summary.

use crate::wizard::fields::Fields;
use serde::{Deserialize, Serialize};

pub const BADGE_WEALTH_BUILDER: &str = "wealth_builder";
pub const BADGE_DEBT_FREE: &str = "debt_free";
pub const BADGE_PROPERTY_OWNER: &str = "property_owner";

#[derive(Debug, Clone, PartialEq)]
pub struct NetWorthInputs {
    pub cash_savings: f64,
    pub investments: f64,
    pub property: f64,
    pub loans: f64,
}

impl NetWorthInputs {
    pub fn from_fields(fields: &Fields) -> Self {
        NetWorthInputs {
            cash_savings: fields.number("cash_savings"),
            investments: fields.number("investments"),
            property: fields.number("property"),
            loans: fields.number("loans"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetWorthSummary {
    pub cash_savings: f64,
    pub investments: f64,
    pub property: f64,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub net_worth: f64,
    pub status: String,
    pub badges: Vec<String>,
}

/// Assets minus liabilities. All inputs default to zero, so there is no
/// precondition here; an all-zero submission is a legitimate zero net worth.
pub fn summarize(inputs: &NetWorthInputs) -> NetWorthSummary {
    let total_assets = inputs.cash_savings + inputs.investments + inputs.property;
    let total_liabilities = inputs.loans;
    let net_worth = total_assets - total_liabilities;

    let status = if net_worth > 0.0 {
        "positive"
    } else if net_worth == 0.0 {
        "break_even"
    } else {
        "negative"
    };

    let mut badges = Vec::new();
    if net_worth > 0.0 {
        badges.push(BADGE_WEALTH_BUILDER.to_string());
    }
    if total_liabilities == 0.0 {
        badges.push(BADGE_DEBT_FREE.to_string());
    }
    if inputs.property > 0.0 {
        badges.push(BADGE_PROPERTY_OWNER.to_string());
    }

    NetWorthSummary {
        cash_savings: inputs.cash_savings,
        investments: inputs.investments,
        property: inputs.property,
        total_assets,
        total_liabilities,
        net_worth,
        status: status.to_string(),
        badges,
    }
}
