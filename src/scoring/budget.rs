//! Budget surplus planner.

use super::ScoreError;
use crate::wizard::fields::Fields;
use serde::{Deserialize, Serialize};

pub const BADGE_SURPLUS_SAVER: &str = "surplus_saver";
pub const BADGE_GOAL_SETTER: &str = "goal_setter";
pub const BADGE_LEAN_SPENDER: &str = "lean_spender";

pub const VARIABLE_CATEGORIES: &[&str] =
    &["housing", "food", "transport", "dependents", "miscellaneous", "others"];

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetInputs {
    pub income: f64,
    pub fixed_expenses: f64,
    pub savings_goal: f64,
    /// `(category, amount)` pairs in declaration order.
    pub variable: Vec<(String, f64)>,
}

impl BudgetInputs {
    pub fn from_fields(fields: &Fields) -> Self {
        BudgetInputs {
            income: fields.number("income"),
            fixed_expenses: fields.number("fixed_expenses"),
            savings_goal: fields.number("savings_goal"),
            variable: VARIABLE_CATEGORIES
                .iter()
                .map(|c| (c.to_string(), fields.number(c)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPlan {
    pub income: f64,
    pub fixed_expenses: f64,
    pub variable_expenses: f64,
    pub savings_goal: f64,
    pub surplus_deficit: f64,
    pub categories: Vec<CategoryLine>,
    pub status: String,
    pub badges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryLine {
    pub name: String,
    pub amount: f64,
    pub share_of_income: f64,
}

/// Surplus after fixed costs, variable categories and the savings goal.
pub fn plan(inputs: &BudgetInputs) -> Result<BudgetPlan, ScoreError> {
    if inputs.income <= 0.0 {
        return Err(ScoreError::Precondition {
            field: "income",
            message: "budget_income_positive_required",
        });
    }

    let variable_expenses: f64 = inputs.variable.iter().map(|(_, v)| v).sum();
    let surplus_deficit =
        inputs.income - inputs.fixed_expenses - variable_expenses - inputs.savings_goal;

    let categories = inputs
        .variable
        .iter()
        .map(|(name, amount)| CategoryLine {
            name: name.clone(),
            amount: *amount,
            share_of_income: amount / inputs.income * 100.0,
        })
        .collect();

    let spend_ratio = (inputs.fixed_expenses + variable_expenses) / inputs.income * 100.0;
    let status = if surplus_deficit >= 0.0 && spend_ratio <= 70.0 {
        "on_track"
    } else if surplus_deficit >= 0.0 {
        "tight"
    } else {
        "over_budget"
    };

    let mut badges = Vec::new();
    if surplus_deficit > 0.0 {
        badges.push(BADGE_SURPLUS_SAVER.to_string());
    }
    if inputs.savings_goal > 0.0 && surplus_deficit >= 0.0 {
        badges.push(BADGE_GOAL_SETTER.to_string());
    }
    if spend_ratio <= 50.0 {
        badges.push(BADGE_LEAN_SPENDER.to_string());
    }

    Ok(BudgetPlan {
        income: inputs.income,
        fixed_expenses: inputs.fixed_expenses,
        variable_expenses,
        savings_goal: inputs.savings_goal,
        surplus_deficit,
        categories,
        status: status.to_string(),
        badges,
    })
}
