//! Pure result computation for completed wizards.
//!
//! No I/O: each engine takes validated fields and returns a typed result
//! which the wizard layer serializes into the result payload. Inputs that
//! make a computation meaningless (income ≤ 0, expenses ≤ 0) are terminal
//! preconditions, distinct from field validation, and nothing is persisted.

pub mod budget;
pub mod emergency_fund;
pub mod health;
pub mod net_worth;
pub mod quiz;

use crate::wizard::fields::Fields;
use crate::wizard::tools::Tool;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("{message}")]
    Precondition {
        field: &'static str,
        message: &'static str,
    },
}

/// A finished computation ready for persistence: the full JSON payload plus
/// the headline score column, when the tool has one.
#[derive(Debug, Clone)]
pub struct Computed {
    pub payload: serde_json::Value,
    pub score: Option<f64>,
}

fn finish<T: Serialize>(result: &T, score: Option<f64>) -> Computed {
    // Serializing our own result structs cannot fail.
    let payload = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);
    Computed { payload, score }
}

/// Dispatch the merged field map of a completed wizard to its engine.
pub fn compute(tool: Tool, fields: &Fields) -> Result<Computed, ScoreError> {
    match tool {
        Tool::FinancialHealth => {
            let result = health::score(&health::HealthInputs::from_fields(fields))?;
            let score = result.score;
            Ok(finish(&result, Some(score)))
        }
        Tool::Budget => {
            let result = budget::plan(&budget::BudgetInputs::from_fields(fields))?;
            Ok(finish(&result, None))
        }
        Tool::NetWorth => {
            let result = net_worth::summarize(&net_worth::NetWorthInputs::from_fields(fields));
            Ok(finish(&result, None))
        }
        Tool::EmergencyFund => {
            let result =
                emergency_fund::project(&emergency_fund::FundInputs::from_fields(fields))?;
            Ok(finish(&result, None))
        }
        Tool::Quiz => {
            let result = quiz::grade(&quiz::QuizInputs::from_fields(fields));
            let score = result.score;
            Ok(finish(&result, Some(score)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::fields::FieldValue;

    #[test]
    fn health_payload_carries_headline_score() {
        let mut fields = Fields::default();
        fields.insert("income", FieldValue::Number(100_000.0));
        fields.insert("expenses", FieldValue::Number(60_000.0));
        fields.insert("debt", FieldValue::Number(0.0));
        fields.insert("interest_rate", FieldValue::Number(0.0));
        let computed = compute(Tool::FinancialHealth, &fields).unwrap();
        assert_eq!(computed.score, Some(100.0));
        assert_eq!(computed.payload["status"], "excellent");
    }

    #[test]
    fn zero_income_is_a_precondition() {
        let mut fields = Fields::default();
        fields.insert("income", FieldValue::Number(0.0));
        fields.insert("expenses", FieldValue::Number(10.0));
        let err = compute(Tool::FinancialHealth, &fields).unwrap_err();
        assert!(matches!(err, ScoreError::Precondition { field: "income", .. }));
    }
}
