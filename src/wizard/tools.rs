//! Static wizard definitions for the five tools.

use super::fields::{FieldKind, FieldSpec, StepSpec};

pub const YES_NO: &[&str] = &["yes", "no"];
pub const USER_TYPES: &[&str] = &["individual", "business"];
pub const RISK_LEVELS: &[&str] = &["low", "medium", "high"];

/// Number of yes/no questions in the money-personality quiz.
pub const QUIZ_QUESTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    FinancialHealth,
    Budget,
    NetWorth,
    EmergencyFund,
    Quiz,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::FinancialHealth,
        Tool::Budget,
        Tool::NetWorth,
        Tool::EmergencyFund,
        Tool::Quiz,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::FinancialHealth => "financial_health",
            Tool::Budget => "budget",
            Tool::NetWorth => "net_worth",
            Tool::EmergencyFund => "emergency_fund",
            Tool::Quiz => "quiz",
        }
    }

    pub fn parse(name: &str) -> Option<Tool> {
        Tool::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    pub fn wizard(&self) -> &'static WizardSpec {
        match self {
            Tool::FinancialHealth => &FINANCIAL_HEALTH,
            Tool::Budget => &BUDGET,
            Tool::NetWorth => &NET_WORTH,
            Tool::EmergencyFund => &EMERGENCY_FUND,
            Tool::Quiz => &QUIZ,
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct WizardSpec {
    pub tool: &'static str,
    pub steps: &'static [StepSpec],
}

impl WizardSpec {
    pub fn step(&self, number: u32) -> Option<&'static StepSpec> {
        self.steps.iter().find(|s| s.number == number)
    }

    pub fn last_step(&self) -> u32 {
        self.steps.len() as u32
    }
}

const fn req(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind, required: true }
}

const fn opt(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind, required: false }
}

pub static FINANCIAL_HEALTH: WizardSpec = WizardSpec {
    tool: "financial_health",
    steps: &[
        StepSpec {
            number: 1,
            name: "personal_info",
            fields: &[
                req("first_name", FieldKind::Text),
                opt("email", FieldKind::Email),
                opt("user_type", FieldKind::Choice(USER_TYPES)),
                opt("send_email", FieldKind::Flag),
            ],
            email_opt_in: Some(("send_email", "email")),
        },
        StepSpec {
            number: 2,
            name: "income_expenses",
            fields: &[
                req("income", FieldKind::Money),
                req("expenses", FieldKind::Money),
            ],
            email_opt_in: None,
        },
        StepSpec {
            number: 3,
            name: "debt_interest",
            fields: &[
                opt("debt", FieldKind::Money),
                opt("interest_rate", FieldKind::Rate),
            ],
            email_opt_in: None,
        },
    ],
};

pub static BUDGET: WizardSpec = WizardSpec {
    tool: "budget",
    steps: &[
        StepSpec {
            number: 1,
            name: "income",
            fields: &[
                req("income", FieldKind::Money),
                opt("savings_goal", FieldKind::Money),
            ],
            email_opt_in: None,
        },
        StepSpec {
            number: 2,
            name: "expenses",
            fields: &[
                req("fixed_expenses", FieldKind::Money),
                opt("housing", FieldKind::Money),
                opt("food", FieldKind::Money),
                opt("transport", FieldKind::Money),
                opt("dependents", FieldKind::Money),
                opt("miscellaneous", FieldKind::Money),
                opt("others", FieldKind::Money),
            ],
            email_opt_in: None,
        },
    ],
};

pub static NET_WORTH: WizardSpec = WizardSpec {
    tool: "net_worth",
    steps: &[
        StepSpec {
            number: 1,
            name: "assets",
            fields: &[
                opt("cash_savings", FieldKind::Money),
                opt("investments", FieldKind::Money),
                opt("property", FieldKind::Money),
            ],
            email_opt_in: None,
        },
        StepSpec {
            number: 2,
            name: "liabilities",
            fields: &[opt("loans", FieldKind::Money)],
            email_opt_in: None,
        },
    ],
};

pub static EMERGENCY_FUND: WizardSpec = WizardSpec {
    tool: "emergency_fund",
    steps: &[
        StepSpec {
            number: 1,
            name: "situation",
            fields: &[
                req("monthly_expenses", FieldKind::Money),
                opt("monthly_income", FieldKind::Money),
                opt("current_savings", FieldKind::Money),
                opt("dependents", FieldKind::Count { min: 0 }),
            ],
            email_opt_in: None,
        },
        StepSpec {
            number: 2,
            name: "plan",
            fields: &[
                req("risk_tolerance_level", FieldKind::Choice(RISK_LEVELS)),
                req("timeline", FieldKind::Count { min: 1 }),
            ],
            email_opt_in: None,
        },
    ],
};

pub static QUIZ: WizardSpec = WizardSpec {
    tool: "quiz",
    steps: &[
        StepSpec {
            number: 1,
            name: "intro",
            fields: &[
                req("first_name", FieldKind::Text),
                opt("email", FieldKind::Email),
                opt("send_email", FieldKind::Flag),
            ],
            email_opt_in: Some(("send_email", "email")),
        },
        StepSpec {
            number: 2,
            name: "questions",
            fields: &[
                req("q1", FieldKind::Choice(YES_NO)),
                req("q2", FieldKind::Choice(YES_NO)),
                req("q3", FieldKind::Choice(YES_NO)),
                req("q4", FieldKind::Choice(YES_NO)),
                req("q5", FieldKind::Choice(YES_NO)),
                req("q6", FieldKind::Choice(YES_NO)),
                req("q7", FieldKind::Choice(YES_NO)),
                req("q8", FieldKind::Choice(YES_NO)),
                req("q9", FieldKind::Choice(YES_NO)),
                req("q10", FieldKind::Choice(YES_NO)),
            ],
            email_opt_in: None,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_tool() {
        for tool in Tool::ALL {
            assert_eq!(Tool::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(Tool::parse("astrology"), None);
    }

    #[test]
    fn step_numbers_are_dense_and_ordered() {
        for tool in Tool::ALL {
            let spec = tool.wizard();
            for (idx, step) in spec.steps.iter().enumerate() {
                assert_eq!(step.number, idx as u32 + 1, "{}", tool);
            }
            assert_eq!(spec.last_step(), spec.steps.len() as u32);
        }
    }

    #[test]
    fn quiz_asks_ten_questions() {
        let step = QUIZ.step(2).unwrap();
        assert_eq!(step.fields.len(), QUIZ_QUESTIONS);
    }
}
