//! Money personality quiz grading.

use crate::wizard::fields::Fields;
use crate::wizard::tools::QUIZ_QUESTIONS;
use serde::{Deserialize, Serialize};

pub const BADGE_MONEY_MASTER: &str = "money_master";
pub const BADGE_HABIT_BUILDER: &str = "habit_builder";

/// Static tip keys shown with every quiz result.
pub const TIPS: [&str; 3] = [
    "quiz_tip_set_budget",
    "quiz_tip_automate_savings",
    "quiz_tip_review_spending_weekly",
];

#[derive(Debug, Clone, PartialEq)]
pub struct QuizInputs {
    /// One entry per question; `true` means the recommended answer.
    pub answers: Vec<bool>,
}

impl QuizInputs {
    pub fn from_fields(fields: &Fields) -> Self {
        let answers = (1..=QUIZ_QUESTIONS)
            .map(|n| fields.text(&format!("q{n}")) == "yes")
            .collect();
        QuizInputs { answers }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub answers: Vec<bool>,
    pub recommended_count: usize,
    pub score: f64,
    pub personality: String,
    pub badges: Vec<String>,
    pub insights: Vec<String>,
    pub tips: Vec<String>,
}

/// Ten points per recommended answer; the tier names a money personality.
pub fn grade(inputs: &QuizInputs) -> QuizResult {
    let recommended_count = inputs.answers.iter().filter(|a| **a).count();
    let score = (recommended_count * 10) as f64;

    let personality = if score >= 70.0 {
        "planner"
    } else if score >= 40.0 {
        "saver"
    } else {
        "spender"
    };

    let mut badges = Vec::new();
    if score >= 80.0 {
        badges.push(BADGE_MONEY_MASTER.to_string());
    }
    if recommended_count >= 5 {
        badges.push(BADGE_HABIT_BUILDER.to_string());
    }

    let mut insights = vec![match personality {
        "planner" => "quiz_insight_strong_planning",
        "saver" => "quiz_insight_solid_habits",
        _ => "quiz_insight_impulse_spending",
    }
    .to_string()];
    if recommended_count < QUIZ_QUESTIONS {
        insights.push("quiz_insight_room_to_improve".to_string());
    }

    QuizResult {
        answers: inputs.answers.clone(),
        recommended_count,
        score,
        personality: personality.to_string(),
        badges,
        insights,
        tips: TIPS.iter().map(|t| t.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(yes: usize) -> QuizInputs {
        QuizInputs {
            answers: (0..QUIZ_QUESTIONS).map(|i| i < yes).collect(),
        }
    }

    #[test]
    fn all_recommended_is_a_planner() {
        let result = grade(&answers(10));
        assert_eq!(result.score, 100.0);
        assert_eq!(result.personality, "planner");
        assert!(result.badges.contains(&BADGE_MONEY_MASTER.to_string()));
        assert_eq!(result.insights, vec!["quiz_insight_strong_planning"]);
        assert_eq!(result.tips.len(), TIPS.len());
    }

    #[test]
    fn middling_answers_make_a_saver() {
        let result = grade(&answers(5));
        assert_eq!(result.score, 50.0);
        assert_eq!(result.personality, "saver");
        assert!(result.badges.contains(&BADGE_HABIT_BUILDER.to_string()));
        assert!(!result.badges.contains(&BADGE_MONEY_MASTER.to_string()));
    }

    #[test]
    fn few_recommended_answers_make_a_spender() {
        let result = grade(&answers(2));
        assert_eq!(result.score, 20.0);
        assert_eq!(result.personality, "spender");
        assert!(result.badges.is_empty());
        assert!(result.insights.contains(&"quiz_insight_impulse_spending".to_string()));
        assert!(result.insights.contains(&"quiz_insight_room_to_improve".to_string()));
    }
}
