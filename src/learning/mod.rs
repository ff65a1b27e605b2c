//! Learning hub: a small seeded course catalog with per-actor lesson
//! progress and quiz scores.
//!
//! Lesson completion and quiz scores live in one progress row per
//! (actor, course); the serialized lists are parsed at this boundary into
//! typed values, never re-exposed as raw text.

use crate::error::AppError;
use crate::identity::Actor;
use crate::storage::Storage;
use serde::Serialize;
use std::collections::BTreeMap;

pub struct CourseDef {
    pub id: &'static str,
    pub title_key: &'static str,
    pub title_en: &'static str,
    pub title_ha: &'static str,
    pub is_premium: bool,
    pub lessons: &'static [&'static str],
}

pub static COURSES: &[CourseDef] = &[
    CourseDef {
        id: "budgeting_learning_101",
        title_key: "course_budgeting_title",
        title_en: "Budgeting Basics",
        title_ha: "Tsarin Kasafin Kudi",
        is_premium: false,
        lessons: &["what_is_a_budget", "income_vs_expenses", "build_your_budget"],
    },
    CourseDef {
        id: "financial_quiz",
        title_key: "course_quiz_title",
        title_en: "Financial Knowledge Quiz",
        title_ha: "Tambayoyin Ilimin Kudi",
        is_premium: false,
        lessons: &["money_habits_quiz"],
    },
    CourseDef {
        id: "savings_basics",
        title_key: "course_savings_title",
        title_en: "Savings Fundamentals",
        title_ha: "Tushen Tanadi",
        is_premium: false,
        lessons: &["why_save", "where_to_save", "automate_savings"],
    },
];

pub fn course_def(course_id: &str) -> Option<&'static CourseDef> {
    COURSES.iter().find(|c| c.id == course_id)
}

/// Insert the catalog rows, ignoring courses already present.
pub async fn seed_courses(storage: &Storage) -> Result<(), AppError> {
    for course in COURSES {
        storage
            .seed_course(course.id, course.title_key, course.title_en, course.title_ha, course.is_premium)
            .await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseProgress {
    pub course_id: String,
    pub title_key: String,
    pub is_premium: bool,
    pub lessons_total: usize,
    pub lessons_completed: Vec<String>,
    pub quiz_scores: BTreeMap<String, f64>,
    pub current_lesson: Option<String>,
}

fn parse_lessons(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

fn parse_scores(json: &str) -> BTreeMap<String, f64> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Catalog with this actor's progress joined in; courses never started get
/// empty progress, not a missing entry.
pub async fn progress_overview(
    storage: &Storage,
    actor: &Actor,
) -> Result<Vec<CourseProgress>, AppError> {
    let rows = storage.list_progress(&actor.key()).await?;
    let mut by_course: BTreeMap<&str, (Vec<String>, BTreeMap<String, f64>, Option<String>)> =
        BTreeMap::new();
    for row in &rows {
        by_course.insert(
            row.course_id.as_str(),
            (
                parse_lessons(&row.lessons_completed),
                parse_scores(&row.quiz_scores),
                row.current_lesson.clone(),
            ),
        );
    }

    Ok(COURSES
        .iter()
        .map(|course| {
            let (completed, scores, current) =
                by_course.remove(course.id).unwrap_or_default();
            CourseProgress {
                course_id: course.id.to_string(),
                title_key: course.title_key.to_string(),
                is_premium: course.is_premium,
                lessons_total: course.lessons.len(),
                lessons_completed: completed,
                quiz_scores: scores,
                current_lesson: current,
            }
        })
        .collect())
}

/// Mark a lesson complete. Re-completing a lesson is a no-op; the current
/// lesson advances to the first lesson not yet completed.
pub async fn complete_lesson(
    storage: &Storage,
    actor: &Actor,
    course_id: &str,
    lesson_id: &str,
) -> Result<CourseProgress, AppError> {
    let course = course_def(course_id).ok_or(AppError::NotFound)?;
    if !course.lessons.contains(&lesson_id) {
        return Err(AppError::NotFound);
    }

    let existing = storage.get_progress(&actor.key(), course_id).await?;
    let mut completed = existing
        .as_ref()
        .map(|row| parse_lessons(&row.lessons_completed))
        .unwrap_or_default();
    let scores = existing
        .as_ref()
        .map(|row| parse_scores(&row.quiz_scores))
        .unwrap_or_default();

    if !completed.iter().any(|l| l == lesson_id) {
        completed.push(lesson_id.to_string());
    }
    let current = course
        .lessons
        .iter()
        .find(|l| !completed.iter().any(|c| c == **l))
        .map(|l| l.to_string());

    write_progress(storage, actor, course_id, &completed, &scores, current.as_deref()).await?;

    Ok(CourseProgress {
        course_id: course_id.to_string(),
        title_key: course.title_key.to_string(),
        is_premium: course.is_premium,
        lessons_total: course.lessons.len(),
        lessons_completed: completed,
        quiz_scores: scores,
        current_lesson: current,
    })
}

/// Record a quiz score for a lesson; a retake overwrites the previous score.
pub async fn record_quiz_score(
    storage: &Storage,
    actor: &Actor,
    course_id: &str,
    lesson_id: &str,
    score: f64,
) -> Result<(), AppError> {
    let course = course_def(course_id).ok_or(AppError::NotFound)?;
    if !course.lessons.contains(&lesson_id) {
        return Err(AppError::NotFound);
    }
    if !(0.0..=100.0).contains(&score) {
        let mut errors = BTreeMap::new();
        errors.insert("score".to_string(), "score_out_of_range".to_string());
        return Err(AppError::Validation(errors));
    }

    let existing = storage.get_progress(&actor.key(), course_id).await?;
    let completed = existing
        .as_ref()
        .map(|row| parse_lessons(&row.lessons_completed))
        .unwrap_or_default();
    let mut scores = existing
        .as_ref()
        .map(|row| parse_scores(&row.quiz_scores))
        .unwrap_or_default();
    scores.insert(lesson_id.to_string(), score);
    let current = existing.as_ref().and_then(|row| row.current_lesson.clone());

    write_progress(storage, actor, course_id, &completed, &scores, current.as_deref()).await
}

async fn write_progress(
    storage: &Storage,
    actor: &Actor,
    course_id: &str,
    completed: &[String],
    scores: &BTreeMap<String, f64>,
    current: Option<&str>,
) -> Result<(), AppError> {
    let lessons_json =
        serde_json::to_string(completed).map_err(|e| AppError::Internal(e.into()))?;
    let scores_json = serde_json::to_string(scores).map_err(|e| AppError::Internal(e.into()))?;
    storage
        .upsert_progress(
            &actor.key(),
            actor.account_id(),
            actor.session_token(),
            course_id,
            &lessons_json,
            &scores_json,
            current,
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn anon(token: &str) -> Actor {
        Actor::Anonymous { session_token: token.to_string() }
    }

    async fn seeded() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path()).await.unwrap();
        seed_courses(&storage).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn seeding_twice_keeps_one_row_per_course() {
        let (_dir, storage) = seeded().await;
        seed_courses(&storage).await.unwrap();
        assert_eq!(storage.list_courses().await.unwrap().len(), COURSES.len());
    }

    #[tokio::test]
    async fn completing_a_lesson_twice_is_idempotent() {
        let (_dir, storage) = seeded().await;
        let actor = anon("s-1");
        for _ in 0..2 {
            complete_lesson(&storage, &actor, "budgeting_learning_101", "what_is_a_budget")
                .await
                .unwrap();
        }
        let progress = complete_lesson(
            &storage,
            &actor,
            "budgeting_learning_101",
            "income_vs_expenses",
        )
        .await
        .unwrap();
        assert_eq!(progress.lessons_completed.len(), 2);
        assert_eq!(progress.current_lesson.as_deref(), Some("build_your_budget"));
    }

    #[tokio::test]
    async fn finishing_all_lessons_clears_current() {
        let (_dir, storage) = seeded().await;
        let actor = anon("s-1");
        for lesson in course_def("savings_basics").unwrap().lessons {
            complete_lesson(&storage, &actor, "savings_basics", lesson).await.unwrap();
        }
        let overview = progress_overview(&storage, &actor).await.unwrap();
        let savings = overview.iter().find(|c| c.course_id == "savings_basics").unwrap();
        assert_eq!(savings.lessons_completed.len(), savings.lessons_total);
        assert_eq!(savings.current_lesson, None);
    }

    #[tokio::test]
    async fn quiz_retake_overwrites_score() {
        let (_dir, storage) = seeded().await;
        let actor = anon("s-1");
        for score in [40.0, 90.0] {
            record_quiz_score(&storage, &actor, "financial_quiz", "money_habits_quiz", score)
                .await
                .unwrap();
        }
        let overview = progress_overview(&storage, &actor).await.unwrap();
        let quiz = overview.iter().find(|c| c.course_id == "financial_quiz").unwrap();
        assert_eq!(quiz.quiz_scores["money_habits_quiz"], 90.0);
    }

    #[tokio::test]
    async fn unknown_course_or_lesson_is_not_found() {
        let (_dir, storage) = seeded().await;
        let actor = anon("s-1");
        assert!(matches!(
            complete_lesson(&storage, &actor, "ghost_course", "x").await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            complete_lesson(&storage, &actor, "savings_basics", "ghost_lesson").await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn overview_lists_untouched_courses_with_empty_progress() {
        let (_dir, storage) = seeded().await;
        let overview = progress_overview(&storage, &anon("s-1")).await.unwrap();
        assert_eq!(overview.len(), COURSES.len());
        assert!(overview.iter().all(|c| c.lessons_completed.is_empty()));
    }
}
