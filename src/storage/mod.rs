pub mod usage_log;

use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

/// Schema version stamped on structured JSON columns (draft fields, result
/// payloads, lesson lists). Bump when the JSON shape changes.
pub const JSON_SCHEMA_VERSION: i64 = 1;

// ─── Rows ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_digest: String,
    pub is_admin: bool,
    pub lang: String,
    /// Share code handed out in referral links (36-character UUID form).
    pub referral_code: String,
    /// Account that referred this one. NULL when organic; nulled if the
    /// referrer is deleted.
    pub referred_by: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub token: String,
    /// Bound at sign-in; NULL for anonymous sessions.
    pub account_id: Option<i64>,
    pub created_at: String,
    /// Absolute expiry from mint time — visits do not renew it.
    pub expires_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WizardDraftRow {
    pub id: String,
    /// `account:<id>` or `session:<token>` — the trail this draft belongs to.
    pub actor_key: String,
    pub account_id: Option<i64>,
    pub session_token: String,
    pub tool_name: String,
    pub step: i64,
    /// Validated field values as a JSON object.
    pub fields: String,
    pub schema_version: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ToolResultRow {
    pub id: String,
    pub actor_key: String,
    pub account_id: Option<i64>,
    pub session_token: String,
    pub tool_name: String,
    /// Typed result payload as JSON (see `scoring`).
    pub payload: String,
    pub schema_version: i64,
    /// Headline numeric metric, when the tool has one (health/quiz score,
    /// net worth, …). Used for cross-actor comparison queries.
    pub score: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct UsageEventRow {
    pub id: String,
    pub tool_name: String,
    pub account_id: Option<i64>,
    pub session_token: String,
    pub action: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedbackRow {
    pub id: i64,
    pub account_id: Option<i64>,
    pub session_token: String,
    pub tool_name: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillRow {
    pub id: String,
    pub actor_key: String,
    pub account_id: Option<i64>,
    pub session_token: String,
    pub bill_name: String,
    pub amount: f64,
    /// `YYYY-MM-DD`.
    pub due_date: String,
    pub frequency: String,
    pub category: String,
    pub status: String,
    pub reminder_days: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CourseRow {
    pub id: String,
    pub title_key: String,
    pub title_en: String,
    pub title_ha: String,
    pub is_premium: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LearningProgressRow {
    pub id: i64,
    pub actor_key: String,
    pub account_id: Option<i64>,
    pub session_token: String,
    pub course_id: String,
    /// JSON array of completed lesson ids.
    pub lessons_completed: String,
    /// JSON object mapping lesson id to quiz score.
    pub quiz_scores: String,
    pub current_lesson: Option<String>,
    pub schema_version: i64,
}

// ─── Storage ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("fincore.db");
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .foreign_keys(true)
                .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    /// The usage log and analytics layer share this pool.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        let stmts = [
            "CREATE TABLE IF NOT EXISTS accounts (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password_digest TEXT NOT NULL,
                is_admin        INTEGER NOT NULL DEFAULT 0,
                lang            TEXT NOT NULL DEFAULT 'en',
                referral_code   TEXT NOT NULL UNIQUE,
                referred_by     INTEGER REFERENCES accounts(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS sessions (
                token       TEXT PRIMARY KEY,
                account_id  INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                expires_at  TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS wizard_drafts (
                id             TEXT PRIMARY KEY,
                actor_key      TEXT NOT NULL,
                account_id     INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
                session_token  TEXT NOT NULL,
                tool_name      TEXT NOT NULL,
                step           INTEGER NOT NULL,
                fields         TEXT NOT NULL,
                schema_version INTEGER NOT NULL,
                created_at     TEXT NOT NULL,
                UNIQUE(actor_key, tool_name, step)
            )",
            "CREATE TABLE IF NOT EXISTS tool_results (
                id             TEXT PRIMARY KEY,
                actor_key      TEXT NOT NULL,
                account_id     INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
                session_token  TEXT NOT NULL,
                tool_name      TEXT NOT NULL,
                payload        TEXT NOT NULL,
                schema_version INTEGER NOT NULL,
                score          REAL,
                created_at     TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS usage_events (
                id             TEXT PRIMARY KEY,
                tool_name      TEXT NOT NULL,
                account_id     INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
                session_token  TEXT NOT NULL,
                action         TEXT NOT NULL,
                created_at     TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS feedback (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id     INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
                session_token  TEXT NOT NULL,
                tool_name      TEXT NOT NULL,
                rating         INTEGER NOT NULL,
                comment        TEXT,
                created_at     TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS bills (
                id             TEXT PRIMARY KEY,
                actor_key      TEXT NOT NULL,
                account_id     INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
                session_token  TEXT NOT NULL,
                bill_name      TEXT NOT NULL,
                amount         REAL NOT NULL,
                due_date       TEXT NOT NULL,
                frequency      TEXT NOT NULL,
                category       TEXT NOT NULL,
                status         TEXT NOT NULL,
                reminder_days  INTEGER,
                created_at     TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS courses (
                id         TEXT PRIMARY KEY,
                title_key  TEXT NOT NULL,
                title_en   TEXT NOT NULL,
                title_ha   TEXT NOT NULL,
                is_premium INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE TABLE IF NOT EXISTS learning_progress (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                actor_key         TEXT NOT NULL,
                account_id        INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
                session_token     TEXT NOT NULL,
                course_id         TEXT NOT NULL REFERENCES courses(id),
                lessons_completed TEXT NOT NULL DEFAULT '[]',
                quiz_scores       TEXT NOT NULL DEFAULT '{}',
                current_lesson    TEXT,
                schema_version    INTEGER NOT NULL,
                UNIQUE(actor_key, course_id)
            )",
            "CREATE INDEX IF NOT EXISTS ix_drafts_actor ON wizard_drafts(actor_key, tool_name)",
            "CREATE INDEX IF NOT EXISTS ix_results_actor ON tool_results(actor_key, tool_name)",
            "CREATE INDEX IF NOT EXISTS ix_results_tool ON tool_results(tool_name)",
            "CREATE INDEX IF NOT EXISTS ix_events_tool ON usage_events(tool_name)",
            "CREATE INDEX IF NOT EXISTS ix_events_session ON usage_events(session_token)",
            "CREATE INDEX IF NOT EXISTS ix_events_created ON usage_events(created_at)",
            "CREATE INDEX IF NOT EXISTS ix_accounts_referred_by ON accounts(referred_by)",
        ];
        for stmt in stmts {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .context("schema bootstrap")?;
        }
        Ok(())
    }

    // ─── Sessions ───────────────────────────────────────────────────────────

    pub async fn get_session(&self, token: &str) -> Result<Option<SessionRow>> {
        Ok(sqlx::query_as("SELECT * FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn create_session(&self, token: &str, ttl_days: i64) -> Result<()> {
        let now = Utc::now();
        let expires = now + chrono::Duration::days(ttl_days);
        sqlx::query(
            "INSERT INTO sessions (token, account_id, created_at, expires_at)
             VALUES (?, NULL, ?, ?)",
        )
        .bind(token)
        .bind(now.to_rfc3339())
        .bind(expires.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Bind an account to a session at sign-in. Inserts the row if the token
    /// was minted through the in-process fallback and never persisted.
    pub async fn bind_session_account(
        &self,
        token: &str,
        account_id: i64,
        ttl_days: i64,
    ) -> Result<()> {
        let now = Utc::now();
        let expires = now + chrono::Duration::days(ttl_days);
        sqlx::query(
            "INSERT INTO sessions (token, account_id, created_at, expires_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(token) DO UPDATE SET account_id = excluded.account_id",
        )
        .bind(token)
        .bind(account_id)
        .bind(now.to_rfc3339())
        .bind(expires.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_session_account(&self, token: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET account_id = NULL WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Accounts ───────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub async fn create_account(
        &self,
        username: &str,
        email: &str,
        password_digest: &str,
        is_admin: bool,
        lang: &str,
        referred_by: Option<i64>,
    ) -> Result<AccountRow> {
        let now = Utc::now().to_rfc3339();
        let referral_code = Uuid::new_v4().to_string();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO accounts (username, email, password_digest, is_admin, lang, referral_code, referred_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(username)
        .bind(email)
        .bind(password_digest)
        .bind(is_admin)
        .bind(lang)
        .bind(&referral_code)
        .bind(referred_by)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        self.get_account(id)
            .await?
            .context("account not found after insert")
    }

    pub async fn get_account(&self, id: i64) -> Result<Option<AccountRow>> {
        Ok(sqlx::query_as("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<AccountRow>> {
        Ok(sqlx::query_as("SELECT * FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_account_by_username(&self, username: &str) -> Result<Option<AccountRow>> {
        Ok(sqlx::query_as("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_account_by_referral_code(&self, code: &str) -> Result<Option<AccountRow>> {
        Ok(sqlx::query_as("SELECT * FROM accounts WHERE referral_code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Direct referral count for one account (one hop only — referral chains
    /// are never walked deeper, so cyclic chains are unreachable).
    pub async fn count_direct_referrals(&self, account_id: i64) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE referred_by = ?")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    pub async fn list_direct_referrals(&self, account_id: i64) -> Result<Vec<AccountRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM accounts WHERE referred_by = ? ORDER BY created_at, id")
                .bind(account_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    // ─── Wizard drafts ──────────────────────────────────────────────────────

    /// Upsert the draft row for (actor, tool, step). A resubmission of the
    /// same step overwrites the stored fields in place — the single-statement
    /// upsert keeps the at-most-one-row invariant without a read-then-write
    /// window.
    pub async fn upsert_draft(
        &self,
        actor_key: &str,
        account_id: Option<i64>,
        session_token: &str,
        tool_name: &str,
        step: i64,
        fields_json: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO wizard_drafts (id, actor_key, account_id, session_token, tool_name, step, fields, schema_version, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(actor_key, tool_name, step)
             DO UPDATE SET fields = excluded.fields, schema_version = excluded.schema_version",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(actor_key)
        .bind(account_id)
        .bind(session_token)
        .bind(tool_name)
        .bind(step)
        .bind(fields_json)
        .bind(JSON_SCHEMA_VERSION)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_draft(
        &self,
        actor_key: &str,
        tool_name: &str,
        step: i64,
    ) -> Result<Option<WizardDraftRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM wizard_drafts WHERE actor_key = ? AND tool_name = ? AND step = ?",
        )
        .bind(actor_key)
        .bind(tool_name)
        .bind(step)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn count_drafts(&self, actor_key: &str, tool_name: &str, step: i64) -> Result<i64> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM wizard_drafts WHERE actor_key = ? AND tool_name = ? AND step = ?",
        )
        .bind(actor_key)
        .bind(tool_name)
        .bind(step)
        .fetch_one(&self.pool)
        .await?)
    }

    // ─── Tool results ───────────────────────────────────────────────────────

    /// Persist the terminal draft and the computed result in one transaction.
    /// A crash mid-step leaves either the prior state or both writes — readers
    /// never observe the result without its final draft.
    #[allow(clippy::too_many_arguments)]
    pub async fn finalize_wizard(
        &self,
        actor_key: &str,
        account_id: Option<i64>,
        session_token: &str,
        tool_name: &str,
        final_step: i64,
        fields_json: &str,
        payload_json: &str,
        score: Option<f64>,
    ) -> Result<ToolResultRow> {
        let now = Utc::now().to_rfc3339();
        let result_id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO wizard_drafts (id, actor_key, account_id, session_token, tool_name, step, fields, schema_version, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(actor_key, tool_name, step)
             DO UPDATE SET fields = excluded.fields, schema_version = excluded.schema_version",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(actor_key)
        .bind(account_id)
        .bind(session_token)
        .bind(tool_name)
        .bind(final_step)
        .bind(fields_json)
        .bind(JSON_SCHEMA_VERSION)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO tool_results (id, actor_key, account_id, session_token, tool_name, payload, schema_version, score, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&result_id)
        .bind(actor_key)
        .bind(account_id)
        .bind(session_token)
        .bind(tool_name)
        .bind(payload_json)
        .bind(JSON_SCHEMA_VERSION)
        .bind(score)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_result(&result_id)
            .await?
            .context("result not found after insert")
    }

    pub async fn get_result(&self, id: &str) -> Result<Option<ToolResultRow>> {
        Ok(sqlx::query_as("SELECT * FROM tool_results WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// History for one actor's trail, newest first. "Current" is the head.
    pub async fn list_results(
        &self,
        actor_key: &str,
        tool_name: &str,
    ) -> Result<Vec<ToolResultRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM tool_results WHERE actor_key = ? AND tool_name = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(actor_key)
        .bind(tool_name)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn latest_result(
        &self,
        actor_key: &str,
        tool_name: &str,
    ) -> Result<Option<ToolResultRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM tool_results WHERE actor_key = ? AND tool_name = ?
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(actor_key)
        .bind(tool_name)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// All headline scores for a tool, across every actor. Drives the
    /// rank/average comparison on the tool dashboards.
    pub async fn all_scores(&self, tool_name: &str) -> Result<Vec<f64>> {
        Ok(sqlx::query_scalar(
            "SELECT score FROM tool_results WHERE tool_name = ? AND score IS NOT NULL",
        )
        .bind(tool_name)
        .fetch_all(&self.pool)
        .await?)
    }

    // ─── Feedback ───────────────────────────────────────────────────────────

    pub async fn insert_feedback(
        &self,
        account_id: Option<i64>,
        session_token: &str,
        tool_name: &str,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO feedback (account_id, session_token, tool_name, rating, comment, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(account_id)
        .bind(session_token)
        .bind(tool_name)
        .bind(rating)
        .bind(comment)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ─── Bills ──────────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_bill(
        &self,
        actor_key: &str,
        account_id: Option<i64>,
        session_token: &str,
        bill_name: &str,
        amount: f64,
        due_date: &str,
        frequency: &str,
        category: &str,
        status: &str,
        reminder_days: Option<i64>,
    ) -> Result<BillRow> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO bills (id, actor_key, account_id, session_token, bill_name, amount, due_date, frequency, category, status, reminder_days, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(actor_key)
        .bind(account_id)
        .bind(session_token)
        .bind(bill_name)
        .bind(amount)
        .bind(due_date)
        .bind(frequency)
        .bind(category)
        .bind(status)
        .bind(reminder_days)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        let row: BillRow = sqlx::query_as("SELECT * FROM bills WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_bills(&self, actor_key: &str) -> Result<Vec<BillRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM bills WHERE actor_key = ? ORDER BY due_date, created_at")
                .bind(actor_key)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    // ─── Courses & learning progress ────────────────────────────────────────

    pub async fn seed_course(
        &self,
        id: &str,
        title_key: &str,
        title_en: &str,
        title_ha: &str,
        is_premium: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO courses (id, title_key, title_en, title_ha, is_premium)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(title_key)
        .bind(title_en)
        .bind(title_ha)
        .bind(is_premium)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_courses(&self) -> Result<Vec<CourseRow>> {
        Ok(sqlx::query_as("SELECT * FROM courses ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get_progress(
        &self,
        actor_key: &str,
        course_id: &str,
    ) -> Result<Option<LearningProgressRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM learning_progress WHERE actor_key = ? AND course_id = ?")
                .bind(actor_key)
                .bind(course_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn list_progress(&self, actor_key: &str) -> Result<Vec<LearningProgressRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM learning_progress WHERE actor_key = ? ORDER BY course_id")
                .bind(actor_key)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// Upsert the progress row for (actor, course). One row per pair.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_progress(
        &self,
        actor_key: &str,
        account_id: Option<i64>,
        session_token: &str,
        course_id: &str,
        lessons_json: &str,
        scores_json: &str,
        current_lesson: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO learning_progress (actor_key, account_id, session_token, course_id, lessons_completed, quiz_scores, current_lesson, schema_version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(actor_key, course_id)
             DO UPDATE SET lessons_completed = excluded.lessons_completed,
                           quiz_scores = excluded.quiz_scores,
                           current_lesson = excluded.current_lesson,
                           schema_version = excluded.schema_version",
        )
        .bind(actor_key)
        .bind(account_id)
        .bind(session_token)
        .bind(course_id)
        .bind(lessons_json)
        .bind(scores_json)
        .bind(current_lesson)
        .bind(JSON_SCHEMA_VERSION)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Map a sqlx error to `true` when it is a UNIQUE constraint violation —
/// the backstop for the check-then-insert races called out in the
/// concurrency model.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let s = Storage::new(dir.path()).await.unwrap();
        (dir, s)
    }

    #[tokio::test]
    async fn draft_upsert_is_idempotent_per_step() {
        let (_dir, s) = storage().await;
        for _ in 0..3 {
            s.upsert_draft("session:t1", None, "t1", "budget", 1, r#"{"income":5000.0}"#)
                .await
                .unwrap();
        }
        assert_eq!(s.count_drafts("session:t1", "budget", 1).await.unwrap(), 1);
        let draft = s.get_draft("session:t1", "budget", 1).await.unwrap().unwrap();
        assert_eq!(draft.fields, r#"{"income":5000.0}"#);
    }

    #[tokio::test]
    async fn resubmit_overwrites_fields_in_place() {
        let (_dir, s) = storage().await;
        s.upsert_draft("session:t1", None, "t1", "budget", 1, r#"{"income":1.0}"#)
            .await
            .unwrap();
        s.upsert_draft("session:t1", None, "t1", "budget", 1, r#"{"income":2.0}"#)
            .await
            .unwrap();
        let draft = s.get_draft("session:t1", "budget", 1).await.unwrap().unwrap();
        assert_eq!(draft.fields, r#"{"income":2.0}"#);
        assert_eq!(s.count_drafts("session:t1", "budget", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn result_history_is_appended_not_overwritten() {
        let (_dir, s) = storage().await;
        for score in [40.0, 80.0] {
            s.finalize_wizard(
                "session:t1",
                None,
                "t1",
                "financial_health",
                3,
                "{}",
                &format!(r#"{{"score":{score}}}"#),
                Some(score),
            )
            .await
            .unwrap();
        }
        let results = s.list_results("session:t1", "financial_health").await.unwrap();
        assert_eq!(results.len(), 2);
        // newest first
        assert_eq!(results[0].score, Some(80.0));
        let latest = s.latest_result("session:t1", "financial_health").await.unwrap().unwrap();
        assert_eq!(latest.score, Some(80.0));
    }

    #[tokio::test]
    async fn duplicate_email_is_unique_violation() {
        let (_dir, s) = storage().await;
        s.create_account("ada", "ada@example.com", "digest", false, "en", None)
            .await
            .unwrap();
        let err = s
            .create_account("grace", "ada@example.com", "digest", false, "en", None)
            .await
            .unwrap_err();
        let sqlx_err = err.downcast_ref::<sqlx::Error>().unwrap();
        assert!(is_unique_violation(sqlx_err));
    }

    #[tokio::test]
    async fn direct_referrals_list_only_the_referrers_signups() {
        let (_dir, s) = storage().await;
        let referrer = s
            .create_account("ada", "ada@example.com", "digest", false, "en", None)
            .await
            .unwrap();
        for (name, email) in [("grace", "grace@example.com"), ("joan", "joan@example.com")] {
            s.create_account(name, email, "digest", false, "en", Some(referrer.id))
                .await
                .unwrap();
        }
        s.create_account("alan", "alan@example.com", "digest", false, "en", None)
            .await
            .unwrap();

        let referred = s.list_direct_referrals(referrer.id).await.unwrap();
        assert_eq!(
            referred.iter().map(|r| r.username.as_str()).collect::<Vec<_>>(),
            ["grace", "joan"]
        );
        assert_eq!(s.count_direct_referrals(referrer.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn session_bind_and_clear_account() {
        let (_dir, s) = storage().await;
        let acct = s
            .create_account("ada", "ada@example.com", "digest", false, "en", None)
            .await
            .unwrap();
        s.create_session("tok-1", 30).await.unwrap();
        s.bind_session_account("tok-1", acct.id, 30).await.unwrap();
        assert_eq!(
            s.get_session("tok-1").await.unwrap().unwrap().account_id,
            Some(acct.id)
        );
        s.clear_session_account("tok-1").await.unwrap();
        assert_eq!(s.get_session("tok-1").await.unwrap().unwrap().account_id, None);
    }

    #[tokio::test]
    async fn bind_inserts_row_for_fallback_token() {
        let (_dir, s) = storage().await;
        let acct = s
            .create_account("ada", "ada@example.com", "digest", false, "en", None)
            .await
            .unwrap();
        // token never persisted (in-process fallback) — bind still succeeds
        s.bind_session_account("ghost-token", acct.id, 30).await.unwrap();
        assert!(s.get_session("ghost-token").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn learning_progress_unique_per_actor_course() {
        let (_dir, s) = storage().await;
        s.seed_course("savings_basics", "course_savings", "Savings Basics", "Asalin Tattara Kudi", false)
            .await
            .unwrap();
        s.upsert_progress("session:t1", None, "t1", "savings_basics", r#"["l1"]"#, "{}", Some("l2"))
            .await
            .unwrap();
        s.upsert_progress("session:t1", None, "t1", "savings_basics", r#"["l1","l2"]"#, "{}", None)
            .await
            .unwrap();
        let rows = s.list_progress("session:t1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lessons_completed, r#"["l1","l2"]"#);
    }
}
