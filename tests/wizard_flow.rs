//! End-to-end wizard flows against a real temp-dir context: step gating,
//! draft idempotence, result history, and identity hand-off at signup.

use fincore::auth::{self, Sha256Hasher, SignupRequest};
use fincore::config::ServiceConfig;
use fincore::identity::Actor;
use fincore::wizard::tools::Tool;
use fincore::wizard::{self, StepOutcome};
use fincore::AppContext;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

async fn make_test_ctx(dir: &TempDir) -> Arc<AppContext> {
    let config = ServiceConfig::load(
        dir.path().to_path_buf(),
        None,
        None,
        Some("error".to_string()),
    );
    fincore::build_context(config).await.unwrap()
}

fn anon(token: &str) -> Actor {
    Actor::Anonymous { session_token: token.to_string() }
}

fn obj(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    v.as_object().unwrap().clone()
}

async fn submit(
    ctx: &AppContext,
    actor: &Actor,
    tool: Tool,
    step: u32,
    body: serde_json::Value,
) -> StepOutcome {
    wizard::upsert_step(&ctx.storage, &ctx.carryover, actor, tool, step, &obj(body))
        .await
        .unwrap()
}

#[tokio::test]
async fn two_actors_run_health_independently() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir).await;
    let ada = anon("token-ada");
    let grace = anon("token-grace");

    for (actor, income, expenses) in [(&ada, 100_000, 60_000), (&grace, 50_000, 45_000)] {
        submit(&ctx, actor, Tool::FinancialHealth, 1, json!({ "first_name": "x" })).await;
        submit(
            &ctx,
            actor,
            Tool::FinancialHealth,
            2,
            json!({ "income": income, "expenses": expenses }),
        )
        .await;
        let outcome = submit(
            &ctx,
            actor,
            Tool::FinancialHealth,
            3,
            json!({ "debt": 0, "interest_rate": 0 }),
        )
        .await;
        assert!(matches!(outcome, StepOutcome::Completed { .. }));
    }

    let ada_latest = ctx
        .storage
        .latest_result(&ada.key(), "financial_health")
        .await
        .unwrap()
        .unwrap();
    let grace_latest = ctx
        .storage
        .latest_result(&grace.key(), "financial_health")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ada_latest.score, Some(100.0));
    assert_ne!(ada_latest.score, grace_latest.score);
    // headline scores are queryable across actors for comparison
    assert_eq!(ctx.storage.all_scores("financial_health").await.unwrap().len(), 2);
}

#[tokio::test]
async fn resubmitted_steps_stay_single_row_per_actor_and_step() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir).await;
    let actor = anon("token-1");

    submit(&ctx, &actor, Tool::EmergencyFund, 1, json!({ "monthly_expenses": 1000 })).await;
    submit(&ctx, &actor, Tool::EmergencyFund, 1, json!({ "monthly_expenses": 2000 })).await;

    assert_eq!(
        ctx.storage.count_drafts(&actor.key(), "emergency_fund", 1).await.unwrap(),
        1
    );
    let draft = ctx
        .storage
        .get_draft(&actor.key(), "emergency_fund", 1)
        .await
        .unwrap()
        .unwrap();
    assert!(draft.fields.contains("2000"));
}

#[tokio::test]
async fn step_gating_redirects_and_recovers() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir).await;
    let actor = anon("token-2");

    let outcome = submit(
        &ctx,
        &actor,
        Tool::EmergencyFund,
        2,
        json!({ "risk_tolerance_level": "low", "timeline": 6 }),
    )
    .await;
    assert!(matches!(outcome, StepOutcome::OutOfOrder { redirect_to: 1 }));

    submit(&ctx, &actor, Tool::EmergencyFund, 1, json!({ "monthly_expenses": 1000 })).await;
    let outcome = submit(
        &ctx,
        &actor,
        Tool::EmergencyFund,
        2,
        json!({ "risk_tolerance_level": "low", "timeline": 6 }),
    )
    .await;
    assert!(matches!(outcome, StepOutcome::Completed { .. }));
}

#[tokio::test]
async fn anonymous_trail_stays_with_the_session_after_signup() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir).await;
    let token = "token-3";
    let before = anon(token);

    submit(&ctx, &before, Tool::Budget, 1, json!({ "income": 500 })).await;
    submit(&ctx, &before, Tool::Budget, 2, json!({ "fixed_expenses": 100 })).await;

    let account = auth::signup(
        &ctx.storage,
        &Sha256Hasher,
        &SignupRequest {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "hunter22".to_string(),
            lang: "en".to_string(),
            referral_code: None,
        },
        ctx.config.referral_limit,
    )
    .await
    .unwrap();
    ctx.storage
        .bind_session_account(token, account.id, ctx.config.session_ttl_days)
        .await
        .unwrap();

    // prior records are not migrated: they stay on the session trail
    let after = Actor::Account { id: account.id, session_token: token.to_string() };
    assert!(ctx.storage.latest_result(&after.key(), "budget").await.unwrap().is_none());
    assert!(ctx.storage.latest_result(&before.key(), "budget").await.unwrap().is_some());
}

#[tokio::test]
async fn quiz_terminal_step_validates_choices() {
    let dir = TempDir::new().unwrap();
    let ctx = make_test_ctx(&dir).await;
    let actor = anon("token-4");

    submit(&ctx, &actor, Tool::Quiz, 1, json!({ "first_name": "Ada" })).await;

    let mut answers = serde_json::Map::new();
    for n in 1..=10 {
        answers.insert(format!("q{n}"), json!("yes"));
    }
    answers.insert("q5".to_string(), json!("maybe"));
    let outcome = wizard::upsert_step(
        &ctx.storage,
        &ctx.carryover,
        &actor,
        Tool::Quiz,
        2,
        &answers,
    )
    .await
    .unwrap();
    let StepOutcome::ValidationFailed { errors } = outcome else {
        panic!("expected validation failure");
    };
    assert_eq!(errors["q5"], "q5_invalid");

    answers.insert("q5".to_string(), json!("no"));
    let outcome =
        wizard::upsert_step(&ctx.storage, &ctx.carryover, &actor, Tool::Quiz, 2, &answers)
            .await
            .unwrap();
    let StepOutcome::Completed { result } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(result.score, Some(90.0));
}
