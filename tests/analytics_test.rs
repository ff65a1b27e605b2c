//! Analytics aggregation over a seeded event stream: zero-fill discipline,
//! funnel actions recorded by the usage log, and filter/CSV parity.

use fincore::analytics::{AnalyticsStorage, EventFilter};
use fincore::identity::Actor;
use fincore::storage::{usage_log::UsageLog, Storage};
use tempfile::TempDir;

fn anon(token: &str) -> Actor {
    Actor::Anonymous { session_token: token.to_string() }
}

async fn setup() -> (TempDir, Storage, UsageLog, AnalyticsStorage) {
    let dir = TempDir::new().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();
    let log = UsageLog::new(storage.pool());
    let analytics = AnalyticsStorage::new(storage.pool());
    (dir, storage, log, analytics)
}

#[tokio::test]
async fn empty_window_still_yields_thirty_buckets() {
    let (_dir, _storage, _log, analytics) = setup().await;
    let overview = analytics.overview(30).await.unwrap();
    assert_eq!(overview.daily_events.len(), 30);
    assert!(overview.daily_events.iter().all(|d| d.count == 0));
    assert_eq!(overview.referral_conversion_rate, 0.0);

    let (rows, series) = analytics.filtered(&EventFilter::default(), 30).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(series.len(), 30);
}

#[tokio::test]
async fn funnel_actions_roll_up_into_tool_breakdowns() {
    let (_dir, _storage, log, analytics) = setup().await;
    let actor = anon("s-1");

    for _ in 0..3 {
        log.record("financial_health", &actor, "view").await;
    }
    log.record("financial_health", &actor, "submit_success").await;
    log.record("financial_health", &actor, "submit_error").await;
    log.record("budget", &actor, "view").await;

    let overview = analytics.overview(30).await.unwrap();
    assert_eq!(overview.total_tool_events, 6);
    assert_eq!(overview.top_tools.len(), 2);
    assert_eq!(overview.top_tools[0].tool_name, "financial_health");
    assert_eq!(overview.top_tools[0].events, 5);
    assert_eq!(overview.top_tools[0].top_actions[0].action, "view");
    assert_eq!(overview.top_tools[0].top_actions[0].count, 3);

    // today's bucket carries all six events
    assert_eq!(overview.daily_events.last().unwrap().count, 6);
    assert_eq!(
        overview.daily_events.iter().map(|d| d.count).sum::<u64>(),
        6
    );
}

#[tokio::test]
async fn multi_tool_and_conversion_rates_group_by_session() {
    let (_dir, _storage, log, analytics) = setup().await;

    // s-1: two tools, registers later; s-2: one tool only
    log.record("budget", &anon("s-1"), "view").await;
    log.record("quiz", &anon("s-1"), "view").await;
    log.record("auth", &anon("s-1"), "register").await;
    log.record("budget", &anon("s-2"), "view").await;
    log.record("budget", &anon("s-2"), "view").await;

    let overview = analytics.overview(30).await.unwrap();
    assert_eq!(overview.multi_tool_ratio, 50.0);
    assert_eq!(overview.anon_conversion_rate, 50.0);
}

#[tokio::test]
async fn filtered_rows_and_csv_export_agree() {
    let (_dir, _storage, log, analytics) = setup().await;
    log.record("budget", &anon("s-1"), "view").await;
    log.record("budget", &anon("s-1"), "submit_success").await;
    log.record("quiz", &anon("s-2"), "view").await;

    let filter = EventFilter {
        tool_name: Some("budget".to_string()),
        action: Some("view".to_string()),
        ..EventFilter::default()
    };
    let (rows, _series) = analytics.filtered(&filter, 30).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tool_name, "budget");
    assert_eq!(rows[0].action, "view");

    let csv = analytics.export_csv(&filter).await.unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 1 + rows.len());
    assert_eq!(lines[0], "id,actor,session_token,tool_name,action,timestamp");
    assert!(lines[1].contains("budget"));
    assert!(lines[1].contains("anonymous"));
}

#[tokio::test]
async fn feedback_average_appears_in_overview() {
    let (_dir, storage, _log, analytics) = setup().await;
    storage.insert_feedback(None, "s-1", "budget", 5, None).await.unwrap();
    storage.insert_feedback(None, "s-2", "quiz", 3, Some("ok")).await.unwrap();
    let overview = analytics.overview(30).await.unwrap();
    assert_eq!(overview.avg_feedback_rating, Some(4.0));
}

#[tokio::test]
async fn logging_failures_never_reach_the_caller() {
    // a pool with no tables at all
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    let log = UsageLog::new(pool);
    log.record("budget", &anon("s-1"), "view").await;
}
