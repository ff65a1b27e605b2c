//! Admin analytics: overview aggregates, drill-down filtering and CSV export
//! over the usage event stream.

pub mod model;
pub mod storage;

pub use model::{ActionCount, DailyCount, EventFilter, OverviewMetrics, ToolBreakdown};
pub use storage::AnalyticsStorage;
