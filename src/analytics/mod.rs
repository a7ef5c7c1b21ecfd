//! Query-time analytics over stored telemetry and events.
//!
//! Everything here is a pure function of the points and events in range:
//! no hidden state, fully reproducible from stored data, safe to re-query
//! after detection re-runs.

pub mod chart;
pub mod summary;
pub mod types;
pub mod util;

pub use summary::AnalyticsAggregator;
pub use types::{
    AnalyticsSummary, ChartData, ChartPoint, DailyStat, EventStatistics, HourlyStat, SpeedBucket,
};
