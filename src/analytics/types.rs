//! Result types produced by the analytics aggregator.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::model::{EventType, Severity};

/// One speed distribution bucket, e.g. "20-40 km/h".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedBucket {
    pub range: String,
    pub count: u64,
    /// Share of speed-carrying points in this bucket; the buckets sum to
    /// 100 (within rounding) whenever any points exist.
    pub percentage: f64,
}

/// Rollup for one hour of day ("00".."23") across the query window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyStat {
    pub hour: String,
    pub points: u64,
    pub distance_km: f64,
    pub avg_speed_kmh: f64,
}

/// Rollup for one calendar day within the query window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub distance_km: f64,
    pub driving_hours: f64,
    pub avg_speed_kmh: f64,
}

/// Derived analytics view for one vehicle and window. Recomputed on
/// demand, never separately persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total_points: u64,
    pub total_distance_km: f64,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub driving_hours: f64,
    pub idle_time_hours: f64,
    pub total_stops: u64,
    pub efficiency_pct: f64,
    pub safety_score: f64,
    pub speed_distribution: Vec<SpeedBucket>,
    pub hourly_data: Vec<HourlyStat>,
    pub daily_stats: Vec<DailyStat>,
}

/// Event-side statistics for one vehicle and window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventStatistics {
    pub total_events: u64,
    pub severe_accelerations: u64,
    pub moderate_accelerations: u64,
    pub severe_brakings: u64,
    pub moderate_brakings: u64,
    /// Mean and peak g-force magnitudes over the window's events.
    pub avg_g_force: f64,
    pub max_g_force: f64,
    pub total_distance_km: f64,
    pub events_per_100km: f64,
    /// Hour of day (0-23) in which events occur most often.
    pub most_common_hour: u32,
    pub safety_score: f64,
}

/// One chart sample: a telemetry point annotated with any coincident event.
#[derive(Debug, Clone, Serialize)]
pub struct ChartPoint {
    pub time: DateTime<Utc>,
    pub speed_kmh: f64,
    pub acceleration_ms2: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub g_force: Option<f64>,
}

/// Sampled per-point chart series for one vehicle and window.
#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub vehicle_id: i64,
    pub garage_no: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub data_points: Vec<ChartPoint>,
    pub total_points: u64,
    pub event_count: u64,
}
