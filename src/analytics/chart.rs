//! Chart data: a decimated speed/acceleration series with events merged in.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Timelike, Utc};

use crate::analytics::types::{ChartData, ChartPoint};
use crate::detection::kinematics::KMH_TO_MS;
use crate::model::{DrivingEvent, TelemetryPoint};

/// Hard cap on the number of chart samples returned.
const MAX_CHART_POINTS: usize = 5000;

/// Pairs further apart than this get a zero acceleration on the chart
/// rather than a misleading near-zero slope across a gap.
const MAX_CHART_PAIR_SECS: f64 = 60.0;

/// Decimation step by window length, tuned for ~3-second GPS cadence.
fn sampling_interval(period_days: i64) -> usize {
    if period_days <= 1 {
        6
    } else if period_days <= 3 {
        20
    } else if period_days <= 7 {
        40
    } else {
        120
    }
}

fn truncate_to_second(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_nanosecond(0).unwrap_or(time)
}

/// Builds the chart series: every Nth telemetry point plus every point
/// coincident with an event, each annotated with the event when one
/// matches on the (second-truncated) timestamp. Events with no matching
/// telemetry point are appended as standalone samples.
pub fn build_chart(
    vehicle_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    points: &[TelemetryPoint],
    events: &[DrivingEvent],
) -> ChartData {
    let period_days = ((end - start).num_days()).max(1);
    let interval = sampling_interval(period_days);

    let events_by_second: HashMap<DateTime<Utc>, &DrivingEvent> = events
        .iter()
        .map(|e| (truncate_to_second(e.time), e))
        .collect();

    let mut data_points = Vec::new();
    let mut matched: HashSet<DateTime<Utc>> = HashSet::new();

    for (i, point) in points.iter().enumerate() {
        let second = truncate_to_second(point.time);
        let event = events_by_second.get(&second).copied();

        if i % interval != 0 && event.is_none() {
            continue;
        }
        if data_points.len() >= MAX_CHART_POINTS {
            break;
        }

        // Pairwise acceleration with the same zero-or-negative-delta guard
        // as the extractor; long gaps chart as zero.
        let acceleration_ms2 = if i > 0 {
            let before = &points[i - 1];
            let dt_secs = (point.time - before.time).num_milliseconds() as f64 / 1000.0;
            match (before.speed_kmh, point.speed_kmh) {
                (Some(v1), Some(v2)) if dt_secs > 0.0 && dt_secs < MAX_CHART_PAIR_SECS => {
                    (v2 - v1) * KMH_TO_MS / dt_secs
                }
                _ => 0.0,
            }
        } else {
            0.0
        };

        if event.is_some() {
            matched.insert(second);
        }

        data_points.push(ChartPoint {
            time: point.time,
            speed_kmh: point.speed_kmh.unwrap_or(0.0),
            acceleration_ms2,
            event_type: event.map(|e| e.event_type),
            severity: event.map(|e| e.severity),
            g_force: event.map(|e| e.g_force),
        });
    }

    // Events with no surviving telemetry sample still chart.
    for event in events {
        let second = truncate_to_second(event.time);
        if matched.contains(&second) {
            continue;
        }
        data_points.push(ChartPoint {
            time: event.time,
            speed_kmh: event.speed_after_kmh,
            acceleration_ms2: event.acceleration_ms2,
            event_type: Some(event.event_type),
            severity: Some(event.severity),
            g_force: Some(event.g_force),
        });
    }

    data_points.sort_by_key(|p| p.time);

    let garage_no = points
        .first()
        .map(|p| p.garage_no.clone())
        .or_else(|| events.first().map(|e| e.garage_no.clone()))
        .unwrap_or_else(|| format!("V{vehicle_id}"));

    ChartData {
        vehicle_id,
        garage_no,
        start,
        end,
        total_points: data_points.len() as u64,
        event_count: events.len() as u64,
        data_points,
    }
}
