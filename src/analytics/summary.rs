//! Analytics aggregation: distance, motion partition, scores and rollups.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use tracing::debug;

use crate::analytics::chart;
use crate::analytics::types::{
    AnalyticsSummary, ChartData, DailyStat, EventStatistics, HourlyStat, SpeedBucket,
};
use crate::analytics::util::{haversine_km, mean, round1};
use crate::config::AnalyticsConfig;
use crate::error::{Error, Result};
use crate::model::{DrivingEvent, EventType, Severity, TelemetryPoint};
use crate::store::{EventStore, TelemetryStore, collect_events};

/// Computes derived analytics for a vehicle from stored telemetry and
/// events. Every result is a pure function of the rows in range.
pub struct AnalyticsAggregator {
    telemetry: Arc<dyn TelemetryStore>,
    events: Arc<dyn EventStore>,
    config: AnalyticsConfig,
}

impl AnalyticsAggregator {
    pub fn new(
        telemetry: Arc<dyn TelemetryStore>,
        events: Arc<dyn EventStore>,
        config: AnalyticsConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            telemetry,
            events,
            config,
        })
    }

    /// Full analytics summary for `[start, end]`.
    #[tracing::instrument(skip(self), fields(vehicle_id))]
    pub async fn summarize(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AnalyticsSummary> {
        if end <= start {
            return Err(Error::InvalidRange { start, end });
        }

        let points = self.telemetry.fetch_telemetry(vehicle_id, start, end).await?;
        let events = collect_events(self.events.as_ref(), vehicle_id, start, end).await?;
        debug!(vehicle_id, points = points.len(), events = events.len(), "Summarizing window");

        Ok(summarize_window(&points, &events, &self.config))
    }

    /// Event-side statistics (counts, g-forces, density, safety score).
    #[tracing::instrument(skip(self), fields(vehicle_id))]
    pub async fn event_statistics(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<EventStatistics> {
        if end <= start {
            return Err(Error::InvalidRange { start, end });
        }

        let points = self.telemetry.fetch_telemetry(vehicle_id, start, end).await?;
        let events = collect_events(self.events.as_ref(), vehicle_id, start, end).await?;
        let distance = distance_profile(&points, &self.config);

        Ok(event_statistics_from(&events, distance.total_km, &self.config))
    }

    /// Ordered per-point chart samples annotated with coincident events.
    #[tracing::instrument(skip(self), fields(vehicle_id))]
    pub async fn chart_data(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ChartData> {
        if end <= start {
            return Err(Error::InvalidRange { start, end });
        }

        let points = self.telemetry.fetch_telemetry(vehicle_id, start, end).await?;
        let events = collect_events(self.events.as_ref(), vehicle_id, start, end).await?;

        Ok(chart::build_chart(vehicle_id, start, end, &points, &events))
    }
}

/// Distance sums with GPS glitch filtering. The flag marks the trailing
/// point of a pair whose implied speed is implausible; such pairs
/// contribute zero distance instead of corrupting the sum.
struct DistanceProfile {
    total_km: f64,
    per_hour: BTreeMap<u32, f64>,
    per_day: BTreeMap<NaiveDate, f64>,
    glitch: Vec<bool>,
}

fn distance_profile(points: &[TelemetryPoint], config: &AnalyticsConfig) -> DistanceProfile {
    let mut profile = DistanceProfile {
        total_km: 0.0,
        per_hour: BTreeMap::new(),
        per_day: BTreeMap::new(),
        glitch: vec![false; points.len()],
    };

    for i in 1..points.len() {
        let before = &points[i - 1];
        let after = &points[i];

        let dt_secs = (after.time - before.time).num_milliseconds() as f64 / 1000.0;
        if dt_secs <= 0.0 || dt_secs > config.max_sample_gap_secs as f64 {
            continue;
        }
        let (Some(lat1), Some(lng1), Some(lat2), Some(lng2)) =
            (before.lat, before.lng, after.lat, after.lng)
        else {
            continue;
        };

        let d_km = haversine_km(lat1, lng1, lat2, lng2);
        let implied_kmh = d_km / dt_secs * 3600.0;
        if implied_kmh > config.glitch_speed_kmh {
            profile.glitch[i] = true;
            continue;
        }

        profile.total_km += d_km;
        *profile.per_hour.entry(after.time.hour()).or_default() += d_km;
        *profile.per_day.entry(after.time.date_naive()).or_default() += d_km;
    }

    profile
}

/// Elapsed-time partition into driving and idle, plus stop transitions.
struct MotionProfile {
    driving_secs: f64,
    idle_secs: f64,
    total_stops: u64,
    driving_secs_per_day: BTreeMap<NaiveDate, f64>,
}

struct IdleRun {
    secs: f64,
    after_moving: bool,
}

fn motion_profile(points: &[TelemetryPoint], config: &AnalyticsConfig) -> MotionProfile {
    let mut profile = MotionProfile {
        driving_secs: 0.0,
        idle_secs: 0.0,
        total_stops: 0,
        driving_secs_per_day: BTreeMap::new(),
    };

    let min_idle = config.min_idle_secs as f64;
    let mut run: Option<IdleRun> = None;
    let mut seen_moving = false;

    let flush = |run: &mut Option<IdleRun>, profile: &mut MotionProfile| {
        if let Some(r) = run.take() {
            if r.secs > min_idle {
                profile.idle_secs += r.secs;
                if r.after_moving {
                    profile.total_stops += 1;
                }
            } else {
                // A brief pause in traffic still counts as driving time.
                profile.driving_secs += r.secs;
            }
        }
    };

    for i in 1..points.len() {
        let before = &points[i - 1];
        let after = &points[i];

        let dt_secs = (after.time - before.time).num_milliseconds() as f64 / 1000.0;
        if dt_secs <= 0.0 || dt_secs > config.max_sample_gap_secs as f64 {
            continue;
        }
        let (Some(speed_before), Some(speed_after)) = (before.speed_kmh, after.speed_kmh) else {
            continue;
        };

        let idle_pair =
            speed_before < config.idle_speed_kmh && speed_after < config.idle_speed_kmh;
        if idle_pair {
            run.get_or_insert(IdleRun {
                secs: 0.0,
                after_moving: seen_moving,
            })
            .secs += dt_secs;
        } else {
            flush(&mut run, &mut profile);
            profile.driving_secs += dt_secs;
            *profile
                .driving_secs_per_day
                .entry(after.time.date_naive())
                .or_default() += dt_secs;
            seen_moving = true;
        }
    }
    flush(&mut run, &mut profile);

    profile
}

fn speed_distribution(points: &[TelemetryPoint], config: &AnalyticsConfig) -> Vec<SpeedBucket> {
    let bounds = &config.speed_bucket_bounds_kmh;
    let mut counts = vec![0u64; bounds.len() + 1];
    let mut total = 0u64;

    for speed in points.iter().filter_map(|p| p.speed_kmh) {
        let idx = bounds
            .iter()
            .position(|bound| speed < *bound)
            .unwrap_or(bounds.len());
        counts[idx] += 1;
        total += 1;
    }

    counts
        .iter()
        .enumerate()
        .map(|(idx, &count)| {
            let range = if idx == 0 {
                format!("0-{} km/h", bounds[0])
            } else if idx == bounds.len() {
                format!("{}+ km/h", bounds[bounds.len() - 1])
            } else {
                format!("{}-{} km/h", bounds[idx - 1], bounds[idx])
            };
            let percentage = if total == 0 {
                0.0
            } else {
                round1(count as f64 * 100.0 / total as f64)
            };
            SpeedBucket {
                range,
                count,
                percentage,
            }
        })
        .collect()
}

/// Penalty-decremented safety score: starts at 100, floored at 0,
/// deterministic given the event set.
pub fn safety_score(events: &[DrivingEvent], config: &AnalyticsConfig) -> f64 {
    let penalty: f64 = events
        .iter()
        .map(|e| match e.severity {
            Severity::Severe => config.severe_penalty,
            Severity::Moderate => config.moderate_penalty,
            Severity::Normal => 0.0,
        })
        .sum();
    (100.0 - penalty).clamp(0.0, 100.0).round()
}

/// Bounded efficiency score: moving-time share of elapsed time, reduced by
/// severity-weighted event density. More idle time or more severe events
/// never increases it.
fn efficiency_pct(
    driving_secs: f64,
    idle_secs: f64,
    distance_km: f64,
    events: &[DrivingEvent],
    config: &AnalyticsConfig,
) -> f64 {
    let elapsed = driving_secs + idle_secs;
    if elapsed <= 0.0 {
        return 0.0;
    }
    let moving_pct = driving_secs / elapsed * 100.0;

    let weighted_events: f64 = events
        .iter()
        .map(|e| match e.severity {
            Severity::Severe => 2.0,
            Severity::Moderate => 1.0,
            Severity::Normal => 0.0,
        })
        .sum();
    let density_per_100km = weighted_events / distance_km.max(1.0) * 100.0;

    round1((moving_pct - config.efficiency_event_weight * density_per_100km).clamp(0.0, 100.0))
}

/// Full summary over one window's points and events.
pub fn summarize_window(
    points: &[TelemetryPoint],
    events: &[DrivingEvent],
    config: &AnalyticsConfig,
) -> AnalyticsSummary {
    if points.is_empty() {
        return AnalyticsSummary {
            safety_score: safety_score(events, config),
            ..Default::default()
        };
    }

    let distance = distance_profile(points, config);
    let motion = motion_profile(points, config);

    let moving_speeds: Vec<f64> = points
        .iter()
        .filter_map(|p| p.speed_kmh)
        .filter(|s| *s > 0.0)
        .collect();
    let max_speed_kmh = points
        .iter()
        .enumerate()
        .filter(|(i, _)| !distance.glitch[*i])
        .filter_map(|(_, p)| p.speed_kmh)
        .fold(0.0f64, f64::max);

    // Hour-of-day and calendar-day rollups, each with independent
    // distance and average speed.
    let mut hourly: BTreeMap<u32, (u64, Vec<f64>)> = BTreeMap::new();
    let mut daily: BTreeMap<NaiveDate, (u64, Vec<f64>)> = BTreeMap::new();
    for point in points {
        let hour_slot = hourly.entry(point.time.hour()).or_default();
        hour_slot.0 += 1;
        let day_slot = daily.entry(point.time.date_naive()).or_default();
        day_slot.0 += 1;
        if let Some(speed) = point.speed_kmh.filter(|s| *s > 0.0) {
            hour_slot.1.push(speed);
            day_slot.1.push(speed);
        }
    }

    let hourly_data = hourly
        .iter()
        .map(|(hour, (count, speeds))| HourlyStat {
            hour: format!("{hour:02}"),
            points: *count,
            distance_km: distance.per_hour.get(hour).copied().unwrap_or(0.0),
            avg_speed_kmh: round1(mean(speeds)),
        })
        .collect();

    let daily_stats = daily
        .iter()
        .map(|(date, (_, speeds))| DailyStat {
            date: *date,
            distance_km: distance.per_day.get(date).copied().unwrap_or(0.0),
            driving_hours: motion
                .driving_secs_per_day
                .get(date)
                .copied()
                .unwrap_or(0.0)
                / 3600.0,
            avg_speed_kmh: round1(mean(speeds)),
        })
        .collect();

    AnalyticsSummary {
        total_points: points.len() as u64,
        total_distance_km: distance.total_km,
        avg_speed_kmh: round1(mean(&moving_speeds)),
        max_speed_kmh,
        driving_hours: motion.driving_secs / 3600.0,
        idle_time_hours: motion.idle_secs / 3600.0,
        total_stops: motion.total_stops,
        efficiency_pct: efficiency_pct(
            motion.driving_secs,
            motion.idle_secs,
            distance.total_km,
            events,
            config,
        ),
        safety_score: safety_score(events, config),
        speed_distribution: speed_distribution(points, config),
        hourly_data,
        daily_stats,
    }
}

/// Event statistics over one window's events, with density against the
/// window's driven distance.
pub fn event_statistics_from(
    events: &[DrivingEvent],
    total_distance_km: f64,
    config: &AnalyticsConfig,
) -> EventStatistics {
    let mut stats = EventStatistics {
        total_distance_km,
        safety_score: safety_score(events, config),
        ..Default::default()
    };

    let mut hour_counts: BTreeMap<u32, u64> = BTreeMap::new();
    let mut g_magnitudes = Vec::with_capacity(events.len());

    for event in events {
        stats.total_events += 1;
        match (event.event_type, event.severity) {
            (EventType::HarshAcceleration, Severity::Severe) => stats.severe_accelerations += 1,
            (EventType::HarshAcceleration, _) => stats.moderate_accelerations += 1,
            (EventType::HarshBraking, Severity::Severe) => stats.severe_brakings += 1,
            (EventType::HarshBraking, _) => stats.moderate_brakings += 1,
        }
        g_magnitudes.push(event.g_force.abs());
        *hour_counts.entry(event.time.hour()).or_default() += 1;
    }

    stats.avg_g_force = mean(&g_magnitudes);
    stats.max_g_force = g_magnitudes.iter().copied().fold(0.0, f64::max);
    stats.events_per_100km = if total_distance_km > 0.0 {
        stats.total_events as f64 / total_distance_km * 100.0
    } else {
        0.0
    };
    // Modal hour; ties resolve to the earliest hour.
    let mut best: Option<(u32, u64)> = None;
    for (hour, count) in hour_counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((hour, count));
        }
    }
    stats.most_common_hour = best.map(|(h, _)| h).unwrap_or(0);

    stats
}
