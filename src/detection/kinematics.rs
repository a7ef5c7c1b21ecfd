//! Derives per-interval acceleration from consecutive telemetry points.

use tracing::{debug, warn};

use crate::config::DetectionConfig;
use crate::model::{KinematicSample, TelemetryPoint};

/// km/h to m/s.
pub const KMH_TO_MS: f64 = 1000.0 / 3600.0;
/// Standard gravity in m/s².
pub const STANDARD_GRAVITY_MS2: f64 = 9.81;

/// Turns an ordered telemetry sequence into a lazy sequence of
/// [`KinematicSample`]s, one per usable consecutive pair.
///
/// A pair is unusable, and produces no sample, when:
/// - either point is missing its speed (malformed input, warned and skipped),
/// - the time delta is zero or negative (duplicate or non-monotonic
///   timestamps, warned and skipped, never divided by),
/// - the time delta exceeds the configured maximum sampling gap (a data
///   outage; synthesizing across it would fabricate extreme accelerations).
pub struct KinematicsExtractor {
    config: DetectionConfig,
}

impl KinematicsExtractor {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Samples paired with the trailing point that produced them, for
    /// callers that need the point's identity and location.
    pub fn annotated<'a>(
        &'a self,
        points: &'a [TelemetryPoint],
    ) -> impl Iterator<Item = (KinematicSample, &'a TelemetryPoint)> + 'a {
        points
            .windows(2)
            .filter_map(move |pair| self.sample_for(&pair[0], &pair[1]).map(|s| (s, &pair[1])))
    }

    /// The kinematic samples alone.
    pub fn samples<'a>(
        &'a self,
        points: &'a [TelemetryPoint],
    ) -> impl Iterator<Item = KinematicSample> + 'a {
        self.annotated(points).map(|(sample, _)| sample)
    }

    fn sample_for(
        &self,
        before: &TelemetryPoint,
        after: &TelemetryPoint,
    ) -> Option<KinematicSample> {
        let (Some(speed_before), Some(speed_after)) = (before.speed_kmh, after.speed_kmh) else {
            warn!(
                vehicle_id = after.vehicle_id,
                time = %after.time,
                "Skipping pair with missing speed"
            );
            return None;
        };

        let dt_secs = (after.time - before.time).num_milliseconds() as f64 / 1000.0;
        if dt_secs <= 0.0 {
            warn!(
                vehicle_id = after.vehicle_id,
                time = %after.time,
                "Skipping pair with non-monotonic or duplicate timestamps"
            );
            return None;
        }
        if dt_secs > self.config.max_sample_gap_secs as f64 {
            debug!(
                vehicle_id = after.vehicle_id,
                gap_secs = dt_secs,
                "Data outage, not sampling across gap"
            );
            return None;
        }

        let acceleration_ms2 = (speed_after - speed_before) * KMH_TO_MS / dt_secs;
        Some(KinematicSample {
            time: after.time,
            speed_before_kmh: speed_before,
            speed_after_kmh: speed_after,
            acceleration_ms2,
            g_force: acceleration_ms2 / STANDARD_GRAVITY_MS2,
        })
    }
}
