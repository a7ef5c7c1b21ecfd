//! Thresholds derived kinematics into severity-tagged driving events.

use crate::config::DetectionConfig;
use crate::model::{DrivingEvent, EventType, KinematicSample, Severity, TelemetryPoint};

/// Maps one kinematic sample to zero or one driving event.
///
/// Severity is purely a function of acceleration magnitude, so the same
/// thresholds apply symmetrically to acceleration and braking. Boundary
/// values promote to the higher tier (inclusive lower bound).
pub struct EventClassifier {
    config: DetectionConfig,
}

impl EventClassifier {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Severity tier for an acceleration, or `None` below the moderate
    /// threshold (no event).
    pub fn severity_for(&self, acceleration_ms2: f64) -> Option<Severity> {
        let magnitude = acceleration_ms2.abs();
        if magnitude < self.config.accel_moderate_ms2 {
            None
        } else if magnitude < self.config.accel_severe_ms2 {
            Some(Severity::Moderate)
        } else {
            Some(Severity::Severe)
        }
    }

    /// Builds the event record for a sample, anchored to the trailing
    /// telemetry point of the pair that produced it.
    pub fn classify(
        &self,
        garage_no: &str,
        trailing: &TelemetryPoint,
        sample: &KinematicSample,
    ) -> Option<DrivingEvent> {
        let severity = self.severity_for(sample.acceleration_ms2)?;
        let event_type = if sample.acceleration_ms2 > 0.0 {
            EventType::HarshAcceleration
        } else {
            EventType::HarshBraking
        };

        Some(DrivingEvent {
            vehicle_id: trailing.vehicle_id,
            garage_no: garage_no.to_string(),
            time: sample.time,
            event_type,
            severity,
            speed_before_kmh: sample.speed_before_kmh,
            speed_after_kmh: sample.speed_after_kmh,
            acceleration_ms2: sample.acceleration_ms2,
            g_force: sample.g_force,
            lat: trailing.lat,
            lng: trailing.lng,
        })
    }
}
