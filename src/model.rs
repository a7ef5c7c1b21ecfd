//! Shared data model: telemetry points, derived kinematics, driving events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One raw GPS sample for a vehicle, as delivered by the telemetry store.
///
/// Position and speed are optional: trackers occasionally emit rows with
/// missing fields, and those are skipped (with a warning) wherever a
/// computation needs the missing value, never treated as fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    pub vehicle_id: i64,
    pub garage_no: String,
    pub time: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub course: Option<f64>,
}

/// Derived kinematics between two temporally adjacent telemetry points.
///
/// Ephemeral: computed on the fly, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicSample {
    /// Timestamp of the trailing point of the pair.
    pub time: DateTime<Utc>,
    pub speed_before_kmh: f64,
    pub speed_after_kmh: f64,
    /// Longitudinal acceleration in m/s². Negative = deceleration.
    pub acceleration_ms2: f64,
    /// Acceleration as a multiple of standard gravity, signed.
    pub g_force: f64,
}

/// Kind of harsh driving event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    HarshAcceleration,
    HarshBraking,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::HarshAcceleration => "harsh_acceleration",
            EventType::HarshBraking => "harsh_braking",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    /// Accepts both the stored form and the short API form
    /// ("acceleration" / "braking").
    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "harsh_acceleration" | "acceleration" => Ok(EventType::HarshAcceleration),
            "harsh_braking" | "braking" => Ok(EventType::HarshBraking),
            other => Err(Error::InvalidFilter {
                field: "event type",
                value: other.to_string(),
            }),
        }
    }
}

/// Severity tier of a driving event. A total order: 1 < 3 < 5.
///
/// Externally the tier is the integer; API filters may also use the string
/// form, which maps bidirectionally and deterministically onto the same
/// three tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Severity {
    Normal = 1,
    Moderate = 3,
    Severe = 5,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

impl From<Severity> for u8 {
    fn from(s: Severity) -> u8 {
        s as u8
    }
}

impl TryFrom<u8> for Severity {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self, Error> {
        match v {
            1 => Ok(Severity::Normal),
            3 => Ok(Severity::Moderate),
            5 => Ok(Severity::Severe),
            other => Err(Error::InvalidFilter {
                field: "severity",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "normal" => Ok(Severity::Normal),
            "moderate" => Ok(Severity::Moderate),
            "severe" => Ok(Severity::Severe),
            other => Err(Error::InvalidFilter {
                field: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// A persisted harsh-driving event. Immutable after creation.
///
/// `(vehicle_id, time, event_type)` is the idempotency key: re-detection
/// over an overlapping window must never create a second record for the
/// same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivingEvent {
    pub vehicle_id: i64,
    pub garage_no: String,
    pub time: DateTime<Utc>,
    pub event_type: EventType,
    pub severity: Severity,
    pub speed_before_kmh: f64,
    pub speed_after_kmh: f64,
    pub acceleration_ms2: f64,
    pub g_force: f64,
    /// Location of the trailing telemetry point that produced the event.
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl DrivingEvent {
    /// The idempotency key for conditional insertion.
    pub fn key(&self) -> (i64, DateTime<Utc>, EventType) {
        (self.vehicle_id, self.time, self.event_type)
    }
}

/// Aggregate counts returned by a batch detection call.
///
/// Reflects the matching events present after the call, so probing counts
/// before and after a re-run over the same window observes no growth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub total_events: u64,
    pub acceleration_count: u64,
    pub braking_count: u64,
    pub moderate_count: u64,
    pub severe_count: u64,
}

impl DetectionResult {
    pub fn record(&mut self, event: &DrivingEvent) {
        self.total_events += 1;
        match event.event_type {
            EventType::HarshAcceleration => self.acceleration_count += 1,
            EventType::HarshBraking => self.braking_count += 1,
        }
        match event.severity {
            Severity::Moderate => self.moderate_count += 1,
            Severity::Severe => self.severe_count += 1,
            Severity::Normal => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_integer_mapping_is_bidirectional() {
        for s in [Severity::Normal, Severity::Moderate, Severity::Severe] {
            assert_eq!(Severity::try_from(u8::from(s)).unwrap(), s);
        }
        assert_eq!(u8::from(Severity::Normal), 1);
        assert_eq!(u8::from(Severity::Moderate), 3);
        assert_eq!(u8::from(Severity::Severe), 5);
    }

    #[test]
    fn test_severity_string_mapping_is_bidirectional() {
        for s in [Severity::Normal, Severity::Moderate, Severity::Severe] {
            assert_eq!(s.as_str().parse::<Severity>().unwrap(), s);
        }
    }

    #[test]
    fn test_severity_rejects_unknown_values() {
        assert!("extreme".parse::<Severity>().is_err());
        assert!(Severity::try_from(2).is_err());
        assert!(Severity::try_from(4).is_err());
    }

    #[test]
    fn test_severity_is_totally_ordered() {
        assert!(Severity::Normal < Severity::Moderate);
        assert!(Severity::Moderate < Severity::Severe);
    }

    #[test]
    fn test_event_type_accepts_short_api_form() {
        assert_eq!(
            "acceleration".parse::<EventType>().unwrap(),
            EventType::HarshAcceleration
        );
        assert_eq!(
            "harsh_braking".parse::<EventType>().unwrap(),
            EventType::HarshBraking
        );
        assert!("cornering".parse::<EventType>().is_err());
    }

    #[test]
    fn test_severity_serializes_as_integer_tier() {
        let json = serde_json::to_string(&Severity::Severe).unwrap();
        assert_eq!(json, "5");
        let back: Severity = serde_json::from_str("3").unwrap();
        assert_eq!(back, Severity::Moderate);
    }

    #[test]
    fn test_detection_result_record() {
        let mut result = DetectionResult::default();
        let event = DrivingEvent {
            vehicle_id: 460,
            garage_no: "P93597".to_string(),
            time: Utc::now(),
            event_type: EventType::HarshBraking,
            severity: Severity::Severe,
            speed_before_kmh: 50.0,
            speed_after_kmh: 10.0,
            acceleration_ms2: -5.5,
            g_force: -0.56,
            lat: Some(44.8),
            lng: Some(20.4),
        };
        result.record(&event);

        assert_eq!(result.total_events, 1);
        assert_eq!(result.braking_count, 1);
        assert_eq!(result.acceleration_count, 0);
        assert_eq!(result.severe_count, 1);
        assert_eq!(result.moderate_count, 0);
    }
}
