//! Threshold and policy configuration.
//!
//! All tunables are plain immutable values passed into the extractor,
//! classifier and aggregator at construction time. Defaults follow the
//! fleet's production tuning; operators override per fleet or vehicle
//! class via a JSON config file or CLI flags, never by editing code.

use serde::Deserialize;

use crate::error::Error;

/// Tunables for kinematics extraction and event classification.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    /// At or above this acceleration magnitude an event is Moderate.
    pub accel_moderate_ms2: f64,
    /// At or above this acceleration magnitude an event is Severe.
    pub accel_severe_ms2: f64,
    /// Point pairs further apart than this are a data outage, not a
    /// sample. Prevents sensor dropouts from looking like extreme
    /// accelerations.
    pub max_sample_gap_secs: i64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            accel_moderate_ms2: 2.0,
            accel_severe_ms2: 4.0,
            max_sample_gap_secs: 300,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.accel_moderate_ms2 <= 0.0 || self.accel_severe_ms2 <= self.accel_moderate_ms2 {
            return Err(Error::Config(format!(
                "acceleration thresholds must satisfy 0 < moderate < severe, got {} / {}",
                self.accel_moderate_ms2, self.accel_severe_ms2
            )));
        }
        if self.max_sample_gap_secs <= 0 {
            return Err(Error::Config(format!(
                "max_sample_gap_secs must be positive, got {}",
                self.max_sample_gap_secs
            )));
        }
        Ok(())
    }
}

/// Tunables for the analytics aggregator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Below this speed a point counts toward an idle run.
    pub idle_speed_kmh: f64,
    /// An idle run shorter than this is a pause in traffic, not a stop.
    pub min_idle_secs: i64,
    /// Consecutive points implying a jump faster than this are a GPS
    /// glitch; the pair contributes zero distance.
    pub glitch_speed_kmh: f64,
    /// Pairs further apart than this contribute neither distance nor
    /// driving/idle time.
    pub max_sample_gap_secs: i64,
    /// Upper bounds of the speed distribution buckets, ascending. The
    /// final open-ended bucket is implied.
    pub speed_bucket_bounds_kmh: Vec<f64>,
    /// Safety score penalty per moderate event.
    pub moderate_penalty: f64,
    /// Safety score penalty per severe event.
    pub severe_penalty: f64,
    /// Efficiency penalty per weighted event per 100 km driven.
    pub efficiency_event_weight: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            idle_speed_kmh: 2.0,
            min_idle_secs: 60,
            glitch_speed_kmh: 150.0,
            max_sample_gap_secs: 300,
            speed_bucket_bounds_kmh: vec![20.0, 40.0, 60.0, 80.0],
            moderate_penalty: 2.0,
            severe_penalty: 5.0,
            efficiency_event_weight: 1.0,
        }
    }
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.speed_bucket_bounds_kmh.is_empty()
            || !self
                .speed_bucket_bounds_kmh
                .windows(2)
                .all(|w| w[0] < w[1])
        {
            return Err(Error::Config(
                "speed_bucket_bounds_kmh must be non-empty and strictly ascending".to_string(),
            ));
        }
        if self.moderate_penalty > self.severe_penalty {
            return Err(Error::Config(format!(
                "moderate penalty {} must not exceed severe penalty {}",
                self.moderate_penalty, self.severe_penalty
            )));
        }
        if self.min_idle_secs < 0 || self.max_sample_gap_secs <= 0 {
            return Err(Error::Config(
                "idle and gap durations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file shape: both sections optional, defaults
/// applied per field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub analytics: AnalyticsConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), Error> {
        self.detection.validate()?;
        self.analytics.validate()
    }
}
