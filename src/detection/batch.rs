//! Batch detection for one vehicle and time window.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::DetectionConfig;
use crate::detection::classifier::EventClassifier;
use crate::detection::kinematics::KinematicsExtractor;
use crate::error::{Error, Result};
use crate::model::DetectionResult;
use crate::store::{EventStore, InsertOutcome, TelemetryStore};

/// Orchestrates extraction, classification and idempotent persistence over
/// a telemetry window. Re-running over an overlapping or identical window
/// never changes the total event count.
pub struct BatchDetector {
    telemetry: Arc<dyn TelemetryStore>,
    events: Arc<dyn EventStore>,
    extractor: KinematicsExtractor,
    classifier: EventClassifier,
}

impl BatchDetector {
    pub fn new(
        telemetry: Arc<dyn TelemetryStore>,
        events: Arc<dyn EventStore>,
        config: DetectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            telemetry,
            events,
            extractor: KinematicsExtractor::new(config.clone()),
            classifier: EventClassifier::new(config),
        })
    }

    /// Detects harsh-driving events for the vehicle in `[start, end]`.
    ///
    /// The returned counts cover the matching events present after the
    /// call, whether inserted by it or already in the store. An empty
    /// telemetry window is a valid, silent outcome: all zeros, no error.
    #[tracing::instrument(skip(self), fields(vehicle_id, garage_no))]
    pub async fn detect(
        &self,
        vehicle_id: i64,
        garage_no: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DetectionResult> {
        if end <= start {
            return Err(Error::InvalidRange { start, end });
        }

        let points = self.telemetry.fetch_telemetry(vehicle_id, start, end).await?;
        if points.is_empty() {
            info!(vehicle_id, "No telemetry in window");
            return Ok(DetectionResult::default());
        }
        debug!(vehicle_id, count = points.len(), "Telemetry window fetched");

        let mut result = DetectionResult::default();
        let mut inserted = 0u64;
        let mut already_present = 0u64;

        for (sample, trailing) in self.extractor.annotated(&points) {
            let Some(event) = self.classifier.classify(garage_no, trailing, &sample) else {
                continue;
            };

            match self.events.insert_event(&event).await.map_err(Error::Store)? {
                InsertOutcome::Inserted => inserted += 1,
                InsertOutcome::Conflict => {
                    debug!(
                        vehicle_id,
                        time = %event.time,
                        event_type = %event.event_type,
                        "Event already present, skipping"
                    );
                    already_present += 1;
                }
            }
            result.record(&event);
        }

        info!(
            vehicle_id,
            total = result.total_events,
            inserted,
            already_present,
            severe = result.severe_count,
            moderate = result.moderate_count,
            "Detection complete"
        );
        Ok(result)
    }
}
