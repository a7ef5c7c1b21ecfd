//! Fleet-wide detection dispatch.
//!
//! One task per vehicle under a concurrency cap; a vehicle's failure is
//! captured in its own outcome and never aborts or rolls back siblings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{Instrument, error, info};

use crate::detection::batch::BatchDetector;
use crate::model::DetectionResult;

/// A vehicle to run detection for.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleRef {
    pub vehicle_id: i64,
    pub garage_no: String,
}

/// Per-vehicle result of a fleet run: either counts or a captured error.
#[derive(Debug, Serialize)]
pub struct VehicleOutcome {
    pub vehicle_id: i64,
    pub garage_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DetectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Join/reduce summary over one fleet run.
#[derive(Debug, Serialize)]
pub struct FleetReport {
    pub success_count: usize,
    pub error_count: usize,
    pub total_events: u64,
    pub outcomes: Vec<VehicleOutcome>,
}

/// Runs detection for every vehicle over the same window.
///
/// No shared mutable counters: each task produces its own outcome and the
/// report is reduced after the join.
pub async fn run_fleet(
    detector: Arc<BatchDetector>,
    vehicles: Vec<VehicleRef>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    concurrency: usize,
) -> FleetReport {
    info!(
        vehicle_count = vehicles.len(),
        concurrency,
        %start,
        %end,
        "Starting fleet detection"
    );

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(vehicles.len());

    for vehicle in vehicles {
        let sem = semaphore.clone();
        let detector = detector.clone();

        let span = tracing::info_span!(
            "detect_vehicle",
            vehicle_id = vehicle.vehicle_id,
            garage_no = %vehicle.garage_no,
        );

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire().await.unwrap();

                match detector
                    .detect(vehicle.vehicle_id, &vehicle.garage_no, start, end)
                    .await
                {
                    Ok(result) => VehicleOutcome {
                        vehicle_id: vehicle.vehicle_id,
                        garage_no: vehicle.garage_no,
                        result: Some(result),
                        error: None,
                    },
                    Err(e) => {
                        error!(error = %e, "Vehicle detection failed");
                        VehicleOutcome {
                            vehicle_id: vehicle.vehicle_id,
                            garage_no: vehicle.garage_no,
                            result: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
            .instrument(span),
        );

        tasks.push(task);
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => error!(error = %e, "Detection task panicked"),
        }
    }

    let success_count = outcomes.iter().filter(|o| o.result.is_some()).count();
    let error_count = outcomes.len() - success_count;
    let total_events = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref())
        .map(|r| r.total_events)
        .sum();

    info!(success_count, error_count, total_events, "Fleet detection complete");

    FleetReport {
        success_count,
        error_count,
        total_events,
        outcomes,
    }
}
