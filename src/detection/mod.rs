//! Harsh-driving detection pipeline.
//!
//! Raw telemetry flows through the kinematics extractor into the
//! classifier; the batch detector orchestrates one vehicle and window with
//! idempotent writes, and the fleet runner dispatches batches across many
//! vehicles in parallel with isolated failures.

pub mod batch;
pub mod classifier;
pub mod fleet;
pub mod kinematics;

pub use batch::BatchDetector;
pub use classifier::EventClassifier;
pub use fleet::{FleetReport, VehicleOutcome, VehicleRef, run_fleet};
pub use kinematics::KinematicsExtractor;
