//! Error taxonomy for the detection and analytics engine.
//!
//! "No data in range" and "event already present" are deliberately not
//! errors: the former yields a zero-valued result, the latter is the
//! idempotent success path of a conditional insert.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures originating in a telemetry or event store.
///
/// These are transient from the engine's point of view: the caller owns
/// the retry policy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV decode failure: {0}")]
    Csv(#[from] csv::Error),

    #[error("corrupt store record: {0}")]
    Corrupt(String),
}

/// Engine-level errors surfaced to callers.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any store access.
    #[error("invalid time range: end {end} is not after start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// An unrecognized filter string from an API caller. Never a silent no-op.
    #[error("unrecognized {field} filter value {value:?}")]
    InvalidFilter { field: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Fatal to the current vehicle's call, isolated from sibling calls
    /// in a fleet run.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
