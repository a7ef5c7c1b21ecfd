//! Store seams for telemetry input and event persistence.
//!
//! The engine never owns a database: it reads ordered GPS samples from a
//! [`TelemetryStore`] and conditionally inserts derived events into an
//! [`EventStore`]. Both are async traits so production backends, the CSV
//! file stores, and the in-memory test store are interchangeable.

mod csvfile;
mod memory;

pub use csvfile::{CsvEventStore, CsvTelemetryStore};
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, StoreError};
use crate::model::{DrivingEvent, EventType, Severity, TelemetryPoint};

/// Outcome of a conditional insert against the idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same `(vehicle_id, time, event_type)` key already
    /// exists. Treated as success, never as an error.
    Conflict,
}

/// Optional narrowing of event queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub severity: Option<Severity>,
    pub event_type: Option<EventType>,
}

impl EventFilter {
    /// Parses API-surface filter strings. Unrecognized values are a client
    /// error, not a silent no-op.
    pub fn parse(severity: Option<&str>, event_type: Option<&str>) -> Result<Self, Error> {
        Ok(Self {
            severity: severity.map(str::parse).transpose()?,
            event_type: event_type.map(str::parse).transpose()?,
        })
    }

    pub fn matches(&self, event: &DrivingEvent) -> bool {
        self.severity.is_none_or(|s| s == event.severity)
            && self.event_type.is_none_or(|t| t == event.event_type)
    }
}

/// One page of a paginated event listing, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct EventPage {
    pub events: Vec<DrivingEvent>,
    pub total: u64,
    pub page: usize,
    pub limit: usize,
}

/// Read-only source of time-ordered GPS samples.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Returns points for the vehicle in `[start, end]`, strictly
    /// time-sorted ascending. Duplicate timestamps are permitted input
    /// downstream; the store must not fail on them.
    async fn fetch_telemetry(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TelemetryPoint>, StoreError>;
}

/// Persisted, queryable driving events with conditional insertion.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_event(
        &self,
        vehicle_id: i64,
        time: DateTime<Utc>,
        event_type: EventType,
    ) -> Result<Option<DrivingEvent>, StoreError>;

    /// Inserts unless the idempotency key is already taken. The check and
    /// the write are atomic with respect to concurrent callers.
    async fn insert_event(&self, event: &DrivingEvent) -> Result<InsertOutcome, StoreError>;

    async fn count_events(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &EventFilter,
    ) -> Result<u64, StoreError>;

    async fn list_events(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &EventFilter,
        page: usize,
        limit: usize,
    ) -> Result<EventPage, StoreError>;
}

/// Collects every event for a vehicle in range, paging through the store.
pub async fn collect_events(
    store: &dyn EventStore,
    vehicle_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<DrivingEvent>, StoreError> {
    const PAGE_LIMIT: usize = 1000;

    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let batch = store
            .list_events(vehicle_id, start, end, &EventFilter::default(), page, PAGE_LIMIT)
            .await?;
        let fetched = batch.events.len();
        all.extend(batch.events);
        if fetched < PAGE_LIMIT {
            break;
        }
        page += 1;
    }
    // Listing order is newest-first; analytics wants chronological.
    all.sort_by_key(|e| e.time);
    Ok(all)
}
