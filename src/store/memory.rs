//! In-memory store backing tests and single-process runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{DrivingEvent, EventType, TelemetryPoint};
use crate::store::{EventFilter, EventPage, EventStore, InsertOutcome, TelemetryStore};

type EventKey = (i64, DateTime<Utc>, EventType);

/// A process-local store implementing both seams.
///
/// Conditional insertion holds the map lock across the contains-check and
/// the write, so concurrent detections of overlapping windows converge on
/// one record per idempotency key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    telemetry: Mutex<HashMap<i64, Vec<TelemetryPoint>>>,
    events: Mutex<HashMap<EventKey, DrivingEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads telemetry points, keeping each vehicle's series time-sorted.
    pub fn insert_points(&self, points: Vec<TelemetryPoint>) {
        let mut map = self.telemetry.lock().unwrap();
        for point in points {
            map.entry(point.vehicle_id).or_default().push(point);
        }
        for series in map.values_mut() {
            series.sort_by_key(|p| p.time);
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn fetch_telemetry(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TelemetryPoint>, StoreError> {
        let map = self.telemetry.lock().unwrap();
        Ok(map
            .get(&vehicle_id)
            .map(|series| {
                series
                    .iter()
                    .filter(|p| p.time >= start && p.time <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_event(
        &self,
        vehicle_id: i64,
        time: DateTime<Utc>,
        event_type: EventType,
    ) -> Result<Option<DrivingEvent>, StoreError> {
        let events = self.events.lock().unwrap();
        Ok(events.get(&(vehicle_id, time, event_type)).cloned())
    }

    async fn insert_event(&self, event: &DrivingEvent) -> Result<InsertOutcome, StoreError> {
        let mut events = self.events.lock().unwrap();
        match events.entry(event.key()) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(InsertOutcome::Conflict),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(event.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn count_events(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &EventFilter,
    ) -> Result<u64, StoreError> {
        let events = self.events.lock().unwrap();
        Ok(events
            .values()
            .filter(|e| {
                e.vehicle_id == vehicle_id
                    && e.time >= start
                    && e.time <= end
                    && filter.matches(e)
            })
            .count() as u64)
    }

    async fn list_events(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &EventFilter,
        page: usize,
        limit: usize,
    ) -> Result<EventPage, StoreError> {
        let events = self.events.lock().unwrap();
        let mut matching: Vec<DrivingEvent> = events
            .values()
            .filter(|e| {
                e.vehicle_id == vehicle_id
                    && e.time >= start
                    && e.time <= end
                    && filter.matches(e)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.time.cmp(&a.time));

        let total = matching.len() as u64;
        let offset = page.saturating_sub(1) * limit;
        let events = matching.into_iter().skip(offset).take(limit).collect();

        Ok(EventPage {
            events,
            total,
            page,
            limit,
        })
    }
}
