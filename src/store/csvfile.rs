//! CSV-file-backed stores, partitioned per vehicle.
//!
//! Layout under a data root:
//!
//! ```text
//! <root>/vehicle_id=<id>/date=YYYY-MM-DD.csv   telemetry, read-only
//! <root>/vehicle_id=<id>/events.csv            detected events, append-only
//! ```
//!
//! Event files are loaded into a keyed cache on first touch, so conditional
//! inserts stay idempotent across process restarts.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::{DrivingEvent, EventType, TelemetryPoint};
use crate::output::append_record;
use crate::store::{EventFilter, EventPage, EventStore, InsertOutcome, TelemetryStore};

const VEHICLE_PREFIX: &str = "vehicle_id=";

fn vehicle_dir(root: &Path, vehicle_id: i64) -> PathBuf {
    root.join(format!("{VEHICLE_PREFIX}{vehicle_id}"))
}

/// Read-only telemetry source over per-day CSV partitions.
pub struct CsvTelemetryStore {
    root: PathBuf,
}

impl CsvTelemetryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Lists the vehicle ids that have a telemetry partition.
    pub fn vehicle_ids(&self) -> Result<Vec<i64>, StoreError> {
        let mut ids = Vec::new();

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(dir_name) = entry.file_name().to_str() {
                if let Some(raw_id) = dir_name.strip_prefix(VEHICLE_PREFIX) {
                    match raw_id.parse::<i64>() {
                        Ok(id) => ids.push(id),
                        Err(_) => warn!(dir = dir_name, "Skipping non-numeric vehicle partition"),
                    }
                }
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }

    fn load_day(
        &self,
        vehicle_id: i64,
        date: NaiveDate,
        points: &mut Vec<TelemetryPoint>,
    ) -> Result<(), StoreError> {
        let path = vehicle_dir(&self.root, vehicle_id)
            .join(format!("date={}.csv", date.format("%Y-%m-%d")));
        if !path.exists() {
            return Ok(());
        }

        let file = File::open(&path)?;
        let mut reader = csv::Reader::from_reader(file);
        for result in reader.deserialize() {
            match result {
                Ok(point) => points.push(point),
                // A malformed row is skipped, never fatal to the batch.
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping malformed telemetry row"),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for CsvTelemetryStore {
    async fn fetch_telemetry(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TelemetryPoint>, StoreError> {
        let mut points = Vec::new();

        let mut date = start.date_naive();
        let last = end.date_naive();
        while date <= last {
            self.load_day(vehicle_id, date, &mut points)?;
            date = date
                .checked_add_days(Days::new(1))
                .ok_or_else(|| StoreError::Corrupt("date overflow".to_string()))?;
        }

        points.retain(|p| p.time >= start && p.time <= end);
        points.sort_by_key(|p| p.time);
        debug!(vehicle_id, count = points.len(), "Telemetry loaded");
        Ok(points)
    }
}

#[derive(Default)]
struct VehicleEvents {
    keys: HashSet<(DateTime<Utc>, EventType)>,
    events: Vec<DrivingEvent>,
}

/// Append-only event persistence with an in-memory key index.
pub struct CsvEventStore {
    root: PathBuf,
    cache: Mutex<HashMap<i64, VehicleEvents>>,
}

impl CsvEventStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn events_path(&self, vehicle_id: i64) -> PathBuf {
        vehicle_dir(&self.root, vehicle_id).join("events.csv")
    }

    /// Loads a vehicle's event file into the cache if not already present.
    /// The cache lock is held by the caller for the whole operation, which
    /// makes check-then-insert atomic within this process.
    fn load_into<'a>(
        &self,
        cache: &'a mut HashMap<i64, VehicleEvents>,
        vehicle_id: i64,
    ) -> Result<&'a mut VehicleEvents, StoreError> {
        if !cache.contains_key(&vehicle_id) {
            let mut loaded = VehicleEvents::default();
            let path = self.events_path(vehicle_id);
            if path.exists() {
                let file = File::open(&path)?;
                let mut reader = csv::Reader::from_reader(file);
                for result in reader.deserialize() {
                    let event: DrivingEvent = result.map_err(|e| {
                        StoreError::Corrupt(format!("{}: {e}", path.display()))
                    })?;
                    loaded.keys.insert((event.time, event.event_type));
                    loaded.events.push(event);
                }
            }
            debug!(vehicle_id, count = loaded.events.len(), "Event file loaded");
            cache.insert(vehicle_id, loaded);
        }
        Ok(cache.get_mut(&vehicle_id).unwrap())
    }
}

#[async_trait]
impl EventStore for CsvEventStore {
    async fn find_event(
        &self,
        vehicle_id: i64,
        time: DateTime<Utc>,
        event_type: EventType,
    ) -> Result<Option<DrivingEvent>, StoreError> {
        let mut cache = self.cache.lock().unwrap();
        let vehicle = self.load_into(&mut cache, vehicle_id)?;
        Ok(vehicle
            .events
            .iter()
            .find(|e| e.time == time && e.event_type == event_type)
            .cloned())
    }

    async fn insert_event(&self, event: &DrivingEvent) -> Result<InsertOutcome, StoreError> {
        let mut cache = self.cache.lock().unwrap();
        let vehicle = self.load_into(&mut cache, event.vehicle_id)?;

        if vehicle.keys.contains(&(event.time, event.event_type)) {
            return Ok(InsertOutcome::Conflict);
        }

        let path = self.events_path(event.vehicle_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        append_record(&path, event)?;

        vehicle.keys.insert((event.time, event.event_type));
        vehicle.events.push(event.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn count_events(
        &self,
        vehicle_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &EventFilter,
    ) -> Result<u64, StoreError> {
        let mut cache = self.cache.lock().unwrap();
        let vehicle = self.load_into(&mut cache, vehicle_id)?;
        Ok(vehicle
            .events
            .iter()
            .filter(|e| e.time >= start && e.time <= end && filter.matches(e))
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
        let mut cache = self.cache.lock().unwrap();
        let vehicle = self.load_into(&mut cache, vehicle_id)?;

        let mut matching: Vec<DrivingEvent> = vehicle
            .events
            .iter()
            .filter(|e| e.time >= start && e.time <= end && filter.matches(e))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use chrono::TimeZone;
    use std::env;
    use std::fs;

    fn temp_root(name: &str) -> PathBuf {
        let root = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    fn event_at(secs: u32) -> DrivingEvent {
        DrivingEvent {
            vehicle_id: 460,
            garage_no: "P93597".to_string(),
            time: Utc.with_ymd_and_hms(2025, 8, 30, 10, 0, secs).unwrap(),
            event_type: EventType::HarshBraking,
            severity: Severity::Moderate,
            speed_before_kmh: 40.0,
            speed_after_kmh: 20.0,
            acceleration_ms2: -2.78,
            g_force: -0.28,
            lat: Some(44.8),
            lng: Some(20.4),
        }
    }

    #[tokio::test]
    async fn test_insert_survives_reopen() {
        let root = temp_root("drivewatch_csv_store_reopen");

        let store = CsvEventStore::new(&root);
        assert_eq!(
            store.insert_event(&event_at(5)).await.unwrap(),
            InsertOutcome::Inserted
        );
        drop(store);

        // A fresh store over the same directory still sees the key.
        let reopened = CsvEventStore::new(&root);
        assert_eq!(
            reopened.insert_event(&event_at(5)).await.unwrap(),
            InsertOutcome::Conflict
        );

        let start = Utc.with_ymd_and_hms(2025, 8, 30, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 8, 31, 0, 0, 0).unwrap();
        assert_eq!(
            reopened
                .count_events(460, start, end, &EventFilter::default())
                .await
                .unwrap(),
            1
        );

        fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_telemetry_missing_partition_is_empty_not_error() {
        let root = temp_root("drivewatch_csv_store_missing");
        let store = CsvTelemetryStore::new(&root);

        let start = Utc.with_ymd_and_hms(2025, 8, 30, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 8, 30, 23, 59, 59).unwrap();
        let points = store.fetch_telemetry(999, start, end).await.unwrap();
        assert!(points.is_empty());

        fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_telemetry_roundtrip_sorted_and_windowed() {
        let root = temp_root("drivewatch_csv_store_points");
        let dir = root.join("vehicle_id=7");
        fs::create_dir_all(&dir).unwrap();

        let t = |s| Utc.with_ymd_and_hms(2025, 8, 30, 10, 0, s).unwrap();
        // Written out of order on purpose.
        for s in [20u32, 0, 10, 40] {
            let point = TelemetryPoint {
                vehicle_id: 7,
                garage_no: "P7".to_string(),
                time: t(s),
                lat: Some(44.8),
                lng: Some(20.4),
                speed_kmh: Some(30.0),
                course: None,
            };
            append_record(&dir.join("date=2025-08-30.csv"), &point).unwrap();
        }

        let store = CsvTelemetryStore::new(&root);
        let points = store.fetch_telemetry(7, t(0), t(20)).await.unwrap();

        assert_eq!(points.len(), 3);
        assert!(points.windows(2).all(|w| w[0].time <= w[1].time));
        assert_eq!(store.vehicle_ids().unwrap(), vec![7]);

        fs::remove_dir_all(&root).unwrap();
    }
}
