use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::ReaderBuilder;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::table::{Cell, RawTable};

/// Column order of the check-in table.
pub const EVENT_COLUMNS: [&str; 8] = [
    "id",
    "date_and_time",
    "date",
    "time",
    "device_name",
    "reader_name",
    "person_name",
    "person_group",
];

/// One device check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date_and_time: NaiveDateTime,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub device_name: String,
    pub reader_name: String,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub person_group: Option<String>,
}

/// Where check-in events come from.
pub trait EventSource {
    /// Events with `start <= date <= end`, ordered by `date_and_time`.
    fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<EventRecord>>;
}

/// Events exported from the check-in table as CSV with a header row.
pub struct CsvEventSource {
    path: PathBuf,
}

impl CsvEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EventSource for CsvEventSource {
    #[tracing::instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<EventRecord>> {
        let mut rdr = ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_path(&self.path)
            .with_context(|| format!("failed to open events CSV {}", self.path.display()))?;

        let mut total = 0usize;
        let mut events = Vec::new();
        for (idx, result) in rdr.deserialize::<EventRecord>().enumerate() {
            let event = result.with_context(|| {
                format!("bad event record {} in {}", idx, self.path.display())
            })?;
            total += 1;
            if event.date >= start && event.date <= end {
                events.push(event);
            }
        }
        events.sort_by_key(|e| e.date_and_time);

        info!(total, selected = events.len(), %start, %end, "fetched events");
        Ok(events)
    }
}

/// In-memory source, filtered the same way as the CSV one.
impl EventSource for Vec<EventRecord> {
    fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<EventRecord>> {
        let mut events: Vec<EventRecord> = self
            .iter()
            .filter(|e| e.date >= start && e.date <= end)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.date_and_time);
        debug!(selected = events.len(), "fetched in-memory events");
        Ok(events)
    }
}

/// Tabular form used for the `Detailed Data` sheet.
pub fn events_table(events: &[EventRecord]) -> RawTable {
    let mut table = RawTable::new(EVENT_COLUMNS.iter().map(|s| s.to_string()).collect());
    for e in events {
        table.push_row(vec![
            Cell::Number(e.id as f64),
            Cell::text(e.date_and_time.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::text(e.date.format("%Y-%m-%d").to_string()),
            Cell::text(e.time.format("%H:%M:%S").to_string()),
            Cell::text(e.device_name.as_str()),
            Cell::text(e.reader_name.as_str()),
            Cell::from(e.person_name.clone()),
            Cell::from(e.person_group.clone()),
        ]);
    }
    table
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, the `T`-separated ISO form, and either with fractional seconds.
fn deserialize_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    let raw = String::deserialize(d)?;
    let s = raw.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp `{}`", s)))
}
