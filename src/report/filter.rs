use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::MatchError;
use crate::events::EventRecord;
use crate::timetable::PERSON_GROUP;
use crate::workbook;

/// Optional narrowing applied to a standard report. Every set field must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams {
    pub device_name: Option<String>,
    pub person_group: Option<String>,
    /// Spreadsheet whose `person_group` values are matched exactly.
    pub person_group_file: Option<PathBuf>,
}

impl FilterParams {
    pub fn is_empty(&self) -> bool {
        self.device_name.is_none() && self.person_group.is_none() && self.person_group_file.is_none()
    }
}

/// Exact-match filters over fetched events.
pub struct Filter<'a> {
    events: &'a [EventRecord],
}

impl<'a> Filter<'a> {
    pub fn new(events: &'a [EventRecord]) -> Self {
        Self { events }
    }

    pub fn by_device(&self, device_name: &str) -> Vec<EventRecord> {
        self.select(|e| e.device_name == device_name)
    }

    pub fn by_person_group(&self, person_group: &str) -> Vec<EventRecord> {
        self.select(|e| e.person_group.as_deref() == Some(person_group))
    }

    /// Inclusive on both ends.
    pub fn by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<EventRecord> {
        self.select(|e| e.date >= start && e.date <= end)
    }

    /// Keep events whose raw group equals one of the file's `person_group` values.
    pub fn by_person_group_from_timetable(&self, path: &Path) -> Result<Vec<EventRecord>> {
        let groups = load_exact_groups(path)?;
        Ok(self.select(|e| {
            e.person_group
                .as_deref()
                .map_or(false, |g| groups.contains(g))
        }))
    }

    /// Apply every filter set in `params`, one after another.
    pub fn apply(&self, params: &FilterParams) -> Result<Vec<EventRecord>> {
        let mut current: Vec<EventRecord> = self.events.to_vec();
        if let Some(device) = &params.device_name {
            current = Filter::new(&current).by_device(device);
        }
        if let Some(group) = &params.person_group {
            current = Filter::new(&current).by_person_group(group);
        }
        if let Some(path) = &params.person_group_file {
            current = Filter::new(&current).by_person_group_from_timetable(path)?;
        }
        debug!(before = self.events.len(), after = current.len(), "applied filters");
        Ok(current)
    }

    fn select(&self, keep: impl Fn(&EventRecord) -> bool) -> Vec<EventRecord> {
        self.events.iter().filter(|e| keep(e)).cloned().collect()
    }
}

fn load_exact_groups(path: &Path) -> Result<HashSet<String>> {
    let table = workbook::read_table(path)?;
    let col = table
        .column_index(PERSON_GROUP)
        .ok_or(MatchError::MissingColumn)
        .with_context(|| format!("reading groups from {}", path.display()))?;
    Ok((0..table.len())
        .map(|row| table.cell(row, col))
        .filter(|c| !c.is_blank())
        .map(|c| c.to_string())
        .collect())
}
