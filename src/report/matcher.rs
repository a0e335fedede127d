use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{info, warn};

use crate::error::MatchError;
use crate::events::EventRecord;
use crate::table::{Cell, RawTable};
use crate::timetable::PERSON_GROUP;

/// Last segment of a `>`-separated group path, trimmed. Case is kept.
pub fn process_person_group(label: Option<&str>) -> String {
    match label {
        None => String::new(),
        Some(s) => match s.rfind('>') {
            Some(pos) => s[pos + 1..].trim().to_string(),
            None => s.trim().to_string(),
        },
    }
}

/// Same as [`process_person_group`] for a spreadsheet cell; numbers use their display form.
pub fn process_person_group_cell(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        other => process_person_group(Some(&other.to_string())),
    }
}

/// Distinct non-empty processed groups of a timetable.
pub fn timetable_groups(timetable: &RawTable) -> Result<BTreeSet<String>, MatchError> {
    let col = timetable
        .column_index(PERSON_GROUP)
        .ok_or(MatchError::MissingColumn)?;
    let groups: BTreeSet<String> = (0..timetable.len())
        .map(|row| process_person_group_cell(timetable.cell(row, col)))
        .filter(|g| !g.is_empty())
        .collect();
    if groups.is_empty() {
        return Err(MatchError::NoGroups);
    }
    Ok(groups)
}

/// Processed group with no counterpart in the timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedGroup {
    pub group: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub matched: Vec<EventRecord>,
    /// Sorted by group.
    pub unmatched: Vec<UnmatchedGroup>,
    pub timetable_groups: BTreeSet<String>,
}

impl MatchOutcome {
    /// Number of distinct processed groups among the matched events.
    pub fn matched_group_count(&self) -> usize {
        self.matched
            .iter()
            .map(|e| process_person_group(e.person_group.as_deref()))
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Split `events` into those whose processed group appears in `timetable` and a
/// per-group count of those that do not.
pub fn match_events(
    events: &[EventRecord],
    timetable: &RawTable,
) -> Result<MatchOutcome, MatchError> {
    let groups = timetable_groups(timetable)?;

    let mut matched = Vec::new();
    let mut unmatched: BTreeMap<String, usize> = BTreeMap::new();
    for event in events {
        let processed = process_person_group(event.person_group.as_deref());
        if groups.contains(&processed) {
            matched.push(event.clone());
        } else {
            *unmatched.entry(processed).or_default() += 1;
        }
    }

    if matched.is_empty() {
        warn!("no matching records found with the provided work timetable");
    }
    info!(
        matched = matched.len(),
        unmatched_groups = unmatched.len(),
        timetable_groups = groups.len(),
        "matched events against timetable"
    );

    Ok(MatchOutcome {
        matched,
        unmatched: unmatched
            .into_iter()
            .map(|(group, records)| UnmatchedGroup { group, records })
            .collect(),
        timetable_groups: groups,
    })
}

/// Per-group aggregate over matched events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub person_group: String,
    pub total_records: usize,
    pub unique_devices: usize,
    pub unique_persons: usize,
}

/// Aggregate by the raw `person_group`, ordered by group.
pub fn group_summaries(events: &[EventRecord]) -> Vec<GroupSummary> {
    #[derive(Default)]
    struct Acc<'a> {
        records: usize,
        devices: HashSet<&'a str>,
        persons: HashSet<&'a str>,
    }

    let mut by_group: BTreeMap<&str, Acc> = BTreeMap::new();
    for e in events {
        let Some(group) = e.person_group.as_deref() else {
            continue;
        };
        let acc = by_group.entry(group).or_default();
        acc.records += 1;
        acc.devices.insert(e.device_name.as_str());
        if let Some(p) = e.person_name.as_deref() {
            acc.persons.insert(p);
        }
    }

    by_group
        .into_iter()
        .map(|(group, acc)| GroupSummary {
            person_group: group.to_string(),
            total_records: acc.records,
            unique_devices: acc.devices.len(),
            unique_persons: acc.persons.len(),
        })
        .collect()
}

pub fn group_summary_table(summaries: &[GroupSummary]) -> RawTable {
    let mut table = RawTable::new(
        ["person_group", "Total Records", "Unique Devices", "Unique Persons"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    for s in summaries {
        table.push_row(vec![
            Cell::text(s.person_group.as_str()),
            Cell::from(s.total_records),
            Cell::from(s.unique_devices),
            Cell::from(s.unique_persons),
        ]);
    }
    table
}

pub fn unmatched_table(unmatched: &[UnmatchedGroup]) -> RawTable {
    let mut table = RawTable::new(vec!["Unmatched Group".into(), "Records Count".into()]);
    for u in unmatched {
        table.push_row(vec![Cell::text(u.group.as_str()), Cell::from(u.records)]);
    }
    table
}
