use std::collections::HashMap;
use tracing::warn;

use super::time::{parse_time, CanonicalTime};
use super::RequiredColumns;
use crate::error::NormalizeError;
use crate::table::{clean_str, RawTable};

/// Declared window for one group; either side may be unusable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start_time: Option<CanonicalTime>,
    pub end_time: Option<CanonicalTime>,
}

/// Map each `person_group` (trimmed, case kept) to its time window.
///
/// Duplicate groups keep their first row. Rows without a group are skipped.
pub fn load_timetable_lookup(
    raw: &RawTable,
) -> Result<HashMap<String, TimeWindow>, NormalizeError> {
    let cols = RequiredColumns::locate(raw)?;

    let mut lookup = HashMap::new();
    let mut duplicates = 0usize;
    for idx in 0..raw.len() {
        let group = clean_str(&raw.cell(idx, cols.person_group).to_string());
        if group.is_empty() {
            continue;
        }
        if lookup.contains_key(&group) {
            duplicates += 1;
            continue;
        }
        lookup.insert(
            group,
            TimeWindow {
                start_time: parse_time(raw.cell(idx, cols.start_time)),
                end_time: parse_time(raw.cell(idx, cols.end_time)),
            },
        );
    }

    if duplicates > 0 {
        warn!(duplicates, "duplicate person_group values in timetable, keeping the first occurrence");
    }
    Ok(lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    #[test]
    fn first_occurrence_wins() {
        let raw = RawTable::from_rows(
            ["person_group", "start_time", "end_time"],
            vec![
                vec![Cell::text("Ops "), Cell::text("9-00"), Cell::text("17:00")],
                vec![Cell::text("Ops"), Cell::text("10:00"), Cell::text("18:00")],
                vec![Cell::text("Desk"), Cell::text("whenever"), Cell::Number(13.5)],
                vec![Cell::Empty, Cell::text("10:00"), Cell::text("18:00")],
            ],
        );
        let lookup = load_timetable_lookup(&raw).unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup["Ops"].start_time.unwrap().to_string(), "09:00");
        assert_eq!(lookup["Desk"].start_time, None);
        assert_eq!(lookup["Desk"].end_time.unwrap().to_string(), "13:30");
    }

    #[test]
    fn schema_is_checked() {
        let raw = RawTable::from_rows(["person_group"], Vec::<Vec<Cell>>::new());
        assert!(matches!(
            load_timetable_lookup(&raw),
            Err(NormalizeError::Schema { .. })
        ));
    }
}
