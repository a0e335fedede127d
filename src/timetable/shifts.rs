use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::identity::GroupIdentity;
use super::time::CanonicalTime;
use crate::error::NormalizeError;

/// A row that survived time parsing; `person_group` may still be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRow {
    pub person_group: String,
    pub start_time: CanonicalTime,
    pub end_time: CanonicalTime,
}

/// One time window with its resolved identity and shift.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub person_group: String,
    #[serde(rename = "person_group_id")]
    pub group_id: u32,
    pub start_time: CanonicalTime,
    pub end_time: CanonicalTime,
    #[serde(rename = "shift_id")]
    pub shift_index: u8,
    /// Blank-group row that took its identity from the preceding row.
    #[serde(skip)]
    pub inherited: bool,
}

/// Shift 1 and Shift 2, both ordered by group id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShiftTables {
    pub shift1: Vec<NormalizedRow>,
    pub shift2: Vec<NormalizedRow>,
    /// Blank-group rows with nothing before them to inherit from.
    pub orphans_dropped: usize,
    /// Third and later occurrences of a group, folded into shift 2.
    pub collapsed_occurrences: usize,
}

/// Accumulator for the identity pass over rows in file order.
#[derive(Default)]
struct Resolved {
    labelled: Vec<(TimedRow, u32)>,
    inherited: Vec<NormalizedRow>,
    orphans: usize,
    last_valid: Option<(String, u32)>,
}

/// Resolve identities, number occurrences, and split into two shift tables.
///
/// `rows` must be in their post-filter file order: ids are issued in that order
/// and blank-group rows inherit from the nearest labelled row before them.
pub fn partition(
    rows: Vec<TimedRow>,
    identity: &mut GroupIdentity,
) -> Result<ShiftTables, NormalizeError> {
    // 1) identity pass, carrying the last valid identity forward
    let resolved = rows
        .into_iter()
        .enumerate()
        .fold(Resolved::default(), |mut acc, (idx, row)| {
            match identity.assign(&row.person_group) {
                Some(id) => {
                    acc.last_valid = Some((row.person_group.clone(), id));
                    acc.labelled.push((row, id));
                }
                None => match &acc.last_valid {
                    Some((label, id)) => acc.inherited.push(NormalizedRow {
                        person_group: label.clone(),
                        group_id: *id,
                        start_time: row.start_time,
                        end_time: row.end_time,
                        shift_index: 2,
                        inherited: true,
                    }),
                    None => {
                        warn!(row = idx, "blank person_group with no preceding group, dropping");
                        acc.orphans += 1;
                    }
                },
            }
            acc
        });

    // 2) order by (group, start) and number occurrences per group
    let mut labelled = resolved.labelled;
    labelled.sort_by(|(a, _), (b, _)| {
        (&a.person_group, a.start_time).cmp(&(&b.person_group, b.start_time))
    });

    let mut occurrences: HashMap<u32, u32> = HashMap::new();
    let mut tables = ShiftTables {
        orphans_dropped: resolved.orphans,
        ..Default::default()
    };
    for (row, id) in labelled {
        let n = occurrences.entry(id).or_insert(0);
        *n += 1;
        if *n > 2 {
            debug!(group = %row.person_group, occurrence = *n, "extra occurrence folded into shift 2");
            tables.collapsed_occurrences += 1;
        }
        let shift_index = if *n == 1 { 1 } else { 2 };
        let out = NormalizedRow {
            person_group: row.person_group,
            group_id: id,
            start_time: row.start_time,
            end_time: row.end_time,
            shift_index,
            inherited: false,
        };
        if shift_index == 1 {
            tables.shift1.push(out);
        } else {
            tables.shift2.push(out);
        }
    }

    // 3) inherited rows always land in shift 2
    tables.shift2.extend(resolved.inherited);

    // 4) both tables ordered by group id (stable, so time order survives within a group)
    tables.shift1.sort_by_key(|r| r.group_id);
    tables.shift2.sort_by_key(|r| r.group_id);

    if tables.shift1.is_empty() {
        return Err(NormalizeError::Validation(
            "No valid shift 1 data found".to_string(),
        ));
    }

    Ok(tables)
}
