pub mod identity;
pub mod lookup;
pub mod separator;
pub mod shifts;
pub mod time;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::NormalizeError;
use crate::table::{Cell, RawTable};
use crate::workbook::{self, Sheet};

pub use identity::GroupIdentity;
pub use shifts::{partition, NormalizedRow, ShiftTables, TimedRow};
pub use time::{parse_time, parse_time_str, CanonicalTime};

pub const PERSON_GROUP: &str = "person_group";
pub const START_TIME: &str = "start_time";
pub const END_TIME: &str = "end_time";
pub const REQUIRED_COLUMNS: [&str; 3] = [PERSON_GROUP, START_TIME, END_TIME];

pub const SHIFT_1_SHEET: &str = "Shift 1";
pub const SHIFT_2_SHEET: &str = "Shift 2";
pub const ORIGINAL_SHEET: &str = "Original Data";

/// Column indices of the three required columns.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequiredColumns {
    pub person_group: usize,
    pub start_time: usize,
    pub end_time: usize,
}

impl RequiredColumns {
    /// Locate the required columns, reporting every missing one at once.
    pub(crate) fn locate(table: &RawTable) -> Result<Self, NormalizeError> {
        let found: Vec<Option<usize>> = REQUIRED_COLUMNS
            .iter()
            .map(|name| table.column_index(name))
            .collect();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .zip(&found)
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(NormalizeError::Schema { missing });
        }
        Ok(Self {
            person_group: found[0].unwrap_or_default(),
            start_time: found[1].unwrap_or_default(),
            end_time: found[2].unwrap_or_default(),
        })
    }
}

/// Row accounting for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeStats {
    pub input_rows: usize,
    pub missing_time_rows: usize,
    pub unparseable_time_rows: usize,
    pub orphan_rows: usize,
    /// Non-text `person_group` cells (numbers, booleans) read as blank.
    pub non_text_labels: usize,
    pub collapsed_occurrences: usize,
    pub groups: usize,
    pub shift1_rows: usize,
    pub shift2_rows: usize,
}

/// Result of one normalization: both shift tables plus the untouched input.
#[derive(Debug, Clone)]
pub struct NormalizedTimetable {
    pub shift1: Vec<NormalizedRow>,
    pub shift2: Vec<NormalizedRow>,
    pub original: RawTable,
    pub groups: GroupIdentity,
    pub stats: NormalizeStats,
}

impl NormalizedTimetable {
    /// Sheets in output order; `Shift 2` is left out when empty.
    pub fn sheets(&self) -> Vec<Sheet> {
        let mut sheets = vec![Sheet::new(SHIFT_1_SHEET, shift_table(&self.shift1))];
        if !self.shift2.is_empty() {
            sheets.push(Sheet::new(SHIFT_2_SHEET, shift_table(&self.shift2)));
        }
        sheets.push(Sheet::new(ORIGINAL_SHEET, self.original.clone()));
        sheets
    }
}

/// Normalize with a fresh identity context.
pub fn normalize(raw: &RawTable) -> Result<NormalizedTimetable, NormalizeError> {
    let mut groups = GroupIdentity::new();
    let (shift1, shift2, stats) = normalize_with(raw, &mut groups)?;
    Ok(NormalizedTimetable {
        shift1,
        shift2,
        original: raw.clone(),
        groups,
        stats,
    })
}

/// Normalize using a caller-owned identity context.
pub fn normalize_with(
    raw: &RawTable,
    groups: &mut GroupIdentity,
) -> Result<(Vec<NormalizedRow>, Vec<NormalizedRow>, NormalizeStats), NormalizeError> {
    // 1) validate columns (names compared trimmed + lower-cased)
    let cols = RequiredColumns::locate(raw)?;

    let mut stats = NormalizeStats {
        input_rows: raw.len(),
        ..Default::default()
    };

    // 2) clean, drop missing, parse
    let mut timed = Vec::with_capacity(raw.len());
    for idx in 0..raw.len() {
        let start = raw.cell(idx, cols.start_time);
        let end = raw.cell(idx, cols.end_time);
        if start.is_blank() || end.is_blank() {
            debug!(row = idx, "missing start_time or end_time, dropping");
            stats.missing_time_rows += 1;
            continue;
        }

        let (Some(start_time), Some(end_time)) = (parse_time(start), parse_time(end)) else {
            debug!(row = idx, start = %start, end = %end, "unparseable time, dropping");
            stats.unparseable_time_rows += 1;
            continue;
        };

        let label = raw.cell(idx, cols.person_group);
        if !label.is_blank() && !matches!(label, Cell::Text(_)) {
            warn!(row = idx, value = %label, "non-text person_group treated as blank");
            stats.non_text_labels += 1;
        }

        timed.push(TimedRow {
            person_group: GroupIdentity::normalize_label(label),
            start_time,
            end_time,
        });
    }

    // 3) identities + shifts
    let tables = partition(timed, groups)?;

    stats.orphan_rows = tables.orphans_dropped;
    stats.collapsed_occurrences = tables.collapsed_occurrences;
    stats.groups = groups.len();
    stats.shift1_rows = tables.shift1.len();
    stats.shift2_rows = tables.shift2.len();

    Ok((tables.shift1, tables.shift2, stats))
}

/// Tabular form of a shift table, as written to the `Shift 1`/`Shift 2` sheets.
pub fn shift_table(rows: &[NormalizedRow]) -> RawTable {
    let mut table = RawTable::new(
        ["person_group", "person_group_id", "start_time", "end_time", "shift_id"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    for r in rows {
        table.push_row(vec![
            Cell::text(r.person_group.as_str()),
            Cell::from(r.group_id),
            Cell::text(r.start_time.to_string()),
            Cell::text(r.end_time.to_string()),
            Cell::from(r.shift_index as u32),
        ]);
    }
    table
}

/// Read `input`, normalize it, and write the three-sheet workbook to `output`.
/// Nothing is written when normalization fails.
#[tracing::instrument(level = "info", skip_all, fields(input = %input.as_ref().display()))]
pub fn normalize_timetable<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<NormalizedTimetable> {
    let raw = workbook::read_table(&input)?;
    let normalized = normalize(&raw)
        .with_context(|| format!("normalizing timetable {}", input.as_ref().display()))?;

    workbook::write_workbook(&output, &normalized.sheets())?;

    info!(
        output = %output.as_ref().display(),
        groups = normalized.stats.groups,
        shift1 = normalized.stats.shift1_rows,
        shift2 = normalized.stats.shift2_rows,
        "normalized timetable"
    );
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn timetable(rows: Vec<Vec<Cell>>) -> RawTable {
        RawTable {
            headers: vec![
                " Person_Group".into(),
                "START_TIME ".into(),
                "end_time".into(),
                "notes".into(),
            ],
            rows,
        }
    }

    fn r(group: &str, start: Cell, end: Cell) -> Vec<Cell> {
        vec![Cell::text(group), start, end, Cell::text("x")]
    }

    #[test]
    fn missing_columns_are_all_reported() {
        let raw = RawTable::from_rows(["person_group", "notes"], Vec::<Vec<Cell>>::new());
        let err = normalize(&raw).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::Schema {
                missing: vec!["start_time".into(), "end_time".into()]
            }
        );
    }

    #[test]
    fn two_groups_three_rows() {
        let raw = timetable(vec![
            r("A", "08:00".into(), "16:00".into()),
            r("B", Cell::Number(9.5), "1730".into()),
            r(" a ", "20:00".into(), "4am".into()),
        ]);
        let out = normalize(&raw).unwrap();
        assert_eq!(out.shift1.len(), 2);
        assert_eq!(out.shift2.len(), 1);
        assert_eq!(out.shift2[0].person_group, "a");
        assert_eq!(out.shift2[0].start_time.to_string(), "20:00");
        assert_eq!(out.shift2[0].end_time.to_string(), "04:00");
        assert_eq!(out.shift1[1].start_time.to_string(), "09:30");
        assert_eq!(out.original, raw);
        assert_eq!(out.stats.groups, 2);
    }

    #[test]
    fn blank_group_after_b_inherits_b() {
        let raw = timetable(vec![
            r("A", "08:00".into(), "12:00".into()),
            r("B", "08:00".into(), "12:00".into()),
            r("  ", "13:00".into(), "17:00".into()),
        ]);
        let out = normalize(&raw).unwrap();
        assert_eq!(out.shift2.len(), 1);
        assert_eq!(out.shift2[0].person_group, "b");
        assert_eq!(Some(out.shift2[0].group_id), out.groups.id_of("b"));
    }

    #[test]
    fn bad_rows_are_dropped_not_fatal() {
        let raw = timetable(vec![
            r("A", "08:00".into(), Cell::Empty),
            r("A", "   ".into(), "12:00".into()),
            r("A", "soon".into(), "12:00".into()),
            r("B", "08:00".into(), "12:00".into()),
        ]);
        let out = normalize(&raw).unwrap();
        assert_eq!(out.stats.missing_time_rows, 2);
        assert_eq!(out.stats.unparseable_time_rows, 1);
        assert_eq!(out.shift1.len(), 1);
        // "a" never reached identity assignment
        assert_eq!(out.groups.id_of("a"), None);
        assert_eq!(out.groups.id_of("b"), Some(1));
    }

    #[test]
    fn no_usable_rows_is_a_validation_error() {
        let raw = timetable(vec![
            r("A", "later".into(), "12:00".into()),
            r("B", Cell::Empty, "12:00".into()),
        ]);
        assert!(matches!(
            normalize(&raw).unwrap_err(),
            NormalizeError::Validation(_)
        ));
    }

    #[test]
    fn fresh_runs_assign_identical_ids() {
        let raw = timetable(vec![
            r("night", "22:00".into(), "06:00".into()),
            r("day", "08:00".into(), "16:00".into()),
            r("night", "23:00".into(), "07:00".into()),
        ]);
        let first = normalize(&raw).unwrap();
        let second = normalize(&raw).unwrap();
        assert_eq!(first.groups, second.groups);
        assert_eq!(first.shift1, second.shift1);
        assert_eq!(first.groups.id_of("night"), Some(1));
        assert_eq!(first.groups.id_of("day"), Some(2));
    }

    #[test]
    fn shared_context_keeps_counting() {
        let raw = timetable(vec![r("x", "08:00".into(), "09:00".into())]);
        let mut groups = GroupIdentity::new();
        groups.assign("earlier");
        let (shift1, _, _) = normalize_with(&raw, &mut groups).unwrap();
        assert_eq!(shift1[0].group_id, 2);
    }

    #[test]
    fn numeric_label_is_counted_and_inherits() {
        let raw = timetable(vec![
            r("Ops", "08:00".into(), "16:00".into()),
            vec![Cell::Number(101.0), "09:00".into(), "17:00".into(), Cell::Empty],
        ]);
        let out = normalize(&raw).unwrap();
        assert_eq!(out.stats.non_text_labels, 1);
        assert_eq!(out.shift2.len(), 1);
        assert_eq!(out.shift2[0].person_group, "ops");
        assert_eq!(out.shift2[0].group_id, 1);
    }

    #[test]
    fn time_formatted_xlsx_cells_are_read_as_clock_times() -> Result<()> {
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let dir = tempdir()?;
        let input = dir.path().join("timetable.xlsx");
        let output = dir.path().join("normalized.xlsx");

        let clock = Format::new().set_num_format("hh:mm");
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        for (col, name) in REQUIRED_COLUMNS.iter().enumerate() {
            ws.write_string(0, col as u16, *name)?;
        }
        ws.write_string(1, 0, "Ops")?;
        ws.write_datetime_with_format(1, 1, &ExcelDateTime::from_hms(9, 30, 0)?, &clock)?;
        ws.write_datetime_with_format(1, 2, &ExcelDateTime::from_hms(17, 0, 0)?, &clock)?;
        wb.save(&input)?;

        let out = normalize_timetable(&input, &output)?;
        assert_eq!(out.shift1.len(), 1);
        assert_eq!(out.shift1[0].start_time.to_string(), "09:30");
        assert_eq!(out.shift1[0].end_time.to_string(), "17:00");
        Ok(())
    }

    #[test]
    fn failed_run_writes_nothing() -> Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("timetable.csv");
        std::fs::write(&input, "person_group,start_time,end_time\nA,never,12:00\n")?;
        let output = dir.path().join("out").join("normalized.xlsx");

        let err = normalize_timetable(&input, &output).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NormalizeError>(),
            Some(NormalizeError::Validation(_))
        ));
        assert!(!output.exists());
        Ok(())
    }

    #[test]
    fn written_shift_sheets_read_back_unchanged() -> Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("timetable.csv");
        std::fs::write(
            &input,
            "Person_Group,Start_Time,End_Time,Site\n\
             Alpha,8:00,16:00,North\n\
             Beta,9.5,1730,South\n\
             ,18:00,22:00,South\n\
             alpha,17:00,23:00,North\n",
        )?;
        let output = dir.path().join("nested").join("normalized.xlsx");

        let normalized = normalize_timetable(&input, &output)?;
        assert!(output.exists());

        let names = workbook::sheet_names(&output)?;
        assert_eq!(names, vec![SHIFT_1_SHEET, SHIFT_2_SHEET, ORIGINAL_SHEET]);

        for (sheet, rows) in [
            (SHIFT_1_SHEET, &normalized.shift1),
            (SHIFT_2_SHEET, &normalized.shift2),
        ] {
            let back = workbook::read_sheet(&output, sheet)?;
            assert_eq!(back, shift_table(rows), "sheet {sheet} changed on round trip");
        }

        let original = workbook::read_sheet(&output, ORIGINAL_SHEET)?;
        assert_eq!(original.len(), 4);
        assert_eq!(original.headers[3], "Site");
        Ok(())
    }
}
