//! Row-order shift splitting for timetables laid out as "one labelled row,
//! then its unlabelled continuation rows". Unlike [`super::normalize`] this
//! keeps every column and does no time parsing.
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use super::{PERSON_GROUP, SHIFT_1_SHEET, SHIFT_2_SHEET};
use crate::error::NormalizeError;
use crate::table::{Cell, RawTable};
use crate::workbook::{self, Sheet};

/// Column carried over from the previous row alongside `person_group`.
pub const NUMBER: &str = "number";

#[derive(Debug, Clone, PartialEq)]
pub struct SplitShifts {
    pub shift1: RawTable,
    pub shift2: RawTable,
}

/// Split rows into shift 1 (labelled rows) and shift 2 (blank-group rows that
/// follow a labelled row, which take over its `person_group` and `number`).
pub fn split_shifts(raw: &RawTable) -> Result<SplitShifts, NormalizeError> {
    let group_col = raw
        .column_index(PERSON_GROUP)
        .ok_or_else(|| NormalizeError::Schema {
            missing: vec![PERSON_GROUP.to_string()],
        })?;
    let number_col = raw.column_index(NUMBER);

    let empty = SplitShifts {
        shift1: RawTable::new(raw.headers.clone()),
        shift2: RawTable::new(raw.headers.clone()),
    };

    // carry: the last row that went to shift 1
    let (split, _) = raw.rows.iter().fold(
        (empty, None::<&Vec<Cell>>),
        |(mut acc, prev), row| match prev {
            Some(prev_row) if cell_at(row, group_col).is_blank() => {
                let mut copied = row.clone();
                set_cell(&mut copied, group_col, cell_at(prev_row, group_col).clone());
                if let Some(n) = number_col {
                    set_cell(&mut copied, n, cell_at(prev_row, n).clone());
                }
                acc.shift2.push_row(copied);
                (acc, prev)
            }
            _ => {
                acc.shift1.push_row(row.clone());
                (acc, Some(row))
            }
        },
    );
    Ok(split)
}

/// Read `input`, split it, and write `Shift 1` (+ `Shift 2` when non-empty) to `output`.
#[tracing::instrument(level = "info", skip_all, fields(input = %input.as_ref().display()))]
pub fn split_shifts_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<SplitShifts> {
    let raw = workbook::read_table(&input)?;
    let split = split_shifts(&raw)
        .with_context(|| format!("splitting shifts of {}", input.as_ref().display()))?;

    let mut sheets = vec![Sheet::new(SHIFT_1_SHEET, split.shift1.clone())];
    if !split.shift2.is_empty() {
        sheets.push(Sheet::new(SHIFT_2_SHEET, split.shift2.clone()));
    }
    workbook::write_workbook(&output, &sheets)?;

    info!(
        shift1 = split.shift1.len(),
        shift2 = split.shift2.len(),
        "split shifts"
    );
    Ok(split)
}

fn cell_at(row: &[Cell], col: usize) -> &Cell {
    static EMPTY: Cell = Cell::Empty;
    row.get(col).unwrap_or(&EMPTY)
}

fn set_cell(row: &mut Vec<Cell>, col: usize, value: Cell) {
    if row.len() <= col {
        row.resize(col + 1, Cell::Empty);
    }
    row[col] = value;
}
