use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::ReaderBuilder;
use rust_xlsxwriter::{Format, Workbook};
use std::{fs, path::Path};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::table::{Cell, RawTable};

/// A named sheet to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub table: RawTable,
}

impl Sheet {
    pub fn new(name: impl Into<String>, table: RawTable) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

/// Read the first sheet of a spreadsheet, or a whole CSV file.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    if is_csv(path) {
        return read_csv(path);
    }
    let mut wb = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;
    let first = wb
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("workbook {} has no sheets", path.display()))?;
    let range = wb
        .worksheet_range(&first)
        .with_context(|| format!("failed to read sheet `{}` of {}", first, path.display()))?;
    Ok(range_to_table(&range))
}

/// Read one named sheet.
pub fn read_sheet<P: AsRef<Path>>(path: P, sheet: &str) -> Result<RawTable> {
    let path = path.as_ref();
    let mut wb = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;
    let range = wb
        .worksheet_range(sheet)
        .with_context(|| format!("failed to read sheet `{}` of {}", sheet, path.display()))?;
    Ok(range_to_table(&range))
}

pub fn sheet_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let wb = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;
    Ok(wb.sheet_names())
}

/// Write `sheets` as one xlsx file at `path`, header row bold and frozen.
///
/// The workbook is built in a temp file next to `path` and only moved into
/// place once complete, so a failed write leaves no partial file behind.
#[instrument(level = "debug", skip(sheets), fields(path = %path.as_ref().display()))]
pub fn write_workbook<P: AsRef<Path>>(path: P, sheets: &[Sheet]) -> Result<()> {
    let path = path.as_ref();

    // 1) make sure the destination directory exists
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    fs::create_dir_all(&dir).with_context(|| format!("creating directory {:?}", dir))?;

    // 2) build every sheet in memory
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    for sheet in sheets {
        let ws = workbook.add_worksheet();
        ws.set_name(&sheet.name)
            .with_context(|| format!("invalid sheet name `{}`", sheet.name))?;

        for (col, name) in sheet.table.headers.iter().enumerate() {
            ws.write_string_with_format(0, col as u16, name, &header)?;
        }
        for (r, row) in sheet.table.rows.iter().enumerate() {
            let row_idx = (r + 1) as u32;
            for (c, cell) in row.iter().enumerate() {
                let col = c as u16;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        ws.write_string(row_idx, col, s)?;
                    }
                    Cell::Number(n) => {
                        ws.write_number(row_idx, col, *n)?;
                    }
                    Cell::Bool(b) => {
                        ws.write_boolean(row_idx, col, *b)?;
                    }
                }
            }
        }
        ws.set_freeze_panes(1, 0)?;
        ws.autofit();
        debug!(sheet = %sheet.name, rows = sheet.table.len(), "sheet built");
    }

    // 3) write to a temp file, then rename over the target
    let mut tmp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("creating temp file in {:?}", dir))?;
    workbook
        .save_to_writer(tmp.as_file_mut())
        .with_context(|| format!("serializing workbook for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming temp file to {}", path.display()))?;
    Ok(())
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
}

fn read_csv(path: &Path) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open CSV {}", path.display()))?;
    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading CSV header of {}", path.display()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut table = RawTable::new(headers);
    for (idx, result) in rdr.records().enumerate() {
        let record =
            result.with_context(|| format!("CSV parse error in {} at record {}", path.display(), idx))?;
        table.push_row(
            record
                .iter()
                .map(|v| {
                    if v.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::text(v)
                    }
                })
                .collect(),
        );
    }
    Ok(table)
}

fn range_to_table(range: &Range<Data>) -> RawTable {
    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|r| r.iter().map(|c| data_to_cell(c).to_string()).collect())
        .unwrap_or_default();
    let mut table = RawTable::new(headers);
    for row in rows {
        table.push_row(row.iter().map(data_to_cell).collect());
    }
    table
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            if (0.0..1.0).contains(&serial) {
                // time-only cell: serial is the fraction of a day
                let minutes = (serial * 1440.0).round() as u32 % 1440;
                Cell::Text(format!("{:02}:{:02}", minutes / 60, minutes % 60))
            } else {
                match dt.as_datetime() {
                    Some(ndt) => Cell::Text(ndt.format("%Y-%m-%d %H:%M:%S").to_string()),
                    None => Cell::Number(serial),
                }
            }
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => {
            debug!(error = ?e, "spreadsheet error cell read as empty");
            Cell::Empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_preserves_cells() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a").join("b").join("out.xlsx");
        let table = RawTable {
            headers: vec!["name".into(), "count".into(), "flag".into()],
            rows: vec![
                vec![Cell::text("x"), Cell::Number(3.0), Cell::Bool(true)],
                vec![Cell::text("y"), Cell::Number(0.5), Cell::Bool(false)],
            ],
        };
        write_workbook(&path, &[Sheet::new("Data", table.clone())])?;

        assert_eq!(sheet_names(&path)?, vec!["Data".to_string()]);
        assert_eq!(read_sheet(&path, "Data")?, table);
        assert_eq!(read_table(&path)?, table);
        Ok(())
    }

    #[test]
    fn bad_sheet_name_leaves_no_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.xlsx");
        let table = RawTable::from_rows(["a"], vec![vec!["1"]]);
        // '[' and ']' are not allowed in sheet names
        assert!(write_workbook(&path, &[Sheet::new("bad[name]", table)]).is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn csv_cells_are_text_or_empty() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("in.csv");
        fs::write(&path, "a,b\n1,\n,x\n")?;
        let t = read_table(&path)?;
        assert_eq!(t.headers, vec!["a", "b"]);
        assert_eq!(t.rows[0], vec![Cell::text("1"), Cell::Empty]);
        assert_eq!(t.rows[1], vec![Cell::Empty, Cell::text("x")]);
        Ok(())
    }
}
