pub mod filter;
pub mod matcher;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ReportConfig;
use crate::events::{events_table, EventRecord, EventSource};
use crate::period::ReportPeriod;
use crate::table::{Cell, RawTable};
use crate::workbook::{self, Sheet};

pub use filter::{Filter, FilterParams};
pub use matcher::{
    group_summaries, match_events, process_person_group, GroupSummary, MatchOutcome,
    UnmatchedGroup,
};

pub const DETAILED_SHEET: &str = "Detailed Data";
pub const SUMMARY_SHEET: &str = "Summary";
pub const GROUP_SUMMARY_SHEET: &str = "Group Summary";
pub const UNMATCHED_SHEET: &str = "Unmatched Groups";

/// What the caller asked for beyond the date range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportParams {
    pub filters: FilterParams,
    /// When set, the report is restricted to groups listed in this timetable.
    pub work_timetable: Option<PathBuf>,
}

/// A written report file.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutput {
    pub path: PathBuf,
    pub records: usize,
}

pub struct ReportGenerator<S> {
    source: S,
    config: ReportConfig,
}

impl<S: EventSource> ReportGenerator<S> {
    pub fn new(source: S, config: ReportConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Fetch events for `[start, end]` and write either a standard or a
    /// timetable-matched report.
    #[tracing::instrument(level = "info", skip(self, params), fields(period = period.as_str()))]
    pub fn generate_report(
        &self,
        period: ReportPeriod,
        start: NaiveDate,
        end: NaiveDate,
        params: &ReportParams,
    ) -> Result<ReportOutput> {
        let events = self.source.fetch(start, end)?;
        match &params.work_timetable {
            Some(timetable) => self.generate_custom_excel(&events, timetable, period, start, end),
            None => self.generate_excel(&events, period, start, end, &params.filters),
        }
    }

    /// `Detailed Data` + `Summary` over the (optionally filtered) events.
    pub fn generate_excel(
        &self,
        events: &[EventRecord],
        period: ReportPeriod,
        start: NaiveDate,
        end: NaiveDate,
        filters: &FilterParams,
    ) -> Result<ReportOutput> {
        let events = if filters.is_empty() {
            events.to_vec()
        } else {
            Filter::new(events).apply(filters)?
        };

        let summary = RawTable::from_rows(
            ["Total Records", "Unique Devices", "Unique Groups", "Date Range", "Report Type"],
            vec![vec![
                Cell::from(events.len()),
                Cell::from(distinct(events.iter().map(|e| Some(e.device_name.as_str())))),
                Cell::from(distinct(events.iter().map(|e| e.person_group.as_deref()))),
                Cell::text(date_range(start, end)),
                Cell::text(period.label()),
            ]],
        );

        let path = self.output_path(&format!("{}_report", period.as_str()), start, end);
        workbook::write_workbook(
            &path,
            &[
                Sheet::new(DETAILED_SHEET, events_table(&events)),
                Sheet::new(SUMMARY_SHEET, summary),
            ],
        )?;

        info!(path = %path.display(), records = events.len(), "report written");
        Ok(ReportOutput {
            path,
            records: events.len(),
        })
    }

    /// Report restricted to groups found in `timetable_path`, with per-group and
    /// unmatched-group sheets.
    pub fn generate_custom_excel(
        &self,
        events: &[EventRecord],
        timetable_path: &Path,
        period: ReportPeriod,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReportOutput> {
        let timetable = workbook::read_table(timetable_path)?;
        let outcome = match_events(events, &timetable)
            .with_context(|| format!("matching events against {}", timetable_path.display()))?;

        let summary = RawTable::from_rows(
            [
                "Total Records",
                "Matched Groups",
                "Total Groups in Timetable",
                "Date Range",
                "Report Type",
            ],
            vec![vec![
                Cell::from(outcome.matched.len()),
                Cell::from(outcome.matched_group_count()),
                Cell::from(outcome.timetable_groups.len()),
                Cell::text(date_range(start, end)),
                Cell::text(format!("Custom {}", period.label())),
            ]],
        );

        let mut sheets = vec![
            Sheet::new(DETAILED_SHEET, events_table(&outcome.matched)),
            Sheet::new(SUMMARY_SHEET, summary),
            Sheet::new(
                GROUP_SUMMARY_SHEET,
                matcher::group_summary_table(&group_summaries(&outcome.matched)),
            ),
        ];
        if !outcome.unmatched.is_empty() {
            sheets.push(Sheet::new(
                UNMATCHED_SHEET,
                matcher::unmatched_table(&outcome.unmatched),
            ));
        }

        let path = self.output_path(&format!("custom_{}_report", period.as_str()), start, end);
        workbook::write_workbook(&path, &sheets)?;

        info!(
            path = %path.display(),
            records = outcome.matched.len(),
            "custom report written"
        );
        Ok(ReportOutput {
            path,
            records: outcome.matched.len(),
        })
    }

    fn output_path(&self, stem: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
        self.config.reports_dir.join(format!(
            "{}_{}_{}.xlsx",
            stem,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ))
    }
}

fn date_range(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} to {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
}

/// Distinct non-missing values.
fn distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> usize {
    values.flatten().collect::<HashSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatchError;
    use crate::events::tests::event;
    use std::fs;
    use tempfile::tempdir;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn source() -> Vec<EventRecord> {
        vec![
            event(1, "2024-03-01 08:00:00", "Gate", "Ana", Some("Org>Ops")),
            event(2, "2024-03-01 09:00:00", "Door", "Ben", Some("Org>Ops")),
            event(3, "2024-03-02 10:00:00", "Gate", "Cy", Some("Org>Desk")),
            event(4, "2024-03-05 10:00:00", "Gate", "Di", Some("Org>Ops")),
        ]
    }

    fn generator(dir: &Path) -> ReportGenerator<Vec<EventRecord>> {
        ReportGenerator::new(
            source(),
            ReportConfig {
                reports_dir: dir.join("reports"),
                removal_delay: None,
            },
        )
    }

    #[test]
    fn standard_report_has_detail_and_summary() -> Result<()> {
        let dir = tempdir()?;
        let out = generator(dir.path()).generate_report(
            ReportPeriod::Weekly,
            d(1),
            d(3),
            &ReportParams::default(),
        )?;

        assert_eq!(out.records, 3);
        assert!(out.path.ends_with("reports/weekly_report_2024-03-01_2024-03-03.xlsx"));
        assert_eq!(
            workbook::sheet_names(&out.path)?,
            vec![DETAILED_SHEET, SUMMARY_SHEET]
        );

        let summary = workbook::read_sheet(&out.path, SUMMARY_SHEET)?;
        assert_eq!(
            summary.rows[0],
            vec![
                Cell::Number(3.0),
                Cell::Number(2.0),
                Cell::Number(2.0),
                Cell::text("2024-03-01 to 2024-03-03"),
                Cell::text("Weekly"),
            ]
        );
        assert_eq!(workbook::read_sheet(&out.path, DETAILED_SHEET)?.len(), 3);
        Ok(())
    }

    #[test]
    fn filters_narrow_standard_report() -> Result<()> {
        let dir = tempdir()?;
        let params = ReportParams {
            filters: FilterParams {
                device_name: Some("Gate".into()),
                ..Default::default()
            },
            work_timetable: None,
        };
        let out = generator(dir.path()).generate_report(ReportPeriod::Daily, d(1), d(3), &params)?;
        assert_eq!(out.records, 2);
        Ok(())
    }

    #[test]
    fn custom_report_matches_timetable_groups() -> Result<()> {
        let dir = tempdir()?;
        let timetable = dir.path().join("timetable.csv");
        fs::write(&timetable, "person_group,start_time,end_time\nOps,08:00,16:00\nNight,22:00,06:00\n")?;

        let params = ReportParams {
            work_timetable: Some(timetable),
            ..Default::default()
        };
        let out = generator(dir.path()).generate_report(ReportPeriod::Monthly, d(1), d(31), &params)?;

        assert_eq!(out.records, 3);
        assert!(out
            .path
            .ends_with("reports/custom_monthly_report_2024-03-01_2024-03-31.xlsx"));
        assert_eq!(
            workbook::sheet_names(&out.path)?,
            vec![DETAILED_SHEET, SUMMARY_SHEET, GROUP_SUMMARY_SHEET, UNMATCHED_SHEET]
        );

        let summary = workbook::read_sheet(&out.path, SUMMARY_SHEET)?;
        assert_eq!(summary.rows[0][0], Cell::Number(3.0));
        assert_eq!(summary.rows[0][1], Cell::Number(1.0));
        assert_eq!(summary.rows[0][2], Cell::Number(2.0));
        assert_eq!(summary.rows[0][4], Cell::text("Custom Monthly"));

        let groups = workbook::read_sheet(&out.path, GROUP_SUMMARY_SHEET)?;
        assert_eq!(
            groups.rows,
            vec![vec![
                Cell::text("Org>Ops"),
                Cell::Number(3.0),
                Cell::Number(2.0),
                Cell::Number(3.0),
            ]]
        );

        let unmatched = workbook::read_sheet(&out.path, UNMATCHED_SHEET)?;
        assert_eq!(unmatched.rows, vec![vec![Cell::text("Desk"), Cell::Number(1.0)]]);
        Ok(())
    }

    #[test]
    fn empty_match_still_writes_group_summary_header() -> Result<()> {
        let dir = tempdir()?;
        let timetable = dir.path().join("timetable.csv");
        fs::write(&timetable, "person_group\nNobody\n")?;
        let params = ReportParams {
            work_timetable: Some(timetable),
            ..Default::default()
        };
        let out = generator(dir.path()).generate_report(ReportPeriod::Daily, d(1), d(1), &params)?;
        assert_eq!(out.records, 0);
        let groups = workbook::read_sheet(&out.path, GROUP_SUMMARY_SHEET)?;
        assert_eq!(groups.headers.len(), 4);
        assert!(groups.is_empty());
        Ok(())
    }

    #[test]
    fn bad_timetable_writes_no_report() -> Result<()> {
        let dir = tempdir()?;
        let timetable = dir.path().join("timetable.csv");
        fs::write(&timetable, "team\nOps\n")?;
        let params = ReportParams {
            work_timetable: Some(timetable),
            ..Default::default()
        };
        let err = generator(dir.path())
            .generate_report(ReportPeriod::Daily, d(1), d(1), &params)
            .unwrap_err();
        assert_eq!(err.downcast_ref::<MatchError>(), Some(&MatchError::MissingColumn));
        assert!(!dir.path().join("reports").exists());
        Ok(())
    }
}
