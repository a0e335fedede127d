use anyhow::{anyhow, Result};
use chrono::{Datelike, Days, Months, NaiveDate};
use std::str::FromStr;

/// Reporting window relative to "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Daily => "daily",
            ReportPeriod::Weekly => "weekly",
            ReportPeriod::Monthly => "monthly",
            ReportPeriod::Quarterly => "quarterly",
        }
    }

    /// Capitalized name, as shown in report summaries.
    pub fn label(&self) -> &'static str {
        match self {
            ReportPeriod::Daily => "Daily",
            ReportPeriod::Weekly => "Weekly",
            ReportPeriod::Monthly => "Monthly",
            ReportPeriod::Quarterly => "Quarterly",
        }
    }

    /// Inclusive `(start, end)` of the period containing `today`.
    /// Weeks run Monday to Sunday.
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            ReportPeriod::Daily => (today, today),
            ReportPeriod::Weekly => {
                let start = today - Days::new(today.weekday().num_days_from_monday() as u64);
                (start, start + Days::new(6))
            }
            ReportPeriod::Monthly => month_span(today.year(), today.month(), 1),
            ReportPeriod::Quarterly => {
                let first_month = (today.month0() / 3) * 3 + 1;
                month_span(today.year(), first_month, 3)
            }
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(ReportPeriod::Daily),
            "weekly" => Ok(ReportPeriod::Weekly),
            "monthly" => Ok(ReportPeriod::Monthly),
            "quarterly" => Ok(ReportPeriod::Quarterly),
            other => Err(anyhow!("unknown report period `{}`", other)),
        }
    }
}

/// First day of `month` through the last day of `month + months - 1`.
fn month_span(year: i32, month: u32, months: u32) -> (NaiveDate, NaiveDate) {
    // month is always 1..=12 here, so day 1 exists
    let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
    let end = start
        .checked_add_months(Months::new(months))
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX);
    (start, end)
}
