// src/main.rs
use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use shiftsheet::{
    cleanup, report::FilterParams, timetable, CsvEventSource, ReportConfig, ReportGenerator,
    ReportParams, ReportPeriod,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Timetable normalization and attendance reports")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a raw timetable into Shift 1 / Shift 2 sheets with group ids.
    Normalize {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Write an attendance report for a period.
    Report {
        /// daily, weekly, monthly or quarterly
        #[arg(short, long, default_value = "daily")]
        period: ReportPeriod,
        /// Override the period's start date (YYYY-MM-DD); needs --end too.
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
        #[arg(long, env = "EVENTS_CSV")]
        events: PathBuf,
        #[arg(long, env = "REPORTS_DIR", default_value = shiftsheet::config::DEFAULT_REPORTS_DIR)]
        reports_dir: PathBuf,
        /// Restrict to groups listed in this timetable.
        #[arg(long)]
        timetable: Option<PathBuf>,
        #[arg(long)]
        device: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        group_file: Option<PathBuf>,
        /// Delete the report this many seconds after writing it.
        #[arg(long, env = "REMOVE_AFTER_SECS")]
        remove_after: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1) init logging
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();
    match args.command {
        Command::Normalize { input, output } => {
            // 2) normalize and write the workbook
            let normalized = timetable::normalize_timetable(&input, &output)?;
            println!("{}", serde_json::to_string_pretty(&normalized.stats)?);
        }
        Command::Report {
            period,
            start,
            end,
            events,
            reports_dir,
            timetable,
            device,
            group,
            group_file,
            remove_after,
        } => {
            // 2) resolve the date range
            let (start, end) = match (start, end) {
                (Some(s), Some(e)) => (s, e),
                _ => period.range(Local::now().date_naive()),
            };
            if start > end {
                bail!("start date {} is after end date {}", start, end);
            }

            // 3) generate
            let config = ReportConfig::new(reports_dir, remove_after);
            let generator = ReportGenerator::new(CsvEventSource::new(events), config);
            let params = ReportParams {
                filters: FilterParams {
                    device_name: device,
                    person_group: group,
                    person_group_file: group_file,
                },
                work_timetable: timetable,
            };
            let output = generator.generate_report(period, start, end, &params)?;
            println!("{}", output.path.display());

            // 4) optional deferred removal; keep the process alive until it runs
            if let Some(delay) = generator.config().removal_delay {
                info!(?delay, path = %output.path.display(), "report scheduled for removal");
                cleanup::schedule_removal(output.path, delay).await?;
            }
        }
    }
    Ok(())
}
