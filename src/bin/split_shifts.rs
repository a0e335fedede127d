// src/bin/split_shifts.rs
use anyhow::Result;
use clap::Parser;
use shiftsheet::timetable::separator::split_shifts_file;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Split a timetable into Shift 1 / Shift 2 by row order")]
struct Args {
    #[arg(short, long)]
    input: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();
    let split = split_shifts_file(&args.input, &args.output)?;
    info!(
        shift1 = split.shift1.len(),
        shift2 = split.shift2.len(),
        output = %args.output.display(),
        "split complete"
    );
    Ok(())
}
