use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REPORTS_DIR: &str = "reports";

/// Settings handed from the binaries into report generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub reports_dir: PathBuf,
    /// Delete generated reports this long after writing them. `None` keeps them.
    pub removal_delay: Option<Duration>,
}

impl ReportConfig {
    pub fn new(reports_dir: impl Into<PathBuf>, removal_delay_secs: Option<u64>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            removal_delay: removal_delay_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REPORTS_DIR, None)
    }
}
