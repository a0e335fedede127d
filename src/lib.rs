pub mod cleanup;
pub mod config;
pub mod error;
pub mod events;
pub mod period;
pub mod report;
pub mod table;
pub mod timetable;
pub mod workbook;

pub use config::ReportConfig;
pub use error::{MatchError, NormalizeError};
pub use events::{CsvEventSource, EventRecord, EventSource};
pub use period::ReportPeriod;
pub use report::{ReportGenerator, ReportOutput, ReportParams};
pub use table::{Cell, RawTable};
pub use timetable::{normalize, normalize_timetable, NormalizedTimetable};
