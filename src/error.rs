use thiserror::Error;

/// Fatal failures of one timetable normalization call.
///
/// Per-cell time parse failures are not errors: the parser returns `None`
/// and the row is dropped.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("Missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("{0}")]
    Validation(String),
}

/// Fatal failures of one event/timetable matching call.
#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("Work timetable must contain a 'person_group' column")]
    MissingColumn,

    #[error("No valid person groups found in work timetable")]
    NoGroups,
}
