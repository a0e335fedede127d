use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::table::Cell;

static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d*)?$").unwrap());
static AM_PM: Lazy<Regex> = Lazy::new(|| Regex::new(r"am|pm").unwrap());
static TWELVE_HOUR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?$").unwrap());
static COMPACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3,4}$").unwrap());
static SEPARATED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})\s*[-\s]\s*(\d{2})$").unwrap());
static STRICT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());

/// A wall-clock time with minute precision; displays as zero-padded `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalTime {
    hour: u8,
    minute: u8,
}

impl CanonicalTime {
    /// `None` unless `hour` is 0..=23 and `minute` is 0..=59.
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self {
                hour: hour as u8,
                minute: minute as u8,
            })
        } else {
            None
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for CanonicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for CanonicalTime {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Parse any spreadsheet cell into a canonical time. `None` means the value is unusable.
pub fn parse_time(cell: &Cell) -> Option<CanonicalTime> {
    match cell {
        Cell::Number(n) => from_fractional_hours(*n),
        Cell::Text(s) => parse_time_str(s),
        Cell::Empty | Cell::Bool(_) => None,
    }
}

/// Parse a textual time. Forms are tried in a fixed order:
/// 1) fractional hours (`9.5`), 2) 12-hour clock (`9:30 pm`), 3) compact digits (`0930`),
/// 4) dash/space separated (`9-00`), 5) strict `H:MM`.
pub fn parse_time_str(raw: &str) -> Option<CanonicalTime> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    // 1) "9.5" ⇒ 09:30; 3- and 4-digit integers are compact clock values instead
    if DECIMAL.is_match(&s) && !COMPACT.is_match(&s) {
        return s.parse::<f64>().ok().and_then(from_fractional_hours);
    }

    // 2) am/pm marker anywhere
    if let Some(m) = AM_PM.find(&s) {
        let is_pm = m.as_str() == "pm";
        let rest = s.replacen(m.as_str(), "", 1);
        return parse_twelve_hour(rest.trim(), is_pm);
    }

    // 3) "930" / "0930"
    if COMPACT.is_match(&s) {
        let padded = format!("{:0>4}", s);
        let hour: u32 = padded[..2].parse().ok()?;
        let minute: u32 = padded[2..].parse().ok()?;
        return CanonicalTime::new(hour, minute);
    }

    // 4) "9-00" / "9 00" ⇒ "9:00"
    if let Some(caps) = SEPARATED.captures(&s) {
        return parse_strict(&format!("{}:{}", &caps[1], &caps[2]));
    }

    // 5) strict fallback
    parse_strict(&s)
}

fn from_fractional_hours(value: f64) -> Option<CanonicalTime> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    // whole minutes; the epsilon absorbs binary error in values like 8.2
    let total = (value * 60.0 + 1e-9).floor();
    if total >= 24.0 * 60.0 {
        return None;
    }
    let total = total as u32;
    CanonicalTime::new(total / 60, total % 60)
}

fn parse_twelve_hour(s: &str, is_pm: bool) -> Option<CanonicalTime> {
    let caps = TWELVE_HOUR.captures(s)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match (is_pm, hour) {
        (true, 12) => 12,
        (true, h) => h + 12,
        (false, 12) => 0,
        (false, h) => h,
    };
    CanonicalTime::new(hour, minute)
}

fn parse_strict(s: &str) -> Option<CanonicalTime> {
    let caps = STRICT.captures(s)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    CanonicalTime::new(hour, minute)
}
