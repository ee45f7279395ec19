//! Calendar date/time conversions using O(1) algorithms
//!
//! Implements Howard Hinnant's civil_from_days algorithm.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
//!
//! UTC only. A u32 timestamp covers 1970 to 2106.

use core::fmt::{self, Write};

const SECONDS_PER_MINUTE: u32 = 60;
const SECONDS_PER_HOUR: u32 = 3600;
const SECONDS_PER_DAY: u32 = 86400;

/// Broken-down UTC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Convert Unix seconds to a calendar date and time.
    pub fn from_unix(unix_secs: u32) -> Self {
        let days_since_epoch = unix_secs / SECONDS_PER_DAY;
        let secs_today = unix_secs % SECONDS_PER_DAY;
        let (year, month, day) = civil_from_days(days_since_epoch);

        Self {
            year,
            month,
            day,
            hour: (secs_today / SECONDS_PER_HOUR) as u8,
            minute: ((secs_today % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE) as u8,
            second: (secs_today % SECONDS_PER_MINUTE) as u8,
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS`
impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Convert days since Unix epoch to civil date (year, month, day)
///
/// Only non-negative day counts occur here, so the era is never negative.
fn civil_from_days(days_since_epoch: u32) -> (u16, u8, u8) {
    // Shift epoch from 1970-01-01 to 0000-03-01 so the leap day ends the year
    let z = days_since_epoch + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097; // day of era [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365; // year of era [0, 399]
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // day of year [0, 365]
    let mp = (5 * doy + 2) / 153; // month [0, 11], 0 = March
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = if m <= 2 { y + 1 } else { y };

    (year as u16, m, d)
}

/// Human-readable span, e.g. `2 days 0 hours 5 minutes 10 seconds.`
///
/// Leading zero units are left out.
pub fn format_duration(seconds: u32) -> heapless::String<64> {
    let mut text = heapless::String::new();
    // 64 bytes hold the longest possible text (u32::MAX seconds)
    let _ = write_duration(&mut text, seconds);
    text
}

fn write_duration<W: Write>(out: &mut W, seconds: u32) -> fmt::Result {
    let secs = seconds % SECONDS_PER_MINUTE;
    let minutes = (seconds / SECONDS_PER_MINUTE) % 60;
    let hours = (seconds / SECONDS_PER_HOUR) % 24;
    let days = seconds / SECONDS_PER_DAY;

    if days > 0 {
        write!(out, "{days} days ")?;
    }
    if days > 0 || hours > 0 {
        write!(out, "{hours} hours ")?;
    }
    if days > 0 || hours > 0 || minutes > 0 {
        write!(out, "{minutes} minutes ")?;
    }
    write!(out, "{secs} seconds.")
}
