use std::{fmt, str::FromStr};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::TrackerError;

/// How often a recurrence rule comes due.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];

    /// Advances `from` by exactly one period.
    ///
    /// Month and year steps keep the day-of-month and clamp it to the last day
    /// of the target month, so Jan 31 becomes Feb 29 (or Feb 28) and Feb 29
    /// becomes Feb 28 in a non-leap year. The result is always strictly later
    /// than `from`; `None` is returned only when it would leave chrono's
    /// representable range.
    pub fn next_date(self, from: NaiveDate) -> Option<NaiveDate> {
        match self {
            Frequency::Daily => from.checked_add_signed(Duration::days(1)),
            Frequency::Weekly => from.checked_add_signed(Duration::weeks(1)),
            Frequency::Monthly => shift_month(from, 1),
            Frequency::Yearly => shift_month(from, 12),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Yearly => "Yearly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Frequency {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Frequency::Daily),
            "weekly" | "week" | "w" => Ok(Frequency::Weekly),
            "monthly" | "month" | "m" => Ok(Frequency::Monthly),
            "yearly" | "year" | "annual" | "y" => Ok(Frequency::Yearly),
            other => Err(TrackerError::Validation(format!(
                "unknown frequency `{}` (expected daily, weekly, monthly or yearly)",
                other
            ))),
        }
    }
}

fn shift_month(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let index = date.year() * 12 + date.month0() as i32 + months as i32;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    first_next.pred_opt().map(|last| last.day())
}
