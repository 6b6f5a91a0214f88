//! Calendar field derivation for the date dimension.
//!
//! Every derived column of `dim_dates` is a function of the row's date alone.
//! [`derive`] is that function; the entity's `before_save` hook and the
//! PostgreSQL trigger both apply it on every write.

use serde::Serialize;
use thiserror::Error;
use time::macros::format_description;
use time::Date;

/// Smallest supported calendar year.
pub const MIN_YEAR: i32 = 1;
/// Largest supported calendar year.
pub const MAX_YEAR: i32 = 9999;

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("year {year} is outside the supported range 1..=9999")]
    OutOfRange { year: i32 },
}

/// The six values derived from a date.
///
/// Only [`derive`] builds one, so a value always matches some real date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CalendarFields {
    day: u8,
    week: u8,
    month: u8,
    quarter: u8,
    year: i32,
    day_of_week: u8,
}

impl CalendarFields {
    /// Day of month, 1-31.
    pub fn day(&self) -> u8 {
        self.day
    }

    /// ISO-8601 week of year, 1-53.
    pub fn week(&self) -> u8 {
        self.week
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn quarter(&self) -> u8 {
        self.quarter
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Sunday = 0 ... Saturday = 6.
    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }

    pub fn day_of_week_name(&self) -> &'static str {
        DAY_NAMES[usize::from(self.day_of_week % 7)]
    }
}

/// Derive the calendar fields for `date`.
///
/// Fails only when the year lies outside [`MIN_YEAR`]..=[`MAX_YEAR`].
pub fn derive(date: Date) -> Result<CalendarFields, CalendarError> {
    let year = date.year();
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(CalendarError::OutOfRange { year });
    }

    let month = u8::from(date.month());
    Ok(CalendarFields {
        day: date.day(),
        // `iso_week` already follows ISO-8601: Monday start, week 1 holds the first Thursday.
        week: date.iso_week(),
        month,
        quarter: quarter_of(month),
        year,
        // time numbers weekdays from Monday; the dimension counts from Sunday.
        day_of_week: date.weekday().number_days_from_sunday(),
    })
}

/// Quarter (1-4) for a month number (1-12).
pub const fn quarter_of(month: u8) -> u8 {
    (month - 1) / 3 + 1
}

/// Parse a `YYYY-MM-DD` date. Impossible dates such as 2023-02-29 are rejected.
pub fn parse_date(input: &str) -> Result<Date, time::error::Parse> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
}
