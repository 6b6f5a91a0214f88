//! Pure calendar logic; no database access.

pub mod calendar;

pub use calendar::{derive, parse_date, quarter_of, CalendarError, CalendarFields, MAX_YEAR, MIN_YEAR};

#[cfg(test)]
mod test_prelude;
#[cfg(test)]
mod tests_calendar;
#[cfg(test)]
mod tests_props_calendar;
