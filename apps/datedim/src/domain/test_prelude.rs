use proptest::test_runner::Config as ProptestConfig;
use time::{Date, Month};

/// Shared proptest configuration; `PROPTEST_CASES` overrides the case count.
pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(512);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

/// Build a date from literal components; panics on impossible dates.
pub fn ymd(year: i32, month: u8, day: u8) -> Date {
    let month = Month::try_from(month).expect("month 1-12");
    Date::from_calendar_date(year, month, day).expect("valid calendar date")
}
