//! Test helpers for generating unique test data
//!
//! Tests that share a persistent database pick dates from a band of far-future
//! years so they neither collide with each other nor with real data.

use rand::Rng;
use time::{Date, Duration};

/// First and last year of the band test dates are drawn from.
pub const TEST_YEARS: (i32, i32) = (5000, 8999);

/// A random date inside [`TEST_YEARS`].
pub fn unique_date() -> Date {
    unique_run(1)
}

/// The first date of `len` consecutive days inside [`TEST_YEARS`].
pub fn unique_run(len: u16) -> Date {
    let mut rng = rand::rng();
    let year = rng.random_range(TEST_YEARS.0..=TEST_YEARS.1 - 1);
    let offset = rng.random_range(0..365 - i64::from(len.min(364)));
    let jan1 = Date::from_ordinal_date(year, 1).expect("January 1st exists in every year");
    jan1 + Duration::days(offset)
}
