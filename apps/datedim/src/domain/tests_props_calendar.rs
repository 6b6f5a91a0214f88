//! Property tests for calendar derivation (pure domain, no DB).

use proptest::prelude::*;
use time::Date;

use crate::domain::calendar::{derive, quarter_of};
use crate::domain::test_prelude::{self, ymd};

fn supported_dates() -> impl Strategy<Value = Date> {
    let first = ymd(1, 1, 1).to_julian_day();
    let last = ymd(9999, 12, 31).to_julian_day();
    (first..=last).prop_map(|jd| Date::from_julian_day(jd).expect("julian day in range"))
}

/// Long-form ISO week computation, independent of the date library.
fn reference_iso_week(date: Date) -> u8 {
    fn weeks_in_year(year: i32) -> i32 {
        let p = |y: i32| (y + y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400)).rem_euclid(7);
        if p(year) == 4 || p(year - 1) == 3 {
            53
        } else {
            52
        }
    }

    let ordinal = i32::from(date.ordinal());
    let iso_weekday = i32::from(date.weekday().number_from_monday());
    let week = (ordinal - iso_weekday + 10) / 7;
    let week = if week < 1 {
        weeks_in_year(date.year() - 1)
    } else if week > weeks_in_year(date.year()) {
        1
    } else {
        week
    };
    week as u8
}

proptest! {
    #![proptest_config(test_prelude::proptest_config())]

    /// Property: date components pass through unchanged
    #[test]
    fn prop_components_preserved(date in supported_dates()) {
        let fields = derive(date).unwrap();
        prop_assert_eq!(fields.year(), date.year());
        prop_assert_eq!(fields.month(), u8::from(date.month()));
        prop_assert_eq!(fields.day(), date.day());
    }

    /// Property: quarter is ((month - 1) / 3) + 1
    #[test]
    fn prop_quarter_from_month(date in supported_dates()) {
        let fields = derive(date).unwrap();
        prop_assert_eq!(fields.quarter(), quarter_of(fields.month()));
        prop_assert!((1..=4).contains(&fields.quarter()));
    }

    /// Property: week agrees with the long-form ISO-8601 rule
    #[test]
    fn prop_iso_week_matches_reference(date in supported_dates()) {
        let fields = derive(date).unwrap();
        prop_assert!((1..=53).contains(&fields.week()));
        prop_assert_eq!(fields.week(), reference_iso_week(date));
    }

    /// Property: day_of_week counts from Sunday, consistent with the Julian day number
    /// (JDN 0 is a Monday).
    #[test]
    fn prop_day_of_week_sunday_based(date in supported_dates()) {
        let fields = derive(date).unwrap();
        let expected = (date.to_julian_day() + 1).rem_euclid(7) as u8;
        prop_assert_eq!(fields.day_of_week(), expected);

        if let Some(next) = date.next_day().filter(|d| d.year() <= 9999) {
            prop_assert_eq!(derive(next).unwrap().day_of_week(), (fields.day_of_week() + 1) % 7);
        }
    }

    /// Property: derivation is deterministic
    #[test]
    fn prop_rederive_is_identical(date in supported_dates()) {
        prop_assert_eq!(derive(date), derive(date));
    }
}
