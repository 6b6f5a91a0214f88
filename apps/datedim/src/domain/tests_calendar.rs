use time::{Date, Month};

use crate::domain::calendar::{derive, parse_date, quarter_of, CalendarError};
use crate::domain::test_prelude::ymd;

#[test]
fn mid_january_wednesday() {
    let fields = derive(ymd(2025, 1, 15)).unwrap();
    assert_eq!(
        (
            fields.day(),
            fields.week(),
            fields.month(),
            fields.quarter(),
            fields.year(),
            fields.day_of_week()
        ),
        (15, 3, 1, 1, 2025, 3)
    );
    assert_eq!(fields.day_of_week_name(), "Wednesday");
}

#[test]
fn sunday_is_zero_and_saturday_is_six() {
    assert_eq!(derive(ymd(2025, 1, 19)).unwrap().day_of_week(), 0);
    assert_eq!(derive(ymd(2025, 1, 25)).unwrap().day_of_week(), 6);
    assert_eq!(derive(ymd(2025, 1, 25)).unwrap().day_of_week_name(), "Saturday");
}

#[test]
fn fixture_dates_across_the_year() {
    // (date, week, quarter, day_of_week)
    let cases = [
        (ymd(2025, 3, 31), 14, 1, 1), // Monday, end of Q1
        (ymd(2025, 7, 4), 27, 3, 5),  // Friday
        (ymd(2025, 12, 25), 52, 4, 4), // Thursday
    ];
    for (date, week, quarter, dow) in cases {
        let fields = derive(date).unwrap();
        assert_eq!(fields.week(), week, "week for {date}");
        assert_eq!(fields.quarter(), quarter, "quarter for {date}");
        assert_eq!(fields.day_of_week(), dow, "day_of_week for {date}");
        assert_eq!(fields.day(), date.day());
        assert_eq!(fields.month(), u8::from(date.month()));
        assert_eq!(fields.year(), 2025);
    }
}

#[test]
fn leap_day_is_accepted() {
    let fields = derive(ymd(2024, 2, 29)).unwrap();
    assert_eq!((fields.day(), fields.month(), fields.quarter()), (29, 2, 1));
}

#[test]
fn non_leap_feb_29_is_rejected_upstream() {
    assert!(Date::from_calendar_date(2023, Month::February, 29).is_err());
    assert!(parse_date("2023-02-29").is_err());
    assert_eq!(parse_date("2024-02-29").unwrap(), ymd(2024, 2, 29));
}

#[test]
fn iso_week_crosses_year_boundary() {
    // Monday 2025-12-29 starts ISO week 1 of 2026.
    let fields = derive(ymd(2025, 12, 29)).unwrap();
    assert_eq!(fields.week(), 1);
    assert_eq!(fields.year(), 2025);
    assert_eq!(fields.day_of_week(), 1);

    // Friday 2021-01-01 still belongs to ISO week 53 of 2020.
    assert_eq!(derive(ymd(2021, 1, 1)).unwrap().week(), 53);
    // Sunday 2023-01-01 belongs to ISO week 52 of 2022.
    assert_eq!(derive(ymd(2023, 1, 1)).unwrap().week(), 52);
}

#[test]
fn quarter_mapping_for_every_month() {
    let expected = [1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4];
    for (idx, quarter) in expected.iter().enumerate() {
        let month = idx as u8 + 1;
        assert_eq!(quarter_of(month), *quarter, "month {month}");
        for year in [1, 1999, 2024, 9999] {
            assert_eq!(derive(ymd(year, month, 1)).unwrap().quarter(), *quarter);
        }
    }
}

#[test]
fn supported_range_edges() {
    assert_eq!(derive(ymd(1, 1, 1)).unwrap().year(), 1);
    assert_eq!(derive(ymd(9999, 12, 31)).unwrap().year(), 9999);
}

#[test]
fn years_before_one_are_out_of_range() {
    assert_eq!(
        derive(ymd(0, 6, 15)),
        Err(CalendarError::OutOfRange { year: 0 })
    );
    let err = derive(ymd(-44, 3, 15)).unwrap_err();
    assert_eq!(err, CalendarError::OutOfRange { year: -44 });
    assert!(err.to_string().contains("-44"));
}

#[test]
fn fields_serialize_by_name() {
    let json = serde_json::to_value(derive(ymd(2025, 12, 29)).unwrap()).unwrap();
    assert_eq!(json["week"], 1);
    assert_eq!(json["quarter"], 4);
    assert_eq!(json["day_of_week"], 1);
}

#[test]
fn parse_trims_whitespace() {
    assert_eq!(parse_date(" 2025-01-15\n").unwrap(), ymd(2025, 1, 15));
    assert!(parse_date("15/01/2025").is_err());
}
