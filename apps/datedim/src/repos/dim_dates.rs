//! Repository layer for the date dimension.
//!
//! This is the public write path for `dim_dates`: rows are only ever created
//! from a date, and the calendar columns are derived on the way in.

use sea_orm::ConnectionTrait;
use serde::Serialize;
use time::Date;
use tracing::{debug, info};

use crate::adapters::dim_dates_sea::{self as adapter, DimDateCreate};
use crate::domain::calendar::{derive, CalendarFields};
use crate::entities::dim_dates;
use crate::errors::domain::{DomainError, InfraErrorKind, NotFoundKind, ValidationKind};

/// Upper bound on a single seeding request (about two centuries).
pub const MAX_SEED_DAYS: i64 = 366 * 200;

/// A persisted date-dimension row.
///
/// Obtained only from the repository; the fields always match the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DimDate {
    date_key: i32,
    date: Date,
    #[serde(flatten)]
    fields: CalendarFields,
}

impl DimDate {
    pub fn date_key(&self) -> i32 {
        self.date_key
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn fields(&self) -> &CalendarFields {
        &self.fields
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Register a new date. Fails with `OutOfRange` before any I/O when the year
/// is unsupported, and with `DuplicateDate` when the date already exists.
pub async fn register_date<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    date: Date,
) -> Result<DimDate, DomainError> {
    derive(date)?;
    let model = adapter::create(conn, DimDateCreate::new(date)).await?;
    debug!(date = %date, date_key = model.date_key, "dim_date registered");
    DimDate::try_from(model)
}

pub async fn find_by_date<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    date: Date,
) -> Result<Option<DimDate>, DomainError> {
    adapter::find_by_date(conn, date)
        .await?
        .map(DimDate::try_from)
        .transpose()
}

pub async fn find_range<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    start: Date,
    end: Date,
) -> Result<Vec<DimDate>, DomainError> {
    adapter::find_in_range(conn, start, end)
        .await?
        .into_iter()
        .map(DimDate::try_from)
        .collect()
}

/// Register every date in `start..=end` that is not present yet.
pub async fn seed_range<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    start: Date,
    end: Date,
) -> Result<SeedReport, DomainError> {
    if start > end {
        return Err(DomainError::validation(
            ValidationKind::InvalidRange,
            format!("range start {start} is after end {end}"),
        ));
    }
    let span_days = (end - start).whole_days() + 1;
    if span_days > MAX_SEED_DAYS {
        return Err(DomainError::validation(
            ValidationKind::InvalidRange,
            format!("range of {span_days} days exceeds the limit of {MAX_SEED_DAYS}"),
        ));
    }
    // Both ends in range implies every date between them is.
    derive(start)?;
    derive(end)?;

    let existing = adapter::existing_dates(conn, start, end).await?;
    let mut report = SeedReport::default();

    let mut current = Some(start);
    while let Some(date) = current.filter(|d| *d <= end) {
        if existing.contains(&date) {
            report.skipped += 1;
        } else {
            adapter::create(conn, DimDateCreate::new(date)).await?;
            report.inserted += 1;
        }
        current = date.next_day();
    }

    info!(
        start = %start,
        end = %end,
        inserted = report.inserted,
        skipped = report.skipped,
        "dim_dates seeded"
    );
    Ok(report)
}

/// Move a row to a different date; all calendar columns follow.
pub async fn change_date<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    date_key: i32,
    new_date: Date,
) -> Result<DimDate, DomainError> {
    derive(new_date)?;
    let existing = adapter::find_by_key(conn, date_key).await?.ok_or_else(|| {
        DomainError::not_found(NotFoundKind::Date, format!("date_key {date_key} not found"))
    })?;
    let model = adapter::update_date(conn, existing, new_date).await?;
    DimDate::try_from(model)
}

/// Delete the rows for `dates`; returns how many were removed.
pub async fn remove_dates<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    dates: &[Date],
) -> Result<u64, DomainError> {
    let removed = adapter::delete_by_dates(conn, dates).await?;
    debug!(requested = dates.len(), removed, "dim_dates removed");
    Ok(removed)
}

/// Re-derive the fields for `date` and compare with what is stored.
///
/// Returns `Ok(false)` when the stored row disagrees (including stored values
/// outside their legal ranges), `NotFound` when no row exists.
pub async fn verify<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    date: Date,
) -> Result<bool, DomainError> {
    let model = adapter::find_by_date(conn, date).await?.ok_or_else(|| {
        DomainError::not_found(NotFoundKind::Date, format!("date {date} not registered"))
    })?;
    let expected = derive(model.date)?;
    Ok(stored_matches(&model, &expected))
}

fn stored_matches(model: &dim_dates::Model, fields: &CalendarFields) -> bool {
    [model.day, model.week, model.month, model.quarter, model.year, model.day_of_week]
        == [
            i32::from(fields.day()),
            i32::from(fields.week()),
            i32::from(fields.month()),
            i32::from(fields.quarter()),
            fields.year(),
            i32::from(fields.day_of_week()),
        ]
}

impl TryFrom<dim_dates::Model> for DimDate {
    type Error = DomainError;

    fn try_from(model: dim_dates::Model) -> Result<Self, Self::Error> {
        let fields = derive(model.date)
            .ok()
            .filter(|fields| stored_matches(&model, fields))
            .ok_or_else(|| {
                DomainError::infra(
                    InfraErrorKind::DataCorruption,
                    format!(
                        "dim_dates row date_key={} holds calendar fields that disagree with its date",
                        model.date_key
                    ),
                )
            })?;
        Ok(Self {
            date_key: model.date_key,
            date: model.date,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn row(date: Date, fields: CalendarFields) -> dim_dates::Model {
        dim_dates::Model {
            date_key: 7,
            date,
            day: i32::from(fields.day()),
            week: i32::from(fields.week()),
            month: i32::from(fields.month()),
            quarter: i32::from(fields.quarter()),
            year: fields.year(),
            day_of_week: i32::from(fields.day_of_week()),
        }
    }

    #[test]
    fn try_from_accepts_derived_row() {
        let d = date!(2025 - 01 - 15);
        let fields = derive(d).unwrap();
        let dim = DimDate::try_from(row(d, fields)).unwrap();
        assert_eq!(*dim.fields(), fields);
        assert_eq!(dim.date_key(), 7);
        assert_eq!(dim.date(), d);
    }

    #[test]
    fn try_from_rejects_fields_of_another_date() {
        let d = date!(2025 - 12 - 29);
        let model = row(d, derive(date!(2025 - 01 - 15)).unwrap());
        assert!(!stored_matches(&model, &derive(d).unwrap()));
        let err = DimDate::try_from(model).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Infra(InfraErrorKind::DataCorruption, _)
        ));
    }

    #[test]
    fn try_from_rejects_unpopulated_row() {
        let d = date!(2025 - 01 - 15);
        let mut model = row(d, derive(d).unwrap());
        model.day = 0;
        let err = DimDate::try_from(model).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Infra(InfraErrorKind::DataCorruption, _)
        ));
    }

    #[test]
    fn serializes_flat() {
        let d = date!(2025 - 01 - 19);
        let dim = DimDate::try_from(row(d, derive(d).unwrap())).unwrap();
        let json = serde_json::to_value(dim).unwrap();
        assert_eq!(json["day_of_week"], 0);
        assert_eq!(json["week"], 3);
        assert_eq!(json["date_key"], 7);
    }
}
