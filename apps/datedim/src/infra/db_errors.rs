//! SeaORM -> DomainError translation helpers.
//!
//! Adapters return `sea_orm::DbErr`; repositories convert it into
//! `crate::errors::domain::DomainError` here, and binaries map `DomainError`
//! to `AppError` via `From`.

use migration::DIM_DATES_DATE_KEY;
use tracing::{error, warn};

use crate::entities::dim_dates::{DATE_MISSING, DATE_OUT_OF_RANGE};
use crate::errors::domain::{ConflictKind, DomainError, InfraErrorKind, NotFoundKind};

fn mentions_sqlstate(msg: &str, code: &str) -> bool {
    msg.contains(code) || msg.contains(&format!("SQLSTATE({code})"))
}

/// Extract table.column from SQLite "UNIQUE constraint failed: table.column" error messages.
fn extract_sqlite_table_column(error_msg: &str) -> Option<&str> {
    let marker = "UNIQUE constraint failed: ";
    let start = error_msg.find(marker)? + marker.len();
    error_msg[start..]
        .split(|c: char| c.is_whitespace() || c == '"' || c == ',')
        .next()
        .filter(|s| !s.is_empty())
}

/// Map SQLite table.column format to domain-specific conflict errors.
fn map_sqlite_table_column_to_conflict(table_column: &str) -> Option<(ConflictKind, &'static str)> {
    match table_column {
        "dim_dates.date" => Some((ConflictKind::DuplicateDate, "Date already registered")),
        _ => None,
    }
}

/// Map PostgreSQL constraint names to domain-specific conflict errors.
fn map_postgres_constraint_to_conflict(error_msg: &str) -> Option<(ConflictKind, &'static str)> {
    if error_msg.contains(DIM_DATES_DATE_KEY) {
        return Some((ConflictKind::DuplicateDate, "Date already registered"));
    }
    None
}

/// Translate a `DbErr` into a `DomainError` with sanitized detail.
pub fn map_db_err(e: sea_orm::DbErr) -> DomainError {
    let error_msg = e.to_string();

    match &e {
        sea_orm::DbErr::RecordNotFound(_) => {
            return DomainError::not_found(NotFoundKind::Other("Record".into()), "Record not found");
        }
        sea_orm::DbErr::Custom(msg) if msg.starts_with(DATE_OUT_OF_RANGE) => {
            let year = msg
                .strip_prefix(DATE_OUT_OF_RANGE)
                .and_then(|y| y.parse::<i32>().ok());
            return match year {
                Some(year) => DomainError::out_of_range(year),
                None => {
                    warn!(raw_error = %msg, "Failed to parse DATE_OUT_OF_RANGE error");
                    DomainError::validation(
                        crate::errors::ValidationKind::OutOfRange,
                        "Date outside the supported range",
                    )
                }
            };
        }
        sea_orm::DbErr::Custom(msg) if msg.starts_with(DATE_MISSING) => {
            return DomainError::validation_other("A date is required");
        }
        sea_orm::DbErr::ConnectionAcquire(_) | sea_orm::DbErr::Conn(_) => {
            warn!(raw_error = %error_msg, "Database unavailable");
            return DomainError::infra(InfraErrorKind::DbUnavailable, "Database unavailable");
        }
        _ => {}
    }

    if mentions_sqlstate(&error_msg, "23505")
        || error_msg.contains("duplicate key value violates unique constraint")
        || error_msg.contains("UNIQUE constraint failed")
    {
        warn!(raw_error = %error_msg, "Unique constraint violation");

        if let Some(table_column) = extract_sqlite_table_column(&error_msg) {
            if let Some((kind, detail)) = map_sqlite_table_column_to_conflict(table_column) {
                return DomainError::conflict(kind, detail);
            }
        }

        if let Some((kind, detail)) = map_postgres_constraint_to_conflict(&error_msg) {
            return DomainError::conflict(kind, detail);
        }

        return DomainError::conflict(
            ConflictKind::Other("Unique".into()),
            "Unique constraint violation",
        );
    }

    if mentions_sqlstate(&error_msg, "22008") || error_msg.contains("out of range") {
        warn!(raw_error = %error_msg, "Date/time value out of range");
        return DomainError::validation(
            crate::errors::ValidationKind::OutOfRange,
            "Date outside the supported range",
        );
    }

    if error_msg.contains("timeout") || error_msg.contains("pool timed out") {
        warn!(raw_error = %error_msg, "Database timeout or pool issue");
        return DomainError::infra(InfraErrorKind::Timeout, "Database timeout");
    }

    error!(raw_error = %error_msg, "Unhandled database error");
    DomainError::infra(
        InfraErrorKind::Other("DbErr".into()),
        "Database operation failed",
    )
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        map_db_err(e)
    }
}
