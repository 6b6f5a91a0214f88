//! Domain-level error type used across repositories and adapters.
//!
//! This error type is DB-agnostic. Binaries work with
//! `Result<T, crate::error::AppError>` and convert from `DomainError`
//! through the provided `From<DomainError> for AppError` implementation.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Validation failure kinds
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationKind {
    /// Date year outside the supported calendar span
    OutOfRange,
    /// Start/end of a date range are reversed or the span is too long
    InvalidRange,
    Other(String),
}

/// Infra error kinds to distinguish operational failures
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InfraErrorKind {
    Timeout,
    DbUnavailable,
    DataCorruption,
    Other(String),
}

/// Domain-level not found entities
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotFoundKind {
    Date,
    Other(String),
}

/// Domain-level conflict kinds
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConflictKind {
    /// A row for this date already exists
    DuplicateDate,
    Other(String),
}

/// Central domain error type
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Input validation or business rule violation
    Validation(ValidationKind, String),
    /// Semantic conflict
    Conflict(ConflictKind, String),
    /// Missing resource in domain terms
    NotFound(NotFoundKind, String),
    /// Infrastructure/operational failures
    Infra(InfraErrorKind, String),
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DomainError::Validation(kind, d) => write!(f, "validation error {kind:?}: {d}"),
            DomainError::Conflict(kind, d) => write!(f, "conflict {kind:?}: {d}"),
            DomainError::NotFound(kind, d) => write!(f, "not found {kind:?}: {d}"),
            DomainError::Infra(kind, d) => write!(f, "infra {kind:?}: {d}"),
        }
    }
}

impl Error for DomainError {}

impl DomainError {
    pub fn validation(kind: ValidationKind, detail: impl Into<String>) -> Self {
        Self::Validation(kind, detail.into())
    }
    pub fn validation_other(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::Validation(ValidationKind::Other(detail.clone()), detail)
    }
    pub fn conflict(kind: ConflictKind, detail: impl Into<String>) -> Self {
        Self::Conflict(kind, detail.into())
    }
    pub fn not_found(kind: NotFoundKind, detail: impl Into<String>) -> Self {
        Self::NotFound(kind, detail.into())
    }
    pub fn infra(kind: InfraErrorKind, detail: impl Into<String>) -> Self {
        Self::Infra(kind, detail.into())
    }

    pub fn out_of_range(year: i32) -> Self {
        Self::validation(
            ValidationKind::OutOfRange,
            format!("year {year} is outside the supported range 1..=9999"),
        )
    }

    pub fn duplicate_date(detail: impl Into<String>) -> Self {
        Self::conflict(ConflictKind::DuplicateDate, detail)
    }

    pub fn is_duplicate_date(&self) -> bool {
        matches!(self, Self::Conflict(ConflictKind::DuplicateDate, _))
    }

    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::Validation(ValidationKind::OutOfRange, _))
    }
}

impl From<crate::domain::CalendarError> for DomainError {
    fn from(e: crate::domain::CalendarError) -> Self {
        match e {
            crate::domain::CalendarError::OutOfRange { year } => Self::out_of_range(year),
        }
    }
}
