use db_infra::DbInfraError;
use thiserror::Error;

use crate::errors::domain::{ConflictKind, DomainError, InfraErrorKind, NotFoundKind, ValidationKind};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {detail}")]
    Validation { code: &'static str, detail: String },
    #[error("Conflict: {detail}")]
    Conflict { code: &'static str, detail: String },
    #[error("Not found: {detail}")]
    NotFound { code: &'static str, detail: String },
    #[error("Configuration error: {detail}")]
    Config { detail: String },
    #[error("Database unavailable: {detail}")]
    DbUnavailable { detail: String },
    #[error("Internal error: {detail}")]
    Internal { detail: String },
}

impl AppError {
    /// Stable machine-readable code for the error
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::NotFound { code, .. } => code,
            AppError::Config { .. } => "CONFIG_ERROR",
            AppError::DbUnavailable { .. } => "DB_UNAVAILABLE",
            AppError::Internal { .. } => "INTERNAL",
        }
    }

    /// Process exit code for the CLIs: 2 for configuration problems, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config { .. } => 2,
            _ => 1,
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(kind, detail) => {
                let code = match kind {
                    ValidationKind::OutOfRange => "DATE_OUT_OF_RANGE",
                    ValidationKind::InvalidRange => "INVALID_DATE_RANGE",
                    _ => "VALIDATION_ERROR",
                };
                AppError::Validation { code, detail }
            }
            DomainError::Conflict(kind, detail) => {
                let code = match kind {
                    ConflictKind::DuplicateDate => "DUPLICATE_DATE",
                    _ => "CONFLICT",
                };
                AppError::Conflict { code, detail }
            }
            DomainError::NotFound(kind, detail) => {
                let code = match kind {
                    NotFoundKind::Date => "DATE_NOT_FOUND",
                    _ => "NOT_FOUND",
                };
                AppError::NotFound { code, detail }
            }
            DomainError::Infra(InfraErrorKind::DbUnavailable, detail)
            | DomainError::Infra(InfraErrorKind::Timeout, detail) => {
                AppError::DbUnavailable { detail }
            }
            DomainError::Infra(_, detail) => AppError::Internal { detail },
        }
    }
}

impl From<DbInfraError> for AppError {
    fn from(err: DbInfraError) -> Self {
        match err {
            DbInfraError::Config { message } => AppError::Config { detail: message },
            DbInfraError::Connect { message } => AppError::DbUnavailable { detail: message },
            DbInfraError::Provision { message } | DbInfraError::Migration { message } => {
                AppError::Internal { detail: message }
            }
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::from(e).into()
    }
}
