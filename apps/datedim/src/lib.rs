#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

//! Date dimension: calendar field derivation and the `dim_dates` write path.

pub(crate) mod adapters;
pub mod db;
pub mod domain;
pub(crate) mod entities;
pub mod error;
pub mod errors;
pub mod infra;
pub mod repos;
pub mod telemetry;

#[cfg(test)]
pub mod test_bootstrap;

// Re-exports for public API
pub use domain::calendar::{derive, parse_date, CalendarError, CalendarFields};
pub use error::AppError;
pub use errors::domain::DomainError;
pub use repos::dim_dates::{DimDate, SeedReport};

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    test_bootstrap::logging::init();
}
