//! Shared database configuration, provisioning and migration infrastructure.
//! Used by the datedim library, the migration CLI and the db-create tool.

pub mod config;
pub mod error;
pub mod infra;

pub use config::db;
pub use error::DbInfraError;
pub use infra::db::core::{
    build_admin_pool, build_app_pool, orchestrate_migration, orchestrate_migration_internal,
};
pub use infra::db::provision::{ensure_database, ProvisionOutcome};
