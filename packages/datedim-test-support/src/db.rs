//! Database bootstrap for tests.

use db_infra::config::db::{DbKind, RuntimeEnv};
use db_infra::{build_admin_pool, build_app_pool, orchestrate_migration_internal, DbInfraError};
use migration::MigrationCommand;
use sea_orm::DatabaseConnection;

/// A fresh in-memory SQLite database with all migrations applied.
///
/// Each call returns an isolated database; nothing is shared between tests.
pub async fn memory_db() -> Result<DatabaseConnection, DbInfraError> {
    crate::logging::init();
    let db = build_admin_pool(RuntimeEnv::Test, DbKind::SqliteMemory).await?;
    orchestrate_migration_internal(&db, RuntimeEnv::Test, DbKind::SqliteMemory, MigrationCommand::Up)
        .await?;
    Ok(db)
}

/// Connection to the PostgreSQL test database (`PG_TEST_DB`).
///
/// Tests never migrate PostgreSQL themselves: run
/// `migration up --env test` against the test database first.
pub async fn postgres_test_db() -> Result<DatabaseConnection, DbInfraError> {
    crate::logging::init();
    build_app_pool(RuntimeEnv::Test, DbKind::Postgres).await
}
