//! Create-if-absent provisioning of the configured PostgreSQL database.
//!
//! `CREATE DATABASE` cannot run inside a transaction or against the database
//! being created, so provisioning connects to the `postgres` maintenance
//! database with a single-connection pool.

use std::time::Duration;

use sea_orm::{ConnectionTrait, DatabaseBackend, DbErr, Statement};
use tracing::{info, warn};

use crate::config::db::{ConnectionSettings, DbConfig, DbKind, DbSettings};
use crate::error::DbInfraError;
use crate::infra::db::core::connect_with_retry;

/// SQLSTATE `duplicate_database`
const DUPLICATE_DATABASE: &str = "42P04";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    AlreadyExists,
    Created,
}

/// Quote an identifier for interpolation into DDL (`"name"` with embedded quotes doubled).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub async fn database_exists<C: ConnectionTrait>(conn: &C, name: &str) -> Result<bool, DbErr> {
    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        "SELECT 1 AS present FROM pg_database WHERE datname = $1",
        vec![name.into()],
    );
    Ok(conn.query_one(stmt).await?.is_some())
}

pub async fn create_database<C: ConnectionTrait>(conn: &C, name: &str) -> Result<(), DbErr> {
    let sql = format!("CREATE DATABASE {}", quote_ident(name));
    conn.execute_unprepared(&sql).await.map(|_| ())
}

fn is_duplicate_database(err: &DbErr) -> bool {
    let msg = err.to_string();
    msg.contains(DUPLICATE_DATABASE) || (msg.contains("database") && msg.contains("already exists"))
}

/// Ensure `config.database` exists, creating it when absent.
pub async fn ensure_database(config: &DbConfig) -> Result<ProvisionOutcome, DbInfraError> {
    let settings = ConnectionSettings {
        min_connections: 1,
        max_connections: 1,
        acquire_timeout: Duration::from_secs(2),
        db_settings: DbSettings {
            statement_timeout_ms: 30_000,
            lock_timeout_ms: 5_000,
        },
    };
    let conn = connect_with_retry(
        &config.maintenance_url(),
        DbKind::Postgres,
        &settings,
        "maintenance",
    )
    .await?;

    let db_name = config.database.as_str();

    let exists = database_exists(&conn, db_name).await.map_err(|e| {
        DbInfraError::provision(format!("failed to check for database '{db_name}': {e}"))
    })?;
    if exists {
        info!(database = db_name, "provision=skipped already_exists=true");
        return Ok(ProvisionOutcome::AlreadyExists);
    }

    info!(database = db_name, "provision=create");
    match create_database(&conn, db_name).await {
        Ok(()) => {
            info!(database = db_name, "provision=created");
            Ok(ProvisionOutcome::Created)
        }
        // Another process won the race between the check and the create.
        Err(e) if is_duplicate_database(&e) => {
            warn!(database = db_name, "provision=raced already_exists=true");
            Ok(ProvisionOutcome::AlreadyExists)
        }
        Err(e) => Err(DbInfraError::provision(format!(
            "failed to create database '{db_name}': {e}"
        ))),
    }
}
