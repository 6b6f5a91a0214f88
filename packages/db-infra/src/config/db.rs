use std::env;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::DbInfraError;

/// Runtime environment; selects which database name is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnv {
    /// Production database (`PG_DB`)
    Prod,
    /// Test database (`PG_TEST_DB`) - enforces the `_test` suffix
    Test,
}

/// Database engine behind a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Postgres,
    /// Ephemeral SQLite database; used by tests, never by the CLIs
    SqliteMemory,
}

impl From<DbKind> for sea_orm::DatabaseBackend {
    fn from(kind: DbKind) -> Self {
        match kind {
            DbKind::Postgres => sea_orm::DatabaseBackend::Postgres,
            DbKind::SqliteMemory => sea_orm::DatabaseBackend::Sqlite,
        }
    }
}

/// What a pool is used for; drives pool sizing and session timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPurpose {
    App,
    Migration,
}

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DB: &str = "datedim";
pub const MAINTENANCE_DB: &str = "postgres";
pub const SQLITE_MEMORY_URL: &str = "sqlite::memory:";

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
const MAX_IDENTIFIER_BYTES: usize = 63;

// Everything except RFC 3986 unreserved characters gets escaped in the userinfo part.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// PostgreSQL connection parameters, read once from the environment.
///
/// | variable     | default          |
/// |--------------|------------------|
/// | `PG_HOST`    | `localhost`      |
/// | `PG_PORT`    | `5432`           |
/// | `PG_DB`      | `datedim`        |
/// | `PG_TEST_DB` | `<PG_DB>_test`   |
/// | `PG_USER`    | `$USER`          |
/// | `PG_PASS`    | empty            |
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl DbConfig {
    /// Load and validate the configuration from process environment variables.
    pub fn from_env(runtime: RuntimeEnv) -> Result<Self, DbInfraError> {
        Self::from_lookup(runtime, |name| env::var(name).ok())
    }

    /// Load and validate the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(runtime: RuntimeEnv, lookup: F) -> Result<Self, DbInfraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("PG_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var("PG_PORT") {
            Some(raw) => parse_port(&raw)?,
            None => DEFAULT_PORT,
        };

        let prod_db = var("PG_DB").unwrap_or_else(|| DEFAULT_DB.to_string());
        let database = match runtime {
            RuntimeEnv::Prod => prod_db,
            RuntimeEnv::Test => var("PG_TEST_DB").unwrap_or_else(|| format!("{prod_db}_test")),
        };

        let user = var("PG_USER").or_else(|| var("USER")).ok_or_else(|| {
            DbInfraError::config("Required environment variable 'PG_USER' is not set (and USER is empty)")
        })?;
        let password = lookup("PG_PASS").unwrap_or_default();

        let config = Self {
            host,
            port,
            database,
            user,
            password,
        };
        config.validate(runtime)?;
        Ok(config)
    }

    pub fn validate(&self, runtime: RuntimeEnv) -> Result<(), DbInfraError> {
        validate_identifier("database name", &self.database)?;
        validate_identifier("user", &self.user)?;

        if self.host.is_empty() {
            return Err(DbInfraError::config("database host must not be empty"));
        }

        // Enforce safety: the test profile never points at a production database
        if runtime == RuntimeEnv::Test && !self.database.ends_with("_test") {
            return Err(DbInfraError::config(format!(
                "Test profile requires database name to end with '_test', but got: '{}'",
                self.database
            )));
        }
        Ok(())
    }

    /// Connection URL for the configured database.
    pub fn url(&self) -> String {
        self.url_for(&self.database)
    }

    /// Connection URL for the `postgres` maintenance database, used to create `self.database`.
    pub fn maintenance_url(&self) -> String {
        self.url_for(MAINTENANCE_DB)
    }

    fn url_for(&self, database: &str) -> String {
        let user = utf8_percent_encode(&self.user, USERINFO);
        let database = utf8_percent_encode(database, USERINFO);
        if self.password.is_empty() {
            format!("postgresql://{user}@{}:{}/{database}", self.host, self.port)
        } else {
            let password = utf8_percent_encode(&self.password, USERINFO);
            format!(
                "postgresql://{user}:{password}@{}:{}/{database}",
                self.host, self.port
            )
        }
    }
}

fn parse_port(raw: &str) -> Result<u16, DbInfraError> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(DbInfraError::config(format!(
            "PG_PORT must be a port number between 1 and 65535, got: '{raw}'"
        ))),
        Ok(port) => Ok(port),
    }
}

fn validate_identifier(what: &str, value: &str) -> Result<(), DbInfraError> {
    if value.is_empty() {
        return Err(DbInfraError::config(format!("{what} must not be empty")));
    }
    if value.len() > MAX_IDENTIFIER_BYTES {
        return Err(DbInfraError::config(format!(
            "{what} '{value}' exceeds {MAX_IDENTIFIER_BYTES} bytes"
        )));
    }
    if value.contains('\0') {
        return Err(DbInfraError::config(format!("{what} must not contain NUL")));
    }
    Ok(())
}

/// Validate configuration for the given environment without connecting.
pub fn validate_db_config(env: RuntimeEnv, db_kind: DbKind) -> Result<(), DbInfraError> {
    match db_kind {
        DbKind::Postgres => DbConfig::from_env(env).map(|_| ()),
        DbKind::SqliteMemory => Ok(()),
    }
}

/// Builds the connection URL for the given environment and engine.
pub fn make_conn_spec(env: RuntimeEnv, db_kind: DbKind) -> Result<String, DbInfraError> {
    match db_kind {
        DbKind::Postgres => Ok(DbConfig::from_env(env)?.url()),
        DbKind::SqliteMemory => Ok(SQLITE_MEMORY_URL.to_string()),
    }
}

/// Per-session timeouts applied after connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbSettings {
    pub statement_timeout_ms: u64,
    pub lock_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub db_settings: DbSettings,
}

pub fn build_connection_settings(
    env: RuntimeEnv,
    db_kind: DbKind,
    purpose: PoolPurpose,
) -> Result<ConnectionSettings, DbInfraError> {
    let db_settings = match purpose {
        PoolPurpose::Migration => DbSettings {
            statement_timeout_ms: 120_000,
            lock_timeout_ms: 10_000,
        },
        PoolPurpose::App => DbSettings {
            statement_timeout_ms: match env {
                RuntimeEnv::Prod => 5_000,
                RuntimeEnv::Test => 15_000,
            },
            lock_timeout_ms: 2_000,
        },
    };

    // Every connection to sqlite::memory: is its own database, so the pool must stay at one.
    let (min_connections, max_connections) = match (db_kind, purpose) {
        (DbKind::SqliteMemory, _) | (_, PoolPurpose::Migration) => (1, 1),
        (DbKind::Postgres, PoolPurpose::App) => (1, (num_cpus::get() as u32 * 2).clamp(2, 32)),
    };

    Ok(ConnectionSettings {
        min_connections,
        max_connections,
        acquire_timeout: Duration::from_secs(match purpose {
            PoolPurpose::Migration => 2,
            PoolPurpose::App => 5,
        }),
        db_settings,
    })
}

/// Session statements to run on a fresh connection.
pub fn build_session_statements(db_kind: DbKind, settings: &DbSettings) -> Vec<String> {
    match db_kind {
        DbKind::Postgres => vec![
            format!("SET statement_timeout = {}", settings.statement_timeout_ms),
            format!("SET lock_timeout = {}", settings.lock_timeout_ms),
            "SET TIME ZONE 'UTC'".to_string(),
        ],
        DbKind::SqliteMemory => Vec::new(),
    }
}
