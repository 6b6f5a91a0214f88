use std::future::Future;
use std::time::{Duration, Instant};

use migration::{migrate, MigrationCommand, Migrator, MigratorTrait};
use rand::Rng;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::db::{
    build_connection_settings, build_session_statements, make_conn_spec, validate_db_config,
    ConnectionSettings, DbKind, DbSettings, PoolPurpose, RuntimeEnv,
};
use crate::error::DbInfraError;
use crate::infra::db::diagnostics::{self as counters, Counter};
use crate::infra::db::locking::{BootstrapLock, Guard, InMemoryLock, PgAdvisoryLock};

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_INTERVAL_MS: u64 = 500;
const MIGRATION_BODY_TIMEOUT: Duration = Duration::from_secs(120);
const MIGRATE_TIMEOUT_VAR: &str = "DATEDIM_MIGRATE_TIMEOUT_MS";

pub(crate) async fn retry_connection<T, F, Fut>(
    mut connect_fn: F,
    max_attempts: u32,
    interval_ms: u64,
) -> Result<T, DbInfraError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbInfraError>>,
{
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match connect_fn().await {
            Ok(conn) => {
                if attempt > 1 {
                    info!(attempt, "connect=recovered");
                }
                return Ok(conn);
            }
            Err(e) if attempt < max_attempts => {
                warn!(attempt, max_attempts, error = %e.message(), "connect=retrying");
                last_error = Some(e);
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| DbInfraError::connect("no connection attempt was made")))
}

/// Connect to `url`. PostgreSQL connects are retried; the server may still be starting.
pub async fn connect_with_retry(
    url: &str,
    db_kind: DbKind,
    settings: &ConnectionSettings,
    label: &str,
) -> Result<DatabaseConnection, DbInfraError> {
    let mut opt = ConnectOptions::new(url.to_owned());
    opt.min_connections(settings.min_connections)
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .sqlx_logging(false);

    let connect = || {
        let opt = opt.clone();
        async move {
            Database::connect(opt).await.map_err(|e| {
                DbInfraError::connect(format!(
                    "{label}: cannot reach {}: {e}",
                    sanitize_db_url(url)
                ))
            })
        }
    };

    match db_kind {
        DbKind::Postgres => retry_connection(connect, CONNECT_ATTEMPTS, CONNECT_INTERVAL_MS).await,
        DbKind::SqliteMemory => connect().await,
    }
}

/// Single-connection pool used for migrations and the advisory lock.
pub async fn build_admin_pool(
    env: RuntimeEnv,
    db_kind: DbKind,
) -> Result<DatabaseConnection, DbInfraError> {
    let url = make_conn_spec(env, db_kind)?;
    let settings = build_connection_settings(env, db_kind, PoolPurpose::Migration)?;
    connect_with_retry(&url, db_kind, &settings, "admin pool").await
}

/// Application pool with session timeouts applied.
pub async fn build_app_pool(
    env: RuntimeEnv,
    db_kind: DbKind,
) -> Result<DatabaseConnection, DbInfraError> {
    let url = make_conn_spec(env, db_kind)?;
    let settings = build_connection_settings(env, db_kind, PoolPurpose::App)?;
    let pool = connect_with_retry(&url, db_kind, &settings, "app pool").await?;
    apply_db_settings(&pool, &settings.db_settings, db_kind).await?;
    info!(
        env = ?env,
        db_kind = ?db_kind,
        max_connections = settings.max_connections,
        "app pool ready"
    );
    Ok(pool)
}

/// Mask the password in a connection URL for logging and lock keys.
pub fn sanitize_db_url(url: &str) -> String {
    let Some((auth_part, host_part)) = url.rsplit_once('@') else {
        return url.to_string();
    };
    let Some((scheme, userinfo)) = auth_part.split_once("://") else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _password)) => format!("{scheme}://{user}:***@{host_part}"),
        None => url.to_string(),
    }
}

/// True when every known migration is applied, in order, ending with the newest.
async fn schema_is_current(conn: &DatabaseConnection) -> Result<bool, DbInfraError> {
    counters::record(Counter::SchemaCheck);

    let known: Vec<String> = Migrator::migrations()
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    let applied: Vec<String> = match Migrator::get_applied_migrations(conn).await {
        Ok(applied) => applied.iter().map(|m| m.name().to_string()).collect(),
        Err(DbErr::Exec(_)) => Vec::new(),
        Err(e) => {
            return Err(DbInfraError::migration(format!(
                "cannot read applied migrations: {e}"
            )))
        }
    };

    let current = !known.is_empty() && applied == known;
    counters::record(if current {
        Counter::FastPathHit
    } else {
        Counter::FastPathMiss
    });
    debug!(
        fast_path = current,
        applied = applied.len(),
        known = known.len(),
        "schema check"
    );
    Ok(current)
}

/// Connect with the admin pool and run `command` against the configured database.
///
/// Cancelling `cancel` abandons the lock wait or the running migrator.
pub async fn orchestrate_migration(
    env: RuntimeEnv,
    db_kind: DbKind,
    command: MigrationCommand,
    cancel: &CancellationToken,
) -> Result<(), DbInfraError> {
    validate_db_config(env, db_kind)?;
    let admin_pool = build_admin_pool(env, db_kind).await?;
    orchestrate_on_pool(&admin_pool, env, db_kind, command, cancel).await
}

/// Run `command` on an existing admin pool, serialised by a per-database lock.
pub async fn orchestrate_migration_internal(
    pool: &DatabaseConnection,
    env: RuntimeEnv,
    db_kind: DbKind,
    command: MigrationCommand,
) -> Result<(), DbInfraError> {
    orchestrate_on_pool(pool, env, db_kind, command, &CancellationToken::new()).await
}

async fn orchestrate_on_pool(
    pool: &DatabaseConnection,
    env: RuntimeEnv,
    db_kind: DbKind,
    command: MigrationCommand,
    cancel: &CancellationToken,
) -> Result<(), DbInfraError> {
    info!(env = ?env, db_kind = ?db_kind, command = ?command, "migrate=start");

    // Status is read-only and never takes the lock.
    if matches!(command, MigrationCommand::Status) {
        migrate(pool, command)
            .await
            .map_err(|e| DbInfraError::migration(format!("status failed: {e}")))?;
        return Ok(());
    }

    let result = match db_kind {
        DbKind::Postgres => {
            let url = make_conn_spec(env, db_kind)?;
            let key = format!("datedim:migrate:{}", sanitize_db_url(&url));
            let lock = PgAdvisoryLock::new(pool.clone(), &key);
            migrate_with_lock(pool, lock, env, db_kind, command, cancel).await
        }
        DbKind::SqliteMemory => {
            migrate_with_lock(pool, InMemoryLock, env, db_kind, command, cancel).await
        }
    };

    info!(ok = result.is_ok(), "migrate=done");
    counters::log_snapshot("orchestrate_migration");
    result
}

fn lock_budget(env: RuntimeEnv) -> Duration {
    let ms = std::env::var(MIGRATE_TIMEOUT_VAR)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(match env {
            RuntimeEnv::Test => 3_000,
            RuntimeEnv::Prod => 900,
        });
    Duration::from_millis(ms)
}

/// Delay after failed attempt `attempt`: 5ms doubling to an 80ms cap, before jitter.
fn backoff_base(attempt: u32) -> Duration {
    let ms = (5u64 << attempt.saturating_sub(1).min(4)).min(80);
    Duration::from_millis(ms)
}

/// Poll `lock` until it is won, the schema turns out to be current, or the budget runs out.
///
/// `Ok(None)` means another process already finished an `Up`.
async fn acquire_lock<L: BootstrapLock>(
    pool: &DatabaseConnection,
    lock: &mut L,
    command: MigrationCommand,
    budget: Duration,
    cancel: &CancellationToken,
) -> Result<Option<Guard>, DbInfraError> {
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        if matches!(command, MigrationCommand::Up) && schema_is_current(pool).await? {
            return Ok(None);
        }

        if let Some(guard) = lock.try_acquire().await? {
            counters::add(Counter::LockAttempt, attempt as usize);
            counters::record(Counter::LockAcquired);
            debug!(attempt, elapsed_ms = start.elapsed().as_millis(), "lock=won");
            return Ok(Some(guard));
        }

        counters::record(Counter::LockBackoff);
        let delay = backoff_base(attempt) + Duration::from_millis(rand::rng().random_range(0..4));
        debug!(attempt, delay_ms = delay.as_millis(), "lock=busy");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                counters::record(Counter::Cancelled);
                return Err(DbInfraError::migration("cancelled while waiting for the migration lock"));
            }
        }

        if start.elapsed() >= budget {
            counters::record(Counter::LockTimeout);
            return Err(DbInfraError::migration(format!(
                "migration lock not acquired within {}ms ({attempt} attempts); set {MIGRATE_TIMEOUT_VAR} to wait longer",
                budget.as_millis()
            )));
        }
    }
}

async fn migrate_with_lock<L: BootstrapLock>(
    pool: &DatabaseConnection,
    mut lock: L,
    env: RuntimeEnv,
    db_kind: DbKind,
    command: MigrationCommand,
    cancel: &CancellationToken,
) -> Result<(), DbInfraError> {
    let settings = build_connection_settings(env, db_kind, PoolPurpose::Migration)?;
    let budget = lock_budget(env);

    let Some(guard) = acquire_lock(pool, &mut lock, command, budget, cancel).await? else {
        info!("migrate=skipped up_to_date=true");
        return Ok(());
    };

    let outcome = run_under_guard(pool, command, &settings.db_settings, db_kind, cancel).await;

    if let Err(e) = guard.release().await {
        warn!(error = %e.message(), "failed to release migration lock");
    }
    outcome
}

async fn run_under_guard(
    pool: &DatabaseConnection,
    command: MigrationCommand,
    db_settings: &DbSettings,
    db_kind: DbKind,
    cancel: &CancellationToken,
) -> Result<(), DbInfraError> {
    let start = Instant::now();
    apply_db_settings(pool, db_settings, db_kind).await?;
    run_migrator(pool, command, cancel).await?;

    counters::record(Counter::MigratorRan);
    let applied = Migrator::get_applied_migrations(pool)
        .await
        .map(|m| m.len())
        .map_err(|e| DbInfraError::migration(format!("cannot read applied migrations: {e}")))?;
    let known = Migrator::migrations().len();
    info!(
        command = ?command,
        applied,
        known,
        elapsed_ms = start.elapsed().as_millis(),
        "migrator=ran"
    );

    postcheck(command, known, applied).map_err(|detail| {
        counters::record(Counter::PostcheckMismatch);
        DbInfraError::migration(detail)
    })
}

/// Run the migrator on its own task so a hung migration can be abandoned.
async fn run_migrator(
    pool: &DatabaseConnection,
    command: MigrationCommand,
    cancel: &CancellationToken,
) -> Result<(), DbInfraError> {
    let task_pool = pool.clone();
    let mut task = tokio::spawn(async move { migrate(&task_pool, command).await });

    tokio::select! {
        biased;

        joined = &mut task => match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                counters::record(Counter::Failed);
                Err(DbInfraError::migration(format!("{command:?} failed: {e}")))
            }
            Err(join_err) => {
                counters::record(Counter::Failed);
                let how = if join_err.is_panic() { "panicked" } else { "was aborted" };
                Err(DbInfraError::migration(format!("migration task {how}")))
            }
        },
        _ = tokio::time::sleep(MIGRATION_BODY_TIMEOUT) => {
            task.abort();
            let _ = task.await;
            counters::record(Counter::BodyTimeout);
            Err(DbInfraError::migration(format!(
                "{command:?} did not finish within {}s",
                MIGRATION_BODY_TIMEOUT.as_secs()
            )))
        }
        _ = cancel.cancelled() => {
            task.abort();
            let _ = task.await;
            counters::record(Counter::Cancelled);
            Err(DbInfraError::migration(format!("{command:?} cancelled")))
        }
    }
}

/// Check the applied-migration count a finished command should leave behind.
fn postcheck(command: MigrationCommand, known: usize, applied: usize) -> Result<(), String> {
    match command {
        MigrationCommand::Reset if applied != 0 => Err(format!(
            "reset left {applied} migration(s) applied, expected none"
        )),
        MigrationCommand::Up | MigrationCommand::Fresh | MigrationCommand::Refresh
            if applied != known =>
        {
            Err(format!(
                "{command:?} left {applied} of {known} migration(s) applied"
            ))
        }
        _ => Ok(()),
    }
}

async fn apply_db_settings(
    pool: &DatabaseConnection,
    settings: &DbSettings,
    db_kind: DbKind,
) -> Result<(), DbInfraError> {
    let backend = sea_orm::DatabaseBackend::from(db_kind);
    for sql in build_session_statements(db_kind, settings) {
        pool.execute(Statement::from_string(backend, sql))
            .await
            .map_err(|e| DbInfraError::connect(format!("cannot apply session settings: {e}")))?;
    }
    Ok(())
}
