use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::DbInfraError;

/// Stable advisory-lock id for a textual key.
pub fn pg_lock_id(key: &str) -> i64 {
    xxh3_64(key.as_bytes()) as i64
}

enum Held {
    /// Session-level advisory lock held on the admin pool's single connection
    Postgres {
        admin_pool: DatabaseConnection,
        lock_key: i64,
    },
    InMemory,
}

/// A held migration lock. Must be released explicitly with [`Guard::release`].
pub struct Guard {
    held: Option<Held>,
}

impl Guard {
    fn postgres(admin_pool: DatabaseConnection, lock_key: i64) -> Self {
        Self {
            held: Some(Held::Postgres {
                admin_pool,
                lock_key,
            }),
        }
    }

    fn in_memory() -> Self {
        Self {
            held: Some(Held::InMemory),
        }
    }

    pub fn is_released(&self) -> bool {
        self.held.is_none()
    }

    /// Release the lock. Unlock failures are logged, not returned: the session
    /// drops the advisory lock when it ends anyway.
    pub async fn release(mut self) -> Result<(), DbInfraError> {
        let Some(held) = self.held.take() else {
            return Ok(());
        };

        let (admin_pool, lock_key) = match held {
            Held::InMemory => return Ok(()),
            Held::Postgres {
                admin_pool,
                lock_key,
            } => (admin_pool, lock_key),
        };

        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "SELECT pg_advisory_unlock($1) AS unlocked",
            vec![lock_key.into()],
        );

        match admin_pool.query_one(stmt).await {
            Ok(Some(row)) => {
                let unlocked: bool = row
                    .try_get("", "unlocked")
                    .map_err(|e| DbInfraError::migration(format!("unreadable pg_advisory_unlock result: {e}")))?;
                if unlocked {
                    debug!(lock_key, "advisory lock released");
                } else {
                    warn!(lock_key, "advisory unlock reported the lock was not held");
                }
            }
            Ok(None) => {
                warn!(lock_key, "advisory unlock returned no row");
            }
            Err(e) => {
                warn!(error = %e, lock_key, "advisory unlock failed");
            }
        }

        Ok(())
    }
}

/// Non-blocking lock acquisition used to serialise migrations across processes.
#[async_trait]
pub trait BootstrapLock {
    /// Returns `Some(Guard)` if acquired, `None` if another session holds it.
    async fn try_acquire(&mut self) -> Result<Option<Guard>, DbInfraError>;
}

/// PostgreSQL advisory lock on the admin pool.
///
/// INVARIANT: the admin pool is configured with min=max=1 so the unlock runs on
/// the same physical session that took the lock.
pub struct PgAdvisoryLock {
    admin_pool: DatabaseConnection,
    lock_key: i64,
}

impl PgAdvisoryLock {
    pub fn new(admin_pool: DatabaseConnection, key: &str) -> Self {
        Self {
            admin_pool,
            lock_key: pg_lock_id(key),
        }
    }
}

#[async_trait]
impl BootstrapLock for PgAdvisoryLock {
    async fn try_acquire(&mut self) -> Result<Option<Guard>, DbInfraError> {
        let lock_stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "SELECT pg_try_advisory_lock($1) AS locked",
            vec![self.lock_key.into()],
        );

        let row = self
            .admin_pool
            .query_one(lock_stmt)
            .await
            .map_err(|e| DbInfraError::migration(format!("pg_try_advisory_lock failed: {e}")))?
            .ok_or_else(|| DbInfraError::migration("pg_try_advisory_lock returned no row"))?;

        let locked: bool = row
            .try_get("", "locked")
            .map_err(|e| DbInfraError::migration(format!("unreadable pg_try_advisory_lock result: {e}")))?;

        if !locked {
            return Ok(None);
        }

        Ok(Some(Guard::postgres(self.admin_pool.clone(), self.lock_key)))
    }
}

/// No-op lock for in-memory databases, which are private to one process.
pub struct InMemoryLock;

#[async_trait]
impl BootstrapLock for InMemoryLock {
    async fn try_acquire(&mut self) -> Result<Option<Guard>, DbInfraError> {
        Ok(Some(Guard::in_memory()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_id_is_stable_per_key() {
        assert_eq!(pg_lock_id("datedim:migrate"), pg_lock_id("datedim:migrate"));
        assert_ne!(pg_lock_id("datedim:migrate:a"), pg_lock_id("datedim:migrate:b"));
    }

    #[tokio::test]
    async fn in_memory_lock_always_acquires() {
        let mut lock = InMemoryLock;
        let guard = lock.try_acquire().await.unwrap().expect("guard");
        assert!(!guard.is_released());
        guard.release().await.unwrap();
    }
}
