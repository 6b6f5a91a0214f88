pub mod core;
pub mod diagnostics;
pub mod locking;
pub mod provision;

pub use core::{
    build_admin_pool, build_app_pool, connect_with_retry, orchestrate_migration,
    orchestrate_migration_internal, sanitize_db_url,
};
pub use diagnostics::Counter;
pub use locking::{BootstrapLock, Guard, InMemoryLock, PgAdvisoryLock};
pub use provision::{ensure_database, ProvisionOutcome};
