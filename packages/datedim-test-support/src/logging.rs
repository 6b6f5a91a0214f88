//! One-time tracing setup shared by unit and integration tests.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

/// Migrations log every step at info; keep the default quiet.
const DEFAULT_TEST_FILTER: &str = "warn,sqlx=error,sea_orm_migration=error";

static INITIALIZED: OnceCell<()> = OnceCell::new();

fn test_filter() -> EnvFilter {
    ["TEST_LOG", "RUST_LOG"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_TEST_FILTER))
}

/// Install the test subscriber once per process.
///
/// `TEST_LOG` wins over `RUST_LOG`. Safe to call from every test.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        fmt()
            .with_env_filter(test_filter())
            .with_test_writer()
            .without_time()
            .with_target(true)
            .try_init()
            .ok();
    });
}
