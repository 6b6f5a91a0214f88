#![cfg(test)]

//! Test logging for unit tests; integration tests use `datedim_test_support::logging`.

/// Initialize structured logging for tests.
///
/// Idempotent; `TEST_LOG` takes precedence over `RUST_LOG`, default `warn`.
pub fn init() {
    datedim_test_support::logging::init();
}
