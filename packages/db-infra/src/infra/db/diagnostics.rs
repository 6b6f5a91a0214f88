//! Process-wide counters for migration orchestration.
//!
//! Counters only ever grow; `log_snapshot` emits all of them on one debug line.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    SchemaCheck,
    FastPathHit,
    FastPathMiss,
    LockAttempt,
    LockBackoff,
    LockAcquired,
    LockTimeout,
    MigratorRan,
    BodyTimeout,
    Cancelled,
    Failed,
    PostcheckMismatch,
}

impl Counter {
    pub const ALL: [Counter; 12] = [
        Counter::SchemaCheck,
        Counter::FastPathHit,
        Counter::FastPathMiss,
        Counter::LockAttempt,
        Counter::LockBackoff,
        Counter::LockAcquired,
        Counter::LockTimeout,
        Counter::MigratorRan,
        Counter::BodyTimeout,
        Counter::Cancelled,
        Counter::Failed,
        Counter::PostcheckMismatch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Counter::SchemaCheck => "schema_checks",
            Counter::FastPathHit => "fast_path_hits",
            Counter::FastPathMiss => "fast_path_misses",
            Counter::LockAttempt => "lock_attempts",
            Counter::LockBackoff => "lock_backoffs",
            Counter::LockAcquired => "locks_acquired",
            Counter::LockTimeout => "lock_timeouts",
            Counter::MigratorRan => "migrator_runs",
            Counter::BodyTimeout => "body_timeouts",
            Counter::Cancelled => "cancellations",
            Counter::Failed => "failures",
            Counter::PostcheckMismatch => "postcheck_mismatches",
        }
    }

    fn slot(self) -> &'static AtomicUsize {
        &COUNTS[self as usize]
    }
}

static COUNTS: [AtomicUsize; Counter::ALL.len()] = [const { AtomicUsize::new(0) }; Counter::ALL.len()];

pub fn record(counter: Counter) {
    add(counter, 1);
}

pub fn add(counter: Counter, n: usize) {
    counter.slot().fetch_add(n, Ordering::Relaxed);
}

pub fn get(counter: Counter) -> usize {
    counter.slot().load(Ordering::Relaxed)
}

/// Current value of every counter, in declaration order.
pub fn snapshot() -> Vec<(&'static str, usize)> {
    Counter::ALL.iter().map(|c| (c.name(), get(*c))).collect()
}

pub fn log_snapshot(context: &str) {
    let summary = snapshot()
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!(context, counters = %summary, "migration counters");
}
