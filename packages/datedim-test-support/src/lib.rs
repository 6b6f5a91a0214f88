//! Test support utilities
//!
//! Unified logging initialization, in-memory database bootstrap and
//! collision-free test dates for the datedim workspace.

pub mod db;
pub mod logging;
pub mod unique_helpers;
