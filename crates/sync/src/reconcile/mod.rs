//! Reconciliation of a local task set against a remote task store.

pub mod conflict;
pub mod diff;
mod engine;

pub use conflict::resolve_patch;
pub use diff::{diff_fields, WatchedField};
pub use engine::{CycleOutcome, ReconciliationEngine, DEFAULT_MAX_CONCURRENCY};
