//! Reconciliation between a local task source and a remote workspace store.
//!
//! This crate provides:
//! - `ReconciliationEngine`: one diff-and-patch cycle with conflict policies
//! - `SyncScheduler`: periodic/forced cycles with a single-flight guard and shared `SyncStatus`
//! - `MigrationService`: one-shot bulk onboarding and rescoring
//! - Local task sources, the persisted id map, listeners and text reports

pub mod error;
pub mod idmap;
pub mod listener;
pub mod migration;
pub mod options;
pub mod reconcile;
pub mod report;
pub mod scheduler;
pub mod source;
pub mod status;

pub use error::{ListenerError, SourceError, SyncError};
pub use idmap::{IdMap, PendingWrite};
pub use listener::{LoggingListener, SyncEvent, SyncListener};
pub use migration::{MigrationOptions, MigrationResult, MigrationService};
pub use options::{ConflictResolution, OperationResponse, SyncConfig, SyncOptions};
pub use reconcile::{CycleOutcome, ReconciliationEngine, WatchedField};
pub use scheduler::SyncScheduler;
pub use source::{JsonFileSource, LocalTaskSource, StaticTaskSource};
pub use status::{CycleSummary, SyncPhase, SyncResult, SyncStatus};
