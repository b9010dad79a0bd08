//! Periodic and on-demand sync cycles.
//!
//! [`SyncScheduler`] owns the timer task and the shared [`SyncStatus`].
//! At most one cycle runs at a time: a timer tick that finds a cycle in
//! flight is skipped, a forced sync gets [`SyncError::CycleInProgress`].
//! Stopping only affects future ticks; an in-flight cycle runs to completion.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use tasksync_core::SharedClock;

use crate::error::SyncError;
use crate::listener::{notify_all, SyncEvent, SyncListener};
use crate::options::{OperationResponse, SyncConfig, SyncOptions};
use crate::reconcile::ReconciliationEngine;
use crate::status::{SyncPhase, SyncResult, SyncStatus};

#[cfg(test)]
mod tests;

struct Timer {
    stop: Arc<Notify>,
    options: SyncOptions,
}

struct Inner {
    engine: ReconciliationEngine,
    clock: SharedClock,
    status: RwLock<SyncStatus>,
    /// Held for the duration of a cycle.
    cycle_guard: tokio::sync::Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn SyncListener>>>,
    timer: Mutex<Option<Timer>>,
}

impl Inner {
    fn read_status(&self) -> RwLockReadGuard<'_, SyncStatus> {
        self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_status(&self) -> RwLockWriteGuard<'_, SyncStatus> {
        self.status.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<Timer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> Vec<Arc<dyn SyncListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one cycle. The caller must hold `cycle_guard`.
    async fn run_locked(
        &self,
        config: &SyncConfig,
        options: &SyncOptions,
    ) -> Result<SyncResult, SyncError> {
        let last_sync_at = {
            let mut status = self.write_status();
            status.phase = SyncPhase::Syncing;
            status.last_sync_at
        };

        let outcome = match self.engine.run_cycle(config, options, last_sync_at).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.write_status().phase = SyncPhase::Error;
                return Err(e);
            }
        };

        {
            let mut status = self.write_status();
            status.record(&outcome.result, options.interval_chrono());
            if !status.is_active {
                status.next_sync_at = None;
            }
        }

        let event = SyncEvent {
            result: outcome.result.clone(),
            remote_tasks: outcome.remote_tasks,
            pull_candidates: outcome.pull_candidates,
        };
        let listeners = self.listeners();
        if !listeners.is_empty() {
            let delivery = notify_all(&listeners, &event).await;
            debug!(delivered = delivery.delivered, failed = delivery.failed, "listeners notified");
        }

        Ok(outcome.result)
    }

    async fn run_scheduled(&self, config: &SyncConfig, options: &SyncOptions) {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            debug!("sync tick skipped, a cycle is already in progress");
            return;
        };
        if let Err(e) = self.run_locked(config, options).await {
            error!(error = %e, "scheduled sync cycle failed");
        }
    }
}

async fn run_timer(inner: Arc<Inner>, stop: Arc<Notify>, config: SyncConfig, options: SyncOptions) {
    let mut ticker = tokio::time::interval(options.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.notified() => break,
            _ = ticker.tick() => inner.run_scheduled(&config, &options).await,
        }
    }
    debug!(database_id = %config.database_id, "sync timer stopped");
}

/// Drives reconciliation cycles on a timer or on demand.
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

impl SyncScheduler {
    pub fn new(engine: ReconciliationEngine) -> Self {
        let clock = engine.clock().clone();
        Self {
            inner: Arc::new(Inner {
                engine,
                clock,
                status: RwLock::new(SyncStatus::default()),
                cycle_guard: tokio::sync::Mutex::new(()),
                listeners: RwLock::new(Vec::new()),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.inner.engine
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> SyncStatus {
        self.inner.read_status().clone()
    }

    pub fn reset_status(&self) {
        self.inner.write_status().reset();
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_timer().is_some()
    }

    /// Register a listener notified after every cycle.
    pub fn subscribe(&self, listener: Arc<dyn SyncListener>) {
        info!(listener = listener.name(), "sync listener registered");
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Start (or restart) the periodic timer. The first cycle runs immediately.
    ///
    /// Needs a Tokio runtime; without one the call fails.
    pub fn start_sync(&self, config: SyncConfig, options: SyncOptions) -> OperationResponse {
        if let Err(e) = config.validate().and_then(|()| options.validate()) {
            return OperationResponse::failed(e.to_string());
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return OperationResponse::failed("no async runtime available to drive the sync timer");
        };

        let mut timer = self.inner.lock_timer();
        if let Some(previous) = timer.take() {
            previous.stop.notify_one();
            info!("restarting sync timer with new options");
        }

        {
            let mut status = self.inner.write_status();
            status.is_active = true;
            status.sync_interval_minutes = options.sync_interval_minutes;
            status.next_sync_at = Some(self.inner.clock.now());
        }

        let stop = Arc::new(Notify::new());
        runtime.spawn(run_timer(
            self.inner.clone(),
            stop.clone(),
            config.clone(),
            options.clone(),
        ));
        *timer = Some(Timer {
            stop,
            options: options.clone(),
        });

        info!(
            database_id = %config.database_id,
            interval_minutes = options.sync_interval_minutes,
            policy = %options.conflict_resolution,
            "sync scheduler started"
        );
        OperationResponse::ok(format!(
            "Sync started for database {} every {} minute(s)",
            config.database_id, options.sync_interval_minutes
        ))
    }

    /// Stop future ticks. A cycle already running is left to finish.
    pub fn stop_sync(&self) -> OperationResponse {
        let Some(timer) = self.inner.lock_timer().take() else {
            return OperationResponse::ok("Sync is not running");
        };
        timer.stop.notify_one();

        {
            let mut status = self.inner.write_status();
            status.is_active = false;
            status.next_sync_at = None;
        }
        info!("sync scheduler stopped");
        OperationResponse::ok("Sync stopped")
    }

    /// Run one cycle now.
    ///
    /// Without explicit options, the running timer's options (or the
    /// defaults) are used.
    pub async fn force_sync(
        &self,
        config: &SyncConfig,
        options: Option<SyncOptions>,
    ) -> Result<SyncResult, SyncError> {
        config.validate()?;
        let options = match options {
            Some(options) => options,
            None => self
                .inner
                .lock_timer()
                .as_ref()
                .map(|t| t.options.clone())
                .unwrap_or_default(),
        };
        options.validate()?;

        let Ok(_guard) = self.inner.cycle_guard.try_lock() else {
            return Err(SyncError::CycleInProgress);
        };
        info!(database_id = %config.database_id, "forced sync cycle");
        self.inner.run_locked(config, &options).await
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.lock_timer().take() {
            timer.stop.notify_one();
        }
    }
}
