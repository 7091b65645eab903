//! Request/response facade over capture, storage, classification, restore
//! and scheduling. Every call is synchronous and returns its result to the
//! caller; nothing here prints or prompts.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::scheduler::{Scheduler, SchedulerState, SnapshotInterval, StartOutcome, StopOutcome};
use crate::store::{DeleteReport, SnapshotStore};
use crate::system::collector::Collector;
use crate::system::launch::{RestoreExecutor, RestoreReport};
use crate::system::process::{Classification, ProcessClassifier};
use crate::system::snapshot::Snapshot;

pub struct SnapshotEngine {
    store: SnapshotStore,
    collector: Collector,
    classifier: ProcessClassifier,
    executor: RestoreExecutor,
    scheduler: Scheduler,
}

impl SnapshotEngine {
    pub fn new(config: &Config) -> Result<Self> {
        let dir = match &config.storage.directory {
            Some(dir) => dir.clone(),
            None => SnapshotStore::default_dir()?,
        };
        tracing::debug!(dir = %dir.display(), "using snapshot directory");
        Ok(Self::from_parts(
            SnapshotStore::new(dir),
            Collector::new(config.inspector.fd_scan_budget()),
            ProcessClassifier::new(config.classifier.system_markers.clone()),
        ))
    }

    pub fn from_parts(
        store: SnapshotStore,
        collector: Collector,
        classifier: ProcessClassifier,
    ) -> Self {
        Self {
            store,
            collector,
            classifier,
            executor: RestoreExecutor,
            scheduler: Scheduler::new(),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn create_snapshot(&mut self) -> Result<PathBuf> {
        let snapshot = self.collector.capture();
        self.store.save(&snapshot).inspect_err(|e| {
            tracing::error!("error creating snapshot: {e}");
        })
    }

    pub fn list_snapshots(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    pub fn load_snapshot_for_restore(&self, name: &str) -> Result<Snapshot> {
        self.store.load(name).inspect_err(|e| {
            tracing::warn!("error loading snapshot: {e}");
        })
    }

    pub fn classify(&self, snapshot: &Snapshot) -> Classification {
        self.classifier.classify(snapshot)
    }

    pub fn restore_selected<S: AsRef<str>>(
        &self,
        snapshot: &Snapshot,
        selected: &[S],
    ) -> Vec<RestoreReport> {
        self.executor.restore(snapshot, selected)
    }

    pub fn delete_snapshot(&self, name: &str) -> Result<()> {
        self.store.delete(name)
    }

    pub fn delete_all_snapshots(&self) -> Result<Vec<DeleteReport>> {
        self.store.delete_all()
    }

    /// Validates `seconds` against the supported intervals and moves the
    /// scheduler to `Running`. Nothing is captured here; captures happen in
    /// [`on_tick`](Self::on_tick). [`EventHandler::new`] emits its first
    /// `Tick` immediately, so a loop driven by it captures right away. Front
    /// ends with their own timer should call `on_tick` once after starting.
    ///
    /// [`EventHandler::new`]: crate::event::EventHandler::new
    pub fn start_scheduler(&mut self, seconds: u64) -> Result<StartOutcome> {
        let interval = SnapshotInterval::from_secs(seconds)?;
        let outcome = self.scheduler.start(interval)?;
        match outcome {
            StartOutcome::Started(interval) => {
                tracing::info!("automatic snapshots will be taken every {interval}");
            }
            StartOutcome::AlreadyRunning(interval) => {
                tracing::info!("automatic snapshots already running every {interval}");
            }
        }
        Ok(outcome)
    }

    pub fn stop_scheduler(&mut self) -> StopOutcome {
        let outcome = self.scheduler.stop();
        match outcome {
            StopOutcome::Stopped(_) => tracing::info!("automatic snapshots stopped"),
            StopOutcome::WasNotRunning => tracing::info!("automatic snapshots are not running"),
        }
        outcome
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// One timer firing: captures and saves when running, otherwise `None`.
    pub fn on_tick(&mut self) -> Option<Result<PathBuf>> {
        if !self.scheduler.is_running() {
            tracing::debug!("tick ignored, scheduler stopped");
            return None;
        }
        Some(self.create_snapshot())
    }
}
