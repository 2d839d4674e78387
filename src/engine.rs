//! Public save-state operations
//!
//! `SaveStates` ties the capture engine, the durable list and the restore
//! orchestrator to one host.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::capture::{capture, CaptureError};
use crate::config::Config;
use crate::entry::EntryOverride;
use crate::host::Host;
use crate::restore::{RestoreError, RestoreOrchestrator, RestoreReport};
use crate::snapshot::{Snapshot, SnapshotId, SnapshotStore, StatesChanged, StoreError};

pub struct SaveStates {
    host: Arc<dyn Host>,
    store: SnapshotStore,
    orchestrator: RestoreOrchestrator,
}

impl SaveStates {
    /// `entry` must be the same override the host's loader was built with
    pub fn new(host: Arc<dyn Host>, entry: Arc<EntryOverride>, config: &Config) -> Self {
        let store = SnapshotStore::open(config.storage_path.clone());
        tracing::debug!(
            path = %config.storage_path.display(),
            states = store.len(),
            "Save states opened"
        );
        let orchestrator = RestoreOrchestrator::new(
            host.clone(),
            entry,
            config.restore.clone(),
            config.strategy_registry(),
        );
        Self {
            host,
            store,
            orchestrator,
        }
    }

    /// Capture the live world and append it to the list
    pub fn capture(&self, name: Option<&str>) -> Result<SnapshotId, CaptureError> {
        let snapshot = capture(self.host.as_ref(), name)?;
        tracing::debug!(name = %snapshot.name, "Capture complete, persisting");
        Ok(self.store.append(snapshot)?)
    }

    /// Every stored snapshot, oldest first
    pub fn list(&self) -> Vec<Snapshot> {
        self.store.list()
    }

    pub fn get(&self, id: SnapshotId) -> Option<Snapshot> {
        self.store.get(id)
    }

    /// Look up by id, or by name with the newest match winning
    pub fn find(&self, selector: &str) -> Option<Snapshot> {
        self.store.find(selector)
    }

    pub fn delete(&self, id: SnapshotId) -> Result<Snapshot, StoreError> {
        self.store.delete(id)
    }

    /// Restore the snapshot with `id`. Fails only when the snapshot does not
    /// exist or another restore is running; phase failures end up in the
    /// report.
    pub async fn load(&self, id: SnapshotId) -> Result<RestoreReport, RestoreError> {
        let snapshot = self
            .store
            .get(id)
            .ok_or_else(|| RestoreError::NotFound(id.to_string()))?;
        self.restore(snapshot).await
    }

    pub async fn load_named(&self, selector: &str) -> Result<RestoreReport, RestoreError> {
        let snapshot = self
            .store
            .find(selector)
            .ok_or_else(|| RestoreError::NotFound(selector.to_string()))?;
        self.restore(snapshot).await
    }

    /// The session runs on its own task and reaches `Terminal` even when
    /// the returned future is dropped.
    async fn restore(&self, snapshot: Snapshot) -> Result<RestoreReport, RestoreError> {
        let session = self.orchestrator.begin(snapshot)?;
        tokio::spawn(session.run()).await.map_err(|e| {
            tracing::error!(error = %e, "Restore task did not complete");
            RestoreError::Aborted(e.to_string())
        })
    }

    pub fn is_restoring(&self) -> bool {
        self.orchestrator.is_busy()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatesChanged> {
        self.store.subscribe()
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }
}
