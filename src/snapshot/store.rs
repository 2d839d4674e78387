//! Durable, ordered list of snapshots
//!
//! The whole list lives in one JSON document that is rewritten wholesale on
//! every append or delete. A missing, unreadable or malformed document is
//! treated as an empty list.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use super::model::{Snapshot, SnapshotId};

pub const STATES_SCHEMA_VERSION: u32 = 1;

const EVENT_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to serialize saved states: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Saved state not found: {0}")]
    NotFound(SnapshotId),
    #[error("Saved state already exists: {0}")]
    Duplicate(SnapshotId),
    #[error("Saved states file is corrupt: {0}")]
    Corrupt(String),
}

/// Notification fired whenever the stored list changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatesChanged {
    Appended(SnapshotId),
    Deleted(SnapshotId),
}

impl StatesChanged {
    pub fn id(&self) -> SnapshotId {
        match self {
            StatesChanged::Appended(id) | StatesChanged::Deleted(id) => *id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StatesDocument {
    schema_version: u32,
    #[serde(default)]
    states: Vec<Snapshot>,
}

/// Append/delete-only snapshot list persisted to a single file
pub struct SnapshotStore {
    path: PathBuf,
    states: RwLock<Vec<Snapshot>>,
    events: broadcast::Sender<StatesChanged>,
}

impl SnapshotStore {
    /// Open the store at `path`, loading whatever is already there
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let states = match read_states(&path) {
            Ok(states) => states,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "PersistenceCorrupt: ignoring saved states file"
                );
                Vec::new()
            }
        };
        tracing::debug!(path = %path.display(), count = states.len(), "Opened saved states");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            path,
            states: RwLock::new(states),
            events,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All snapshots, oldest first
    pub fn list(&self) -> Vec<Snapshot> {
        self.states.read().clone()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }

    pub fn get(&self, id: SnapshotId) -> Option<Snapshot> {
        self.states.read().iter().find(|s| s.id == id).cloned()
    }

    /// Look up by id, falling back to the newest snapshot with that name
    pub fn find(&self, selector: &str) -> Option<Snapshot> {
        if let Ok(id) = selector.parse::<SnapshotId>() {
            if let Some(found) = self.get(id) {
                return Some(found);
            }
        }
        self.states
            .read()
            .iter()
            .rev()
            .find(|s| s.name == selector)
            .cloned()
    }

    /// Append a snapshot and persist the list.
    ///
    /// Nothing is appended in memory unless the file write succeeds.
    pub fn append(&self, snapshot: Snapshot) -> Result<SnapshotId, StoreError> {
        let id = snapshot.id;
        {
            let mut states = self.states.write();
            if states.iter().any(|s| s.id == id) {
                return Err(StoreError::Duplicate(id));
            }
            let mut next = states.clone();
            next.push(snapshot);
            write_states(&self.path, &next)?;
            *states = next;
        }

        tracing::info!(id = %id, "Saved state appended");
        self.notify(StatesChanged::Appended(id));
        Ok(id)
    }

    /// Delete exactly one snapshot and persist the list
    pub fn delete(&self, id: SnapshotId) -> Result<Snapshot, StoreError> {
        let removed = {
            let mut states = self.states.write();
            let index = states
                .iter()
                .position(|s| s.id == id)
                .ok_or(StoreError::NotFound(id))?;
            let mut next = states.clone();
            let removed = next.remove(index);
            write_states(&self.path, &next)?;
            *states = next;
            removed
        };

        tracing::info!(id = %id, name = %removed.name, "Saved state deleted");
        self.notify(StatesChanged::Deleted(id));
        Ok(removed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatesChanged> {
        self.events.subscribe()
    }

    fn notify(&self, event: StatesChanged) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn read_states(path: &Path) -> Result<Vec<Snapshot>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: StatesDocument =
        serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    if document.schema_version > STATES_SCHEMA_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported schema_version {} (max supported: {})",
            document.schema_version, STATES_SCHEMA_VERSION
        )));
    }
    Ok(document.states)
}

fn write_states(path: &Path, states: &[Snapshot]) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let document = StatesDocument {
        schema_version: STATES_SCHEMA_VERSION,
        states: states.to_vec(),
    };
    let contents = serde_json::to_vec_pretty(&document)?;

    // Write beside the target then rename, so readers never see half a file
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(&contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
