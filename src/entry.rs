//! One-shot override of the loader's reentry-coordinate query

use parking_lot::Mutex;

use crate::host::SpawnPointProvider;
use crate::snapshot::Vec3;

#[derive(Debug, Clone, PartialEq)]
struct PendingEntry {
    container: String,
    gate: String,
    position: Vec3,
}

/// Spawn-point strategy injected into the container loader.
///
/// While armed, the first query for the armed container and gate returns the
/// armed position and clears the override. Every other query, and every
/// query after that one, falls through to the container's own spawn.
#[derive(Debug, Default)]
pub struct EntryOverride {
    pending: Mutex<Option<PendingEntry>>,
}

impl EntryOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, container: &str, gate: &str, position: Vec3) {
        let previous = self.pending.lock().replace(PendingEntry {
            container: container.to_string(),
            gate: gate.to_string(),
            position,
        });
        if let Some(previous) = previous {
            tracing::warn!(
                container = %previous.container,
                gate = %previous.gate,
                "Replacing an unconsumed entry override"
            );
        }
        tracing::debug!(container, gate, position = %position, "Entry override armed");
    }

    /// Clear the override. Returns true if it was still unconsumed.
    pub fn disarm(&self) -> bool {
        self.pending.lock().take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl SpawnPointProvider for EntryOverride {
    fn reentry_position(&self, container: &str, gate: &str) -> Option<Vec3> {
        let mut pending = self.pending.lock();
        match pending.as_ref() {
            Some(entry) if entry.container == container && entry.gate == gate => {
                let position = entry.position;
                *pending = None;
                tracing::debug!(container, gate, position = %position, "Entry override consumed");
                Some(position)
            }
            _ => None,
        }
    }
}
