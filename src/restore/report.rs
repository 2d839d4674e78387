use std::fmt;

use crate::resolve::ResolveMiss;
use crate::snapshot::SnapshotId;

use super::phase::Phase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    /// The logged failure message
    Failed(String),
}

impl PhaseOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PhaseOutcome::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub outcome: PhaseOutcome,
}

/// What one restore session did
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub snapshot_id: SnapshotId,
    pub snapshot_name: String,
    pub container_id: String,
    /// One record per executed phase, in order
    pub phases: Vec<PhaseRecord>,
    pub resolve_misses: Vec<ResolveMiss>,
    pub flags_refreshed: usize,
    pub entities_restored: usize,
    pub entities_failed: usize,
    pub machines_restored: usize,
    pub sequences_restored: usize,
    pub final_phase: Phase,
}

impl RestoreReport {
    pub(super) fn new(snapshot_id: SnapshotId, snapshot_name: &str, container_id: &str) -> Self {
        Self {
            snapshot_id,
            snapshot_name: snapshot_name.to_string(),
            container_id: container_id.to_string(),
            phases: Vec::with_capacity(Phase::SEQUENCE.len()),
            resolve_misses: Vec::new(),
            flags_refreshed: 0,
            entities_restored: 0,
            entities_failed: 0,
            machines_restored: 0,
            sequences_restored: 0,
            final_phase: Phase::Idle,
        }
    }

    pub fn outcome(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|r| r.phase == phase)
            .map(|r| &r.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PhaseRecord> {
        self.phases.iter().filter(|r| !r.outcome.is_completed())
    }

    /// Every phase completed and every recorded entity resolved
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none() && self.resolve_misses.is_empty()
    }
}

impl fmt::Display for RestoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Restored '{}' ({}) into {}",
            self.snapshot_name, self.snapshot_id, self.container_id
        )?;
        for record in &self.phases {
            match &record.outcome {
                PhaseOutcome::Completed => writeln!(f, "  {:<28} ok", record.phase)?,
                PhaseOutcome::Failed(message) => {
                    writeln!(f, "  {:<28} FAILED: {}", record.phase, message)?
                }
            }
        }
        writeln!(
            f,
            "  flags: {}  entities: {} ({} failed)  machines: {}  sequences: {}",
            self.flags_refreshed,
            self.entities_restored,
            self.entities_failed,
            self.machines_restored,
            self.sequences_restored
        )?;
        for miss in &self.resolve_misses {
            writeln!(f, "  unresolved: {}", miss)?;
        }
        write!(f, "  final phase: {}", self.final_phase)
    }
}
