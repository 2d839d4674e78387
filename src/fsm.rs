//! Behavior-machine capture and restore

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::host::{BehaviorMachine, HostError};
use crate::snapshot::FsmStateRecord;

/// How a machine's active state is re-established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FsmRestoreStrategy {
    /// Force the active state and nothing else
    #[default]
    HardJump,
    /// Force the active state, then run its entry actions and play the
    /// animation clip of the same name. For controllers whose visible or
    /// audible effects only happen on entry.
    ReplayEntry,
}

/// Restore strategy per machine name, fixed at startup
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    by_machine: HashMap<String, FsmRestoreStrategy>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where every listed machine replays its entry actions
    pub fn with_replay_entry<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register(name, FsmRestoreStrategy::ReplayEntry);
        }
        registry
    }

    pub fn register(&mut self, machine: impl Into<String>, strategy: FsmRestoreStrategy) {
        self.by_machine.insert(machine.into(), strategy);
    }

    pub fn strategy_for(&self, machine: &str) -> FsmRestoreStrategy {
        self.by_machine.get(machine).copied().unwrap_or_default()
    }
}

pub fn capture_machine(machine: &dyn BehaviorMachine) -> FsmStateRecord {
    FsmStateRecord {
        machine_name: machine.name(),
        active_state: machine.active_state(),
        variables: machine.variables(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MachineRestoreStats {
    pub variables_written: usize,
    /// Variables the live machine lacks, by name or by type
    pub variables_skipped: usize,
}

/// Restore one machine: variables first, then the active state
pub fn restore_machine(
    machine: &dyn BehaviorMachine,
    record: &FsmStateRecord,
    strategy: FsmRestoreStrategy,
) -> Result<MachineRestoreStats, HostError> {
    let mut stats = MachineRestoreStats::default();
    for (name, value) in &record.variables {
        if machine.set_variable(name, value) {
            stats.variables_written += 1;
        } else {
            stats.variables_skipped += 1;
            tracing::trace!(
                machine = %record.machine_name,
                variable = %name,
                ty = value.type_name(),
                "Skipping variable missing on live machine"
            );
        }
    }

    machine.jump_to_state(&record.active_state)?;

    if strategy == FsmRestoreStrategy::ReplayEntry {
        machine.run_entry_actions(&record.active_state)?;
        if !machine.play_animation(&record.active_state) {
            tracing::debug!(
                machine = %record.machine_name,
                state = %record.active_state,
                "No animation component to sync"
            );
        }
    }

    Ok(stats)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MachinesOutcome {
    pub restored: usize,
    /// Records with no live machine of that name
    pub missing: usize,
    pub failed: usize,
}

/// Restore every record onto the live machine with the same name.
///
/// A failing machine is logged and does not stop the others.
pub fn restore_machines(
    owner: &str,
    machines: &[Arc<dyn BehaviorMachine>],
    records: &[FsmStateRecord],
    registry: &StrategyRegistry,
) -> MachinesOutcome {
    let mut outcome = MachinesOutcome::default();
    for record in records {
        let Some(machine) = machines.iter().find(|m| m.name() == record.machine_name) else {
            outcome.missing += 1;
            tracing::debug!(owner, machine = %record.machine_name, "Recorded machine not present");
            continue;
        };

        let strategy = registry.strategy_for(&record.machine_name);
        match restore_machine(machine.as_ref(), record, strategy) {
            Ok(_) => outcome.restored += 1,
            Err(e) => {
                outcome.failed += 1;
                tracing::warn!(
                    owner,
                    machine = %record.machine_name,
                    error = %e,
                    "Failed to restore behavior machine"
                );
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::{MachineBlueprint, SimMachine};
    use crate::snapshot::{FsmValue, Vec3};

    fn machine(animated: bool) -> SimMachine {
        let mut blueprint = MachineBlueprint::new("Battle Control", &["Idle", "Wave 1", "Wave 2"])
            .with_var("Enemies", FsmValue::Int(0))
            .with_var("Started", FsmValue::Bool(false))
            .with_var("Anchor", FsmValue::Vector3(Vec3::ZERO));
        if animated {
            blueprint = blueprint.animated();
        }
        SimMachine::from_blueprint(&blueprint)
    }

    fn record(state: &str) -> FsmStateRecord {
        let mut record = FsmStateRecord {
            machine_name: "Battle Control".to_string(),
            active_state: state.to_string(),
            variables: Default::default(),
        };
        record
            .variables
            .insert("Enemies".to_string(), FsmValue::Int(4));
        record
            .variables
            .insert("Started".to_string(), FsmValue::Bool(true));
        record
            .variables
            .insert("Unknown".to_string(), FsmValue::Float(1.5));
        // Same name, wrong type
        record
            .variables
            .insert("Anchor".to_string(), FsmValue::String("x".to_string()));
        record
    }

    #[test]
    fn test_registry_defaults_to_hard_jump() {
        let registry = StrategyRegistry::with_replay_entry(["Battle Control"]);
        assert_eq!(
            registry.strategy_for("Battle Control"),
            FsmRestoreStrategy::ReplayEntry
        );
        assert_eq!(
            registry.strategy_for("Spider AI"),
            FsmRestoreStrategy::HardJump
        );
    }

    #[test]
    fn test_capture_machine() {
        let machine = machine(false);
        machine.transition("Wave 1").unwrap();
        let record = capture_machine(&machine);
        assert_eq!(record.machine_name, "Battle Control");
        assert_eq!(record.active_state, "Wave 1");
        assert_eq!(record.variables.len(), 3);
    }

    #[test]
    fn test_hard_jump_skips_missing_variables() {
        let machine = machine(true);
        let stats = restore_machine(&machine, &record("Wave 2"), FsmRestoreStrategy::HardJump)
            .unwrap();

        assert_eq!(stats.variables_written, 2);
        assert_eq!(stats.variables_skipped, 2);
        assert_eq!(machine.active_state(), "Wave 2");
        assert_eq!(machine.var("Enemies"), Some(FsmValue::Int(4)));
        assert_eq!(machine.var("Anchor"), Some(FsmValue::Vector3(Vec3::ZERO)));
        assert!(machine.entry_log().is_empty());
        assert_eq!(machine.animation(), None);
    }

    #[test]
    fn test_replay_entry_runs_entry_and_animation() {
        let machine = machine(true);
        restore_machine(&machine, &record("Wave 2"), FsmRestoreStrategy::ReplayEntry).unwrap();

        assert_eq!(machine.active_state(), "Wave 2");
        assert_eq!(machine.entry_log(), vec!["Wave 2".to_string()]);
        assert_eq!(machine.animation(), Some("Wave 2".to_string()));
    }

    #[test]
    fn test_replay_entry_without_animator() {
        let machine = machine(false);
        restore_machine(&machine, &record("Wave 1"), FsmRestoreStrategy::ReplayEntry).unwrap();
        assert_eq!(machine.entry_log(), vec!["Wave 1".to_string()]);
        assert_eq!(machine.animation(), None);
    }

    #[test]
    fn test_unknown_state_is_an_error() {
        let machine = machine(false);
        let err = restore_machine(&machine, &record("Wave 9"), FsmRestoreStrategy::HardJump)
            .unwrap_err();
        assert!(matches!(err, HostError::UnknownState { .. }));
        assert_eq!(machine.active_state(), "Idle");
    }

    #[test]
    fn test_restore_machines_counts_outcomes() {
        let live: Vec<Arc<dyn BehaviorMachine>> = vec![Arc::new(machine(false))];
        let mut other = record("Idle");
        other.machine_name = "Gone".to_string();
        let records = vec![record("Wave 1"), other, record("Nope")];

        let outcome = restore_machines("/Room/Arena", &live, &records, &StrategyRegistry::new());
        assert_eq!(
            outcome,
            MachinesOutcome {
                restored: 1,
                missing: 1,
                failed: 1,
            }
        );
    }
}
