//! Writing captured records back onto resolved live entities

use crate::fsm::{restore_machine, restore_machines, MachinesOutcome, StrategyRegistry};
use crate::host::{CombatEntity, HostError, SequenceController};
use crate::snapshot::{EntityStateRecord, SequenceState};

/// Apply every captured field of `record` to `entity`.
///
/// Health is written first, then transform, physics, recoil and finally
/// the behavior machines. Optional components the live entity lacks are
/// reported as an error after everything else has been applied.
pub fn restore_entity(
    entity: &dyn CombatEntity,
    record: &EntityStateRecord,
    registry: &StrategyRegistry,
) -> Result<MachinesOutcome, HostError> {
    entity.set_health(record.health);
    entity.set_transform(record.transform);

    let mut first_error = None;
    if let Some(physics) = record.physics {
        if let Err(e) = entity.set_physics(physics) {
            first_error.get_or_insert(e);
        }
    }
    if let Some(recoil) = record.recoil {
        if let Err(e) = entity.set_recoil(recoil) {
            first_error.get_or_insert(e);
        }
    }

    let machines = restore_machines(
        &record.path,
        &entity.machines(),
        &record.machines,
        registry,
    );

    match first_error {
        Some(e) => Err(e),
        None => Ok(machines),
    }
}

/// Apply counters, then the controller's own machine if both sides have one.
///
/// Returns whether a machine was restored.
pub fn restore_sequence(
    controller: &dyn SequenceController,
    state: &SequenceState,
    registry: &StrategyRegistry,
) -> Result<bool, HostError> {
    controller.set_progress(state.progress)?;

    let (Some(record), Some(machine)) = (&state.machine, controller.machine()) else {
        return Ok(false);
    };
    if machine.name() != record.machine_name {
        tracing::debug!(
            path = %state.path,
            recorded = %record.machine_name,
            live = %machine.name(),
            "Encounter machine renamed, skipping"
        );
        return Ok(false);
    }
    restore_machine(
        machine.as_ref(),
        record,
        registry.strategy_for(&record.machine_name),
    )?;
    Ok(true)
}
