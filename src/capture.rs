//! Capture engine: walks the live world and produces one snapshot

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::flags;
use crate::fsm::capture_machine;
use crate::host::{CombatEntity, Host, HostError, SequenceController, World};
use crate::snapshot::{
    AvatarState, EntityStateRecord, SequenceState, Snapshot, SnapshotId, StoreError,
};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Not ready to capture: {0} unavailable")]
    NotReady(&'static str),
    #[error("Host error during capture: {0}")]
    Host(#[from] HostError),
    #[error("Failed to store capture: {0}")]
    Store(#[from] StoreError),
}

/// Capture the complete transient state of the active container.
///
/// Fails without side effects on the store when the profile, avatar or
/// active container is unavailable. Persistent flags are force-committed
/// before the flag table is read.
pub fn capture(host: &dyn Host, name: Option<&str>) -> Result<Snapshot, CaptureError> {
    let profile = host
        .profile()
        .ok_or(CaptureError::NotReady("global profile"))?;
    let avatar = host.avatar().ok_or(CaptureError::NotReady("avatar"))?;
    let loader = host.loader();
    if loader.is_transitioning() {
        return Err(CaptureError::NotReady("settled container"));
    }
    let container_id = loader
        .active_container()
        .ok_or(CaptureError::NotReady("active container"))?;
    let world = host.world();

    let global_state_blob = profile.serialize()?;

    // The table is only authoritative once every lazy flag has committed
    flags::force_sync(&*world);
    let flag_table_blob = host.flag_table().serialize()?;

    let avatar_state = AvatarState {
        kinematics: avatar.kinematics(),
        resources: profile.resources(),
    };

    let entities = capture_entities(&*world);
    let sequences = capture_sequences(&*world);

    let created_at = Utc::now();
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_name(&container_id, created_at));

    tracing::debug!(
        container = %container_id,
        entities = entities.len(),
        sequences = sequences.len(),
        "Captured world state"
    );

    Ok(Snapshot {
        id: SnapshotId::new(),
        name,
        created_at,
        container_id,
        global_state_blob,
        flag_table_blob,
        avatar: avatar_state,
        entities,
        sequences,
    })
}

pub fn capture_entity(entity: &dyn CombatEntity) -> EntityStateRecord {
    EntityStateRecord {
        path: entity.path(),
        kind: entity.kind(),
        health: entity.health(),
        transform: entity.transform(),
        physics: entity.physics(),
        recoil: entity.recoil(),
        machines: entity
            .machines()
            .iter()
            .map(|m| capture_machine(m.as_ref()))
            .collect(),
    }
}

fn capture_entities(world: &dyn World) -> Vec<EntityStateRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for entity in world.combat_entities() {
        let record = capture_entity(entity.as_ref());
        if !seen.insert(record.path.clone()) {
            tracing::warn!(path = %record.path, "Skipping entity with duplicate path");
            continue;
        }
        records.push(record);
    }
    records
}

pub fn capture_sequence(controller: &dyn SequenceController) -> SequenceState {
    SequenceState {
        path: controller.path(),
        progress: controller.progress(),
        machine: controller.machine().map(|m| capture_machine(m.as_ref())),
    }
}

/// At most one controller per encounter kind
fn capture_sequences(world: &dyn World) -> Vec<SequenceState> {
    let mut kinds = HashSet::new();
    let mut states = Vec::new();
    for controller in world.sequence_controllers() {
        let state = capture_sequence(controller.as_ref());
        if !kinds.insert(state.progress.kind()) {
            tracing::warn!(
                path = %state.path,
                kind = %state.progress.kind(),
                "Ignoring extra encounter controller"
            );
            continue;
        }
        states.push(state);
    }
    states
}

fn default_name(container_id: &str, at: DateTime<Utc>) -> String {
    format!("{} {}", container_id, at.format("%H:%M:%S"))
}
