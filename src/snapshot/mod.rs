//! Snapshot records and their durable list

pub mod model;
pub mod store;

pub use model::{
    AvatarKinematics, AvatarResources, AvatarState, EntityStateRecord, FsmStateRecord, FsmValue,
    HealthState, PhysicsState, Quat, RecoilState, SequenceKind, SequenceProgress, SequenceState,
    Snapshot, SnapshotId, Transform, Vec3,
};
pub use store::{SnapshotStore, StatesChanged, StoreError, STATES_SCHEMA_VERSION};
