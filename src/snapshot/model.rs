//! Plain serializable records describing one captured instant of the world.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a stored snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    /// Generate a new time-ordered id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const ONE: Vec3 = Vec3::new(1.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Rotation quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Rigid-body state of an entity that has a physics body
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicsState {
    pub velocity: Vec3,
    pub angular_velocity: f32,
    pub is_kinematic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RecoilState {
    pub is_recoiling: bool,
    /// Seconds of knockback left
    pub time_remaining: f32,
}

/// Combat-relevant health fields of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthState {
    pub health: i32,
    pub is_defeated: bool,
    pub invincible: bool,
}

/// A single behavior-machine variable.
///
/// One map of tagged values replaces per-type maps, so a name can never be
/// bound to two types at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FsmValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    Vector3(Vec3),
}

impl FsmValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FsmValue::Bool(_) => "bool",
            FsmValue::Int(_) => "int",
            FsmValue::Float(_) => "float",
            FsmValue::String(_) => "string",
            FsmValue::Vector3(_) => "vector3",
        }
    }

    /// Whether both values carry the same variant
    pub fn same_type(&self, other: &FsmValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Captured state of one behavior machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmStateRecord {
    pub machine_name: String,
    pub active_state: String,
    #[serde(default)]
    pub variables: BTreeMap<String, FsmValue>,
}

/// Captured state of one health-bearing entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStateRecord {
    /// Hierarchical path, unique within one snapshot
    pub path: String,
    pub kind: String,
    #[serde(flatten)]
    pub health: HealthState,
    pub transform: Transform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics: Option<PhysicsState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoil: Option<RecoilState>,
    #[serde(default)]
    pub machines: Vec<FsmStateRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    BattleWaves,
    BossPhases,
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceKind::BattleWaves => write!(f, "battle-waves"),
            SequenceKind::BossPhases => write!(f, "boss-phases"),
        }
    }
}

/// Counters of a scripted encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequenceProgress {
    Waves {
        wave: u32,
        enemies_remaining: u32,
        started: bool,
    },
    Phases {
        level: u32,
        transitioned_in: bool,
    },
}

impl SequenceProgress {
    pub fn kind(&self) -> SequenceKind {
        match self {
            SequenceProgress::Waves { .. } => SequenceKind::BattleWaves,
            SequenceProgress::Phases { .. } => SequenceKind::BossPhases,
        }
    }
}

/// Captured state of a singleton encounter controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceState {
    pub path: String,
    pub progress: SequenceProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<FsmStateRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AvatarKinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub facing_right: bool,
    pub grounded: bool,
}

/// Resource levels, mirrored from the global profile for display only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AvatarResources {
    pub health: i32,
    pub max_health: i32,
    pub secondary: i32,
    pub currency: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AvatarState {
    pub kinematics: AvatarKinematics,
    pub resources: AvatarResources,
}

/// An immutable captured record of world state at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Container the snapshot was taken in
    pub container_id: String,
    pub global_state_blob: String,
    pub flag_table_blob: String,
    pub avatar: AvatarState,
    #[serde(default)]
    pub entities: Vec<EntityStateRecord>,
    #[serde(default)]
    pub sequences: Vec<SequenceState>,
}

impl Snapshot {
    /// Compare everything except identity, name and timestamp
    pub fn same_world_state(&self, other: &Snapshot) -> bool {
        self.container_id == other.container_id
            && self.global_state_blob == other.global_state_blob
            && self.flag_table_blob == other.flag_table_blob
            && self.avatar == other.avatar
            && self.entities == other.entities
            && self.sequences == other.sequences
    }

    pub fn entity(&self, path: &str) -> Option<&EntityStateRecord> {
        self.entities.iter().find(|e| e.path == path)
    }
}
