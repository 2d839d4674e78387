//! Interfaces to the host runtime
//!
//! The capture and restore engines never touch host objects directly. Each
//! host object kind is reached through one narrow trait here, and all
//! field-level coupling to the host lives in the implementations of these
//! traits. Methods take `&self`: host objects are shared and mutate through
//! their own interior state.

pub mod sim;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::snapshot::{
    AvatarKinematics, AvatarResources, FsmValue, HealthState, PhysicsState, RecoilState,
    SequenceProgress, Transform, Vec3,
};

/// Errors reported by host collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("Host object unavailable: {0}")]
    Unavailable(&'static str),
    #[error("Unknown container: {0}")]
    UnknownContainer(String),
    #[error("A container transition is already in progress")]
    TransitionInProgress,
    #[error("Failed to serialize {what}: {message}")]
    Serialize { what: &'static str, message: String },
    #[error("Failed to populate {what}: {message}")]
    Populate { what: &'static str, message: String },
    #[error("Unknown state '{state}' on machine '{machine}'")]
    UnknownState { machine: String, state: String },
    #[error("Entity {path} has no {component}")]
    MissingComponent {
        path: String,
        component: &'static str,
    },
}

/// Capability an entity is enumerated by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Health,
    PersistentFlag,
    Sequence,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::Health => write!(f, "health"),
            CapabilityKind::PersistentFlag => write!(f, "persistent-flag"),
            CapabilityKind::Sequence => write!(f, "sequence"),
        }
    }
}

/// A named state machine attached to an entity
pub trait BehaviorMachine: Send + Sync {
    fn name(&self) -> String;
    fn active_state(&self) -> String;
    fn variables(&self) -> BTreeMap<String, FsmValue>;
    /// Write one variable. Returns false when the machine has no variable
    /// of that name and type.
    fn set_variable(&self, name: &str, value: &FsmValue) -> bool;
    /// Force the active state without running a transition
    fn jump_to_state(&self, state: &str) -> Result<(), HostError>;
    fn run_entry_actions(&self, state: &str) -> Result<(), HostError>;
    /// Play the attached animation clip of the same name. Returns false when
    /// no animation component is attached.
    fn play_animation(&self, clip: &str) -> bool;
}

/// An entity exposing a health capability
pub trait CombatEntity: Send + Sync {
    fn path(&self) -> String;
    fn kind(&self) -> String;
    fn health(&self) -> HealthState;
    fn set_health(&self, health: HealthState);
    fn transform(&self) -> Transform;
    fn set_transform(&self, transform: Transform);
    fn physics(&self) -> Option<PhysicsState>;
    fn set_physics(&self, physics: PhysicsState) -> Result<(), HostError>;
    fn recoil(&self) -> Option<RecoilState>;
    fn set_recoil(&self, recoil: RecoilState) -> Result<(), HostError>;
    fn machines(&self) -> Vec<Arc<dyn BehaviorMachine>>;
}

/// An entity whose boolean lives in the scene-scoped flag table
pub trait FlagEntity: Send + Sync {
    fn path(&self) -> String;
    /// Write the entity's value into the table now
    fn commit(&self);
    /// Re-read the entity's value from the table
    fn refresh(&self);
}

/// Singleton controller of a multi-wave or multi-phase encounter
pub trait SequenceController: Send + Sync {
    fn path(&self) -> String;
    fn progress(&self) -> SequenceProgress;
    fn set_progress(&self, progress: SequenceProgress) -> Result<(), HostError>;
    fn machine(&self) -> Option<Arc<dyn BehaviorMachine>>;
}

/// Live-entity enumeration for the active container
pub trait World: Send + Sync {
    fn combat_entities(&self) -> Vec<Arc<dyn CombatEntity>>;
    fn flag_entities(&self) -> Vec<Arc<dyn FlagEntity>>;
    fn sequence_controllers(&self) -> Vec<Arc<dyn SequenceController>>;
}

/// The global player profile
pub trait GlobalProfile: Send + Sync {
    fn serialize(&self) -> Result<String, HostError>;
    fn populate(&self, blob: &str) -> Result<(), HostError>;
    fn resources(&self) -> AvatarResources;
    /// Bump counters that tell content systems to recompute
    fn bump_content_version(&self);
}

/// The scene-scoped persistent flag table
pub trait FlagTable: Send + Sync {
    fn serialize(&self) -> Result<String, HostError>;
    fn populate(&self, blob: &str) -> Result<(), HostError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locomotion {
    Idle,
    Fall,
}

/// The player-controlled avatar
pub trait Avatar: Send + Sync {
    fn kinematics(&self) -> AvatarKinematics;
    fn apply_kinematics(&self, kinematics: &AvatarKinematics);
    /// Stop in-flight coroutines and invulnerability timers
    fn cancel_pending_actions(&self);
    /// Detach from platforms or other transient surfaces
    fn detach_from_surface(&self);
    fn on_entered_container(&self, container: &str);
    fn set_visible(&self, visible: bool);
    fn play_locomotion(&self, locomotion: Locomotion);
}

/// A request to move into another container through a named gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub container: String,
    pub gate: String,
}

/// The container loader
pub trait ContainerLoader: Send + Sync {
    fn active_container(&self) -> Option<String>;
    /// Load a container directly, without entry gate or avatar placement
    fn load_container(&self, name: &str) -> Result<(), HostError>;
    fn begin_transition(&self, request: TransitionRequest) -> Result<(), HostError>;
    fn is_transitioning(&self) -> bool;
}

/// Where the avatar appears when entering through a gate.
///
/// Loaders are constructed with one of these and consult it for every
/// reentry-coordinate query before falling back to the container default.
pub trait SpawnPointProvider: Send + Sync {
    fn reentry_position(&self, container: &str, gate: &str) -> Option<Vec3>;
}

/// Generic "recompute from global state" notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshNotice {
    Inventory,
    Health,
    DamageValues,
}

/// Global clock, input gate and UI hooks
pub trait HostRuntime: Send + Sync {
    fn time_scale(&self) -> f32;
    fn set_time_scale(&self, scale: f32);
    fn accepting_input(&self) -> bool;
    fn set_accepting_input(&self, accepting: bool);
    fn close_menus(&self);
    fn broadcast(&self, notice: RefreshNotice);
    /// Mark the camera as in live gameplay
    fn set_camera_live(&self);
}

/// Entry point to every host collaborator
pub trait Host: Send + Sync {
    fn profile(&self) -> Option<Arc<dyn GlobalProfile>>;
    fn avatar(&self) -> Option<Arc<dyn Avatar>>;
    fn flag_table(&self) -> Arc<dyn FlagTable>;
    fn world(&self) -> Arc<dyn World>;
    fn loader(&self) -> Arc<dyn ContainerLoader>;
    fn runtime(&self) -> Arc<dyn HostRuntime>;
}
