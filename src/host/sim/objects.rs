//! In-memory host objects

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::host::{
    Avatar, BehaviorMachine, CombatEntity, FlagEntity, FlagTable, GlobalProfile, HostError,
    HostRuntime, Locomotion, RefreshNotice, SequenceController,
};
use crate::snapshot::{
    AvatarKinematics, AvatarResources, FsmValue, HealthState, PhysicsState, RecoilState,
    SequenceProgress, Transform, Vec3,
};

use super::blueprint::{CombatantBlueprint, MachineBlueprint, SequenceBlueprint};

/// Serialized form of the simulated profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileData {
    pub health: i32,
    pub max_health: i32,
    pub secondary: i32,
    pub currency: i32,
    #[serde(default)]
    pub unlocked: Vec<String>,
}

impl Default for ProfileData {
    fn default() -> Self {
        Self {
            health: 5,
            max_health: 5,
            secondary: 0,
            currency: 0,
            unlocked: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SimProfile {
    data: Mutex<ProfileData>,
    content_version: Mutex<u32>,
}

impl SimProfile {
    pub fn new(data: ProfileData) -> Self {
        Self {
            data: Mutex::new(data),
            content_version: Mutex::new(0),
        }
    }

    pub fn data(&self) -> ProfileData {
        self.data.lock().clone()
    }

    pub fn set_health(&self, health: i32) {
        self.data.lock().health = health;
    }

    pub fn set_max_health(&self, max_health: i32) {
        self.data.lock().max_health = max_health;
    }

    pub fn set_currency(&self, currency: i32) {
        self.data.lock().currency = currency;
    }

    pub fn content_version(&self) -> u32 {
        *self.content_version.lock()
    }
}

impl GlobalProfile for SimProfile {
    fn serialize(&self) -> Result<String, HostError> {
        serde_json::to_string(&*self.data.lock()).map_err(|e| HostError::Serialize {
            what: "profile",
            message: e.to_string(),
        })
    }

    fn populate(&self, blob: &str) -> Result<(), HostError> {
        let data: ProfileData = serde_json::from_str(blob).map_err(|e| HostError::Populate {
            what: "profile",
            message: e.to_string(),
        })?;
        *self.data.lock() = data;
        Ok(())
    }

    fn resources(&self) -> AvatarResources {
        let data = self.data.lock();
        AvatarResources {
            health: data.health,
            max_health: data.max_health,
            secondary: data.secondary,
            currency: data.currency,
        }
    }

    fn bump_content_version(&self) {
        *self.content_version.lock() += 1;
    }
}

/// Scene-scoped flag table keyed by `container/id`
#[derive(Debug, Default)]
pub struct SimFlagTable {
    flags: Mutex<BTreeMap<String, bool>>,
}

impl SimFlagTable {
    pub fn key(container: &str, id: &str) -> String {
        format!("{}/{}", container, id)
    }

    pub fn get(&self, container: &str, id: &str) -> Option<bool> {
        self.flags.lock().get(&Self::key(container, id)).copied()
    }

    pub fn set(&self, container: &str, id: &str, value: bool) {
        self.flags.lock().insert(Self::key(container, id), value);
    }
}

impl FlagTable for SimFlagTable {
    fn serialize(&self) -> Result<String, HostError> {
        serde_json::to_string(&*self.flags.lock()).map_err(|e| HostError::Serialize {
            what: "flag table",
            message: e.to_string(),
        })
    }

    fn populate(&self, blob: &str) -> Result<(), HostError> {
        let flags: BTreeMap<String, bool> =
            serde_json::from_str(blob).map_err(|e| HostError::Populate {
                what: "flag table",
                message: e.to_string(),
            })?;
        *self.flags.lock() = flags;
        Ok(())
    }
}

/// A lazily committed persistent flag
pub struct SimFlag {
    container: String,
    id: String,
    value: Mutex<bool>,
    table: Arc<SimFlagTable>,
}

impl SimFlag {
    /// Instantiate, reading the table the way a freshly loaded entity does
    pub fn spawn(container: &str, id: &str, default: bool, table: Arc<SimFlagTable>) -> Self {
        let value = table.get(container, id).unwrap_or(default);
        Self {
            container: container.to_string(),
            id: id.to_string(),
            value: Mutex::new(value),
            table,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value(&self) -> bool {
        *self.value.lock()
    }

    /// Change the live value; the table only sees it on commit
    pub fn set(&self, value: bool) {
        *self.value.lock() = value;
    }
}

impl FlagEntity for SimFlag {
    fn path(&self) -> String {
        format!("/{}/{}", self.container, self.id)
    }

    fn commit(&self) {
        let value = *self.value.lock();
        self.table.set(&self.container, &self.id, value);
    }

    fn refresh(&self) {
        if let Some(value) = self.table.get(&self.container, &self.id) {
            *self.value.lock() = value;
        }
    }
}

#[derive(Debug)]
struct MachineInner {
    active: String,
    variables: BTreeMap<String, FsmValue>,
    entry_log: Vec<String>,
    animation: Option<String>,
}

pub struct SimMachine {
    name: String,
    states: Vec<String>,
    animated: bool,
    inner: Mutex<MachineInner>,
}

impl SimMachine {
    pub fn from_blueprint(blueprint: &MachineBlueprint) -> Self {
        Self {
            name: blueprint.name.clone(),
            states: blueprint.states.clone(),
            animated: blueprint.animated,
            inner: Mutex::new(MachineInner {
                active: blueprint.initial.clone(),
                variables: blueprint.variables.clone(),
                entry_log: Vec::new(),
                animation: None,
            }),
        }
    }

    /// Normal event-driven transition: runs entry actions and animates
    pub fn transition(&self, state: &str) -> Result<(), HostError> {
        self.check_state(state)?;
        let mut inner = self.inner.lock();
        inner.active = state.to_string();
        inner.entry_log.push(state.to_string());
        if self.animated {
            inner.animation = Some(state.to_string());
        }
        Ok(())
    }

    pub fn set_var(&self, name: &str, value: FsmValue) {
        self.inner.lock().variables.insert(name.to_string(), value);
    }

    pub fn var(&self, name: &str) -> Option<FsmValue> {
        self.inner.lock().variables.get(name).cloned()
    }

    /// States whose entry actions ran, in order
    pub fn entry_log(&self) -> Vec<String> {
        self.inner.lock().entry_log.clone()
    }

    pub fn animation(&self) -> Option<String> {
        self.inner.lock().animation.clone()
    }

    fn check_state(&self, state: &str) -> Result<(), HostError> {
        if self.states.iter().any(|s| s == state) {
            Ok(())
        } else {
            Err(HostError::UnknownState {
                machine: self.name.clone(),
                state: state.to_string(),
            })
        }
    }
}

impl BehaviorMachine for SimMachine {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn active_state(&self) -> String {
        self.inner.lock().active.clone()
    }

    fn variables(&self) -> BTreeMap<String, FsmValue> {
        self.inner.lock().variables.clone()
    }

    fn set_variable(&self, name: &str, value: &FsmValue) -> bool {
        let mut inner = self.inner.lock();
        match inner.variables.get_mut(name) {
            Some(existing) if existing.same_type(value) => {
                *existing = value.clone();
                true
            }
            _ => false,
        }
    }

    fn jump_to_state(&self, state: &str) -> Result<(), HostError> {
        self.check_state(state)?;
        self.inner.lock().active = state.to_string();
        Ok(())
    }

    fn run_entry_actions(&self, state: &str) -> Result<(), HostError> {
        self.check_state(state)?;
        self.inner.lock().entry_log.push(state.to_string());
        Ok(())
    }

    fn play_animation(&self, clip: &str) -> bool {
        if !self.animated {
            return false;
        }
        self.inner.lock().animation = Some(clip.to_string());
        true
    }
}

#[derive(Debug, Clone)]
struct CombatantInner {
    health: HealthState,
    transform: Transform,
    physics: Option<PhysicsState>,
    recoil: Option<RecoilState>,
}

/// A health-bearing entity
pub struct SimCombatant {
    path: String,
    kind: String,
    inner: Mutex<CombatantInner>,
    machines: Vec<Arc<SimMachine>>,
}

impl SimCombatant {
    pub fn from_blueprint(blueprint: &CombatantBlueprint) -> Self {
        Self {
            path: blueprint.path.clone(),
            kind: blueprint.kind.clone(),
            inner: Mutex::new(CombatantInner {
                health: HealthState {
                    health: blueprint.health,
                    is_defeated: false,
                    invincible: false,
                },
                transform: Transform::at(blueprint.position),
                physics: blueprint.physics.then(PhysicsState::default),
                recoil: blueprint.recoil.then(RecoilState::default),
            }),
            machines: blueprint
                .machines
                .iter()
                .map(|m| Arc::new(SimMachine::from_blueprint(m)))
                .collect(),
        }
    }

    /// Apply a hit, defeating the entity at zero health
    pub fn damage(&self, amount: i32) {
        let mut inner = self.inner.lock();
        if inner.health.invincible {
            return;
        }
        inner.health.health = (inner.health.health - amount).max(0);
        inner.health.is_defeated = inner.health.health == 0;
        if let Some(recoil) = inner.recoil.as_mut() {
            recoil.is_recoiling = true;
            recoil.time_remaining = 0.25;
        }
    }

    pub fn move_to(&self, position: Vec3, velocity: Vec3) {
        let mut inner = self.inner.lock();
        inner.transform.position = position;
        if let Some(physics) = inner.physics.as_mut() {
            physics.velocity = velocity;
        }
    }

    pub fn machine(&self, name: &str) -> Option<Arc<SimMachine>> {
        self.machines.iter().find(|m| m.name == name).cloned()
    }
}

impl CombatEntity for SimCombatant {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn kind(&self) -> String {
        self.kind.clone()
    }

    fn health(&self) -> HealthState {
        self.inner.lock().health
    }

    fn set_health(&self, health: HealthState) {
        self.inner.lock().health = health;
    }

    fn transform(&self) -> Transform {
        self.inner.lock().transform
    }

    fn set_transform(&self, transform: Transform) {
        self.inner.lock().transform = transform;
    }

    fn physics(&self) -> Option<PhysicsState> {
        self.inner.lock().physics
    }

    fn set_physics(&self, physics: PhysicsState) -> Result<(), HostError> {
        let mut inner = self.inner.lock();
        match inner.physics.as_mut() {
            Some(current) => {
                *current = physics;
                Ok(())
            }
            None => Err(HostError::MissingComponent {
                path: self.path.clone(),
                component: "physics body",
            }),
        }
    }

    fn recoil(&self) -> Option<RecoilState> {
        self.inner.lock().recoil
    }

    fn set_recoil(&self, recoil: RecoilState) -> Result<(), HostError> {
        let mut inner = self.inner.lock();
        match inner.recoil.as_mut() {
            Some(current) => {
                *current = recoil;
                Ok(())
            }
            None => Err(HostError::MissingComponent {
                path: self.path.clone(),
                component: "recoil",
            }),
        }
    }

    fn machines(&self) -> Vec<Arc<dyn BehaviorMachine>> {
        self.machines
            .iter()
            .map(|m| m.clone() as Arc<dyn BehaviorMachine>)
            .collect()
    }
}

/// An encounter controller
pub struct SimSequence {
    path: String,
    progress: Mutex<SequenceProgress>,
    machine: Option<Arc<SimMachine>>,
}

impl SimSequence {
    pub fn from_blueprint(blueprint: &SequenceBlueprint) -> Self {
        Self {
            path: blueprint.path.clone(),
            progress: Mutex::new(blueprint.progress),
            machine: blueprint
                .machine
                .as_ref()
                .map(|m| Arc::new(SimMachine::from_blueprint(m))),
        }
    }

    pub fn advance(&self, progress: SequenceProgress) {
        *self.progress.lock() = progress;
    }

    pub fn sim_machine(&self) -> Option<Arc<SimMachine>> {
        self.machine.clone()
    }
}

impl SequenceController for SimSequence {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn progress(&self) -> SequenceProgress {
        *self.progress.lock()
    }

    fn set_progress(&self, progress: SequenceProgress) -> Result<(), HostError> {
        let mut current = self.progress.lock();
        if current.kind() != progress.kind() {
            return Err(HostError::Populate {
                what: "sequence progress",
                message: format!(
                    "controller is {} but record is {}",
                    current.kind(),
                    progress.kind()
                ),
            });
        }
        *current = progress;
        Ok(())
    }

    fn machine(&self) -> Option<Arc<dyn BehaviorMachine>> {
        self.machine
            .as_ref()
            .map(|m| m.clone() as Arc<dyn BehaviorMachine>)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AvatarView {
    pub kinematics: AvatarKinematics,
    pub visible: bool,
    pub locomotion: Option<Locomotion>,
    pub attached_surface: Option<String>,
    pub pending_actions: u32,
    pub entered: Vec<String>,
}

pub struct SimAvatar {
    inner: Mutex<AvatarView>,
}

impl SimAvatar {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(AvatarView {
                visible: true,
                kinematics: AvatarKinematics {
                    grounded: true,
                    facing_right: true,
                    ..AvatarKinematics::default()
                },
                ..AvatarView::default()
            }),
        }
    }

    pub fn view(&self) -> AvatarView {
        self.inner.lock().clone()
    }

    pub fn set_kinematics(&self, kinematics: AvatarKinematics) {
        self.inner.lock().kinematics = kinematics;
    }

    /// Start a coroutine-like action that a restore must cancel
    pub fn start_action(&self) {
        self.inner.lock().pending_actions += 1;
    }

    pub fn attach_to(&self, surface: &str) {
        self.inner.lock().attached_surface = Some(surface.to_string());
    }

    /// Placement done by the loader on arrival
    pub(super) fn place(&self, position: Vec3) {
        let mut inner = self.inner.lock();
        inner.kinematics.position = position;
        inner.kinematics.velocity = Vec3::ZERO;
        inner.kinematics.grounded = true;
    }
}

impl Default for SimAvatar {
    fn default() -> Self {
        Self::new()
    }
}

impl Avatar for SimAvatar {
    fn kinematics(&self) -> AvatarKinematics {
        self.inner.lock().kinematics
    }

    fn apply_kinematics(&self, kinematics: &AvatarKinematics) {
        self.inner.lock().kinematics = *kinematics;
    }

    fn cancel_pending_actions(&self) {
        self.inner.lock().pending_actions = 0;
    }

    fn detach_from_surface(&self) {
        self.inner.lock().attached_surface = None;
    }

    fn on_entered_container(&self, container: &str) {
        self.inner.lock().entered.push(container.to_string());
    }

    fn set_visible(&self, visible: bool) {
        self.inner.lock().visible = visible;
    }

    fn play_locomotion(&self, locomotion: Locomotion) {
        self.inner.lock().locomotion = Some(locomotion);
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeView {
    pub time_scale: f32,
    pub accepting_input: bool,
    pub camera_live: bool,
    pub menus_open: u32,
    pub notices: Vec<RefreshNotice>,
}

pub struct SimRuntime {
    inner: Mutex<RuntimeView>,
}

impl SimRuntime {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RuntimeView {
                time_scale: 1.0,
                accepting_input: true,
                camera_live: true,
                menus_open: 0,
                notices: Vec::new(),
            }),
        }
    }

    pub fn view(&self) -> RuntimeView {
        self.inner.lock().clone()
    }

    pub fn open_menu(&self) {
        self.inner.lock().menus_open += 1;
    }

    pub fn set_camera_idle(&self) {
        self.inner.lock().camera_live = false;
    }
}

impl Default for SimRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for SimRuntime {
    fn time_scale(&self) -> f32 {
        self.inner.lock().time_scale
    }

    fn set_time_scale(&self, scale: f32) {
        self.inner.lock().time_scale = scale;
    }

    fn accepting_input(&self) -> bool {
        self.inner.lock().accepting_input
    }

    fn set_accepting_input(&self, accepting: bool) {
        self.inner.lock().accepting_input = accepting;
    }

    fn close_menus(&self) {
        self.inner.lock().menus_open = 0;
    }

    fn broadcast(&self, notice: RefreshNotice) {
        self.inner.lock().notices.push(notice);
    }

    fn set_camera_live(&self) {
        self.inner.lock().camera_live = true;
    }
}
