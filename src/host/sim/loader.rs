//! Simulated container loader and live scene

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::host::{
    CombatEntity, ContainerLoader, FlagEntity, HostError, SequenceController, SpawnPointProvider,
    TransitionRequest, World,
};
use crate::snapshot::Vec3;

use super::blueprint::ContainerBlueprint;
use super::objects::{SimAvatar, SimCombatant, SimFlag, SimFlagTable, SimSequence};

#[derive(Default)]
struct SceneInstance {
    container: Option<String>,
    combatants: Vec<Arc<SimCombatant>>,
    flags: Vec<Arc<SimFlag>>,
    sequence: Option<Arc<SimSequence>>,
}

/// Live entities of the active container
#[derive(Default)]
pub struct SimScene {
    inner: Mutex<SceneInstance>,
}

impl SimScene {
    pub fn container(&self) -> Option<String> {
        self.inner.lock().container.clone()
    }

    pub fn combatant(&self, path: &str) -> Option<Arc<SimCombatant>> {
        self.inner
            .lock()
            .combatants
            .iter()
            .find(|c| c.path() == path)
            .cloned()
    }

    pub fn flag(&self, id: &str) -> Option<Arc<SimFlag>> {
        self.inner
            .lock()
            .flags
            .iter()
            .find(|f| f.id() == id)
            .cloned()
    }

    pub fn sequence(&self) -> Option<Arc<SimSequence>> {
        self.inner.lock().sequence.clone()
    }

    /// Remove a live entity until the container is loaded again
    pub fn despawn(&self, path: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.combatants.len();
        inner.combatants.retain(|c| c.path() != path);
        inner.combatants.len() != before
    }

    /// Commit every flag and drop the live entities
    fn teardown(&self) {
        let mut inner = self.inner.lock();
        for flag in &inner.flags {
            flag.commit();
        }
        *inner = SceneInstance::default();
    }

    fn install(&self, blueprint: &ContainerBlueprint, table: &Arc<SimFlagTable>) {
        let instance = SceneInstance {
            container: Some(blueprint.name.clone()),
            combatants: blueprint
                .combatants
                .iter()
                .map(|c| Arc::new(SimCombatant::from_blueprint(c)))
                .collect(),
            flags: blueprint
                .flags
                .iter()
                .map(|(id, default)| {
                    Arc::new(SimFlag::spawn(&blueprint.name, id, *default, table.clone()))
                })
                .collect(),
            sequence: blueprint
                .sequence
                .as_ref()
                .map(|s| Arc::new(SimSequence::from_blueprint(s))),
        };
        *self.inner.lock() = instance;
    }
}

impl World for SimScene {
    fn combat_entities(&self) -> Vec<Arc<dyn CombatEntity>> {
        self.inner
            .lock()
            .combatants
            .iter()
            .map(|c| c.clone() as Arc<dyn CombatEntity>)
            .collect()
    }

    fn flag_entities(&self) -> Vec<Arc<dyn FlagEntity>> {
        self.inner
            .lock()
            .flags
            .iter()
            .map(|f| f.clone() as Arc<dyn FlagEntity>)
            .collect()
    }

    fn sequence_controllers(&self) -> Vec<Arc<dyn SequenceController>> {
        self.inner
            .lock()
            .sequence
            .iter()
            .map(|s| s.clone() as Arc<dyn SequenceController>)
            .collect()
    }
}

/// One completed load, in order of completion
#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub container: String,
    pub gate: Option<String>,
    /// Where the avatar was placed; `None` for direct loads
    pub position: Option<Vec3>,
}

struct LoaderShared {
    blueprints: Mutex<BTreeMap<String, ContainerBlueprint>>,
    scene: Arc<SimScene>,
    flag_table: Arc<SimFlagTable>,
    avatar: Arc<SimAvatar>,
    spawn: Arc<dyn SpawnPointProvider>,
    transitioning: AtomicBool,
    arrivals: Mutex<Vec<Arrival>>,
}

impl LoaderShared {
    fn arrive(&self, container: &str, gate: Option<&str>) {
        let blueprint = self.blueprints.lock().get(container).cloned();
        let Some(blueprint) = blueprint else {
            tracing::warn!(container, "Blueprint vanished during load");
            self.transitioning.store(false, Ordering::SeqCst);
            return;
        };

        self.scene.teardown();
        self.scene.install(&blueprint, &self.flag_table);

        let position = gate.map(|gate| {
            let position = self
                .spawn
                .reentry_position(container, gate)
                .unwrap_or_else(|| blueprint.spawn_for(Some(gate)));
            self.avatar.place(position);
            position
        });

        self.arrivals.lock().push(Arrival {
            container: container.to_string(),
            gate: gate.map(str::to_string),
            position,
        });
        self.transitioning.store(false, Ordering::SeqCst);
        tracing::debug!(container, ?gate, "Simulated container loaded");
    }
}

/// Loader that completes loads asynchronously after a fixed delay
pub struct SimLoader {
    shared: Arc<LoaderShared>,
    load_delay: Duration,
}

impl SimLoader {
    pub(super) fn new(
        blueprints: Vec<ContainerBlueprint>,
        scene: Arc<SimScene>,
        flag_table: Arc<SimFlagTable>,
        avatar: Arc<SimAvatar>,
        spawn: Arc<dyn SpawnPointProvider>,
        load_delay: Duration,
    ) -> Self {
        let blueprints = blueprints
            .into_iter()
            .map(|b| (b.name.clone(), b))
            .collect();
        Self {
            shared: Arc::new(LoaderShared {
                blueprints: Mutex::new(blueprints),
                scene,
                flag_table,
                avatar,
                spawn,
                transitioning: AtomicBool::new(false),
                arrivals: Mutex::new(Vec::new()),
            }),
            load_delay,
        }
    }

    pub fn arrivals(&self) -> Vec<Arrival> {
        self.shared.arrivals.lock().clone()
    }

    pub fn default_spawn(&self, container: &str) -> Vec3 {
        self.shared
            .blueprints
            .lock()
            .get(container)
            .map(|b| b.default_spawn)
            .unwrap_or(Vec3::ZERO)
    }

    /// Drop an entity from its container's blueprint so it never respawns
    pub fn remove_from_blueprint(&self, path: &str) -> bool {
        let mut blueprints = self.shared.blueprints.lock();
        let mut removed = false;
        for blueprint in blueprints.values_mut() {
            let before = blueprint.combatants.len();
            blueprint.combatants.retain(|c| c.path != path);
            removed |= blueprint.combatants.len() != before;
        }
        removed
    }

    /// Enter a container immediately, bypassing the load delay
    pub fn enter_now(&self, container: &str, gate: Option<&str>) -> Result<(), HostError> {
        self.claim(container)?;
        self.shared.arrive(container, gate);
        Ok(())
    }

    fn claim(&self, container: &str) -> Result<(), HostError> {
        if !self.shared.blueprints.lock().contains_key(container) {
            return Err(HostError::UnknownContainer(container.to_string()));
        }
        if self.shared.transitioning.swap(true, Ordering::SeqCst) {
            return Err(HostError::TransitionInProgress);
        }
        Ok(())
    }

    fn start(&self, container: &str, gate: Option<String>) -> Result<(), HostError> {
        self.claim(container)?;

        let shared = self.shared.clone();
        let container = container.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let delay = self.load_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    shared.arrive(&container, gate.as_deref());
                });
            }
            Err(_) => shared.arrive(&container, gate.as_deref()),
        }
        Ok(())
    }
}

impl ContainerLoader for SimLoader {
    fn active_container(&self) -> Option<String> {
        self.shared.scene.container()
    }

    fn load_container(&self, name: &str) -> Result<(), HostError> {
        self.start(name, None)
    }

    fn begin_transition(&self, request: TransitionRequest) -> Result<(), HostError> {
        self.start(&request.container, Some(request.gate))
    }

    fn is_transitioning(&self) -> bool {
        self.shared.transitioning.load(Ordering::SeqCst)
    }
}
