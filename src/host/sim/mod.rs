//! In-memory host for deterministic testing and demos
//!
//! Implements every host interface without a real runtime behind it.
//! Containers are described by blueprints and rebuilt on every load,
//! persistent flags commit lazily on teardown, and the loader completes
//! loads on a background task after a short delay, consulting its
//! [`SpawnPointProvider`] for gate arrivals.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use stasis::entry::EntryOverride;
//! use stasis::host::sim::{ContainerBlueprint, SimHost};
//! use stasis::snapshot::Vec3;
//!
//! let entry = Arc::new(EntryOverride::new());
//! let host = SimHost::new(
//!     vec![ContainerBlueprint::new("Town").with_spawn(Vec3::new(4.0, 1.0, 0.0))],
//!     entry.clone(),
//! );
//! host.boot("Town").unwrap();
//! ```

mod blueprint;
mod loader;
mod objects;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use blueprint::{CombatantBlueprint, ContainerBlueprint, MachineBlueprint, SequenceBlueprint};
pub use loader::{Arrival, SimLoader, SimScene};
pub use objects::{
    AvatarView, ProfileData, RuntimeView, SimAvatar, SimCombatant, SimFlag, SimFlagTable,
    SimMachine, SimProfile, SimRuntime, SimSequence,
};

use crate::host::{
    Avatar, ContainerLoader, FlagTable, GlobalProfile, Host, HostError, HostRuntime,
    SpawnPointProvider, World,
};

/// Default time a simulated load takes
pub const DEFAULT_LOAD_DELAY: Duration = Duration::from_millis(5);

/// Neutral container every simulated host carries
pub const SIM_NEUTRAL_CONTAINER: &str = "Quit_To_Menu";

pub struct SimHost {
    profile: Arc<SimProfile>,
    avatar: Arc<SimAvatar>,
    flag_table: Arc<SimFlagTable>,
    scene: Arc<SimScene>,
    loader: Arc<SimLoader>,
    runtime: Arc<SimRuntime>,
    profile_present: AtomicBool,
    avatar_present: AtomicBool,
}

impl SimHost {
    /// Create a host over `blueprints` plus an empty neutral container
    pub fn new(blueprints: Vec<ContainerBlueprint>, spawn: Arc<dyn SpawnPointProvider>) -> Self {
        Self::with_load_delay(blueprints, spawn, DEFAULT_LOAD_DELAY)
    }

    pub fn with_load_delay(
        mut blueprints: Vec<ContainerBlueprint>,
        spawn: Arc<dyn SpawnPointProvider>,
        load_delay: Duration,
    ) -> Self {
        if !blueprints.iter().any(|b| b.name == SIM_NEUTRAL_CONTAINER) {
            blueprints.push(ContainerBlueprint::new(SIM_NEUTRAL_CONTAINER));
        }

        let profile = Arc::new(SimProfile::new(ProfileData::default()));
        let avatar = Arc::new(SimAvatar::new());
        let flag_table = Arc::new(SimFlagTable::default());
        let scene = Arc::new(SimScene::default());
        let loader = Arc::new(SimLoader::new(
            blueprints,
            scene.clone(),
            flag_table.clone(),
            avatar.clone(),
            spawn,
            load_delay,
        ));

        Self {
            profile,
            avatar,
            flag_table,
            scene,
            loader,
            runtime: Arc::new(SimRuntime::new()),
            profile_present: AtomicBool::new(true),
            avatar_present: AtomicBool::new(true),
        }
    }

    /// Enter `container` at its default spawn without any delay
    pub fn boot(&self, container: &str) -> Result<(), HostError> {
        self.loader.enter_now(container, None)?;
        self.avatar.place(self.loader.default_spawn(container));
        tracing::debug!(container, "Simulated host booted");
        Ok(())
    }

    pub fn sim_profile(&self) -> &Arc<SimProfile> {
        &self.profile
    }

    pub fn sim_avatar(&self) -> &Arc<SimAvatar> {
        &self.avatar
    }

    pub fn sim_flag_table(&self) -> &Arc<SimFlagTable> {
        &self.flag_table
    }

    pub fn scene(&self) -> &Arc<SimScene> {
        &self.scene
    }

    pub fn sim_loader(&self) -> &Arc<SimLoader> {
        &self.loader
    }

    pub fn sim_runtime(&self) -> &Arc<SimRuntime> {
        &self.runtime
    }

    /// Defeat an entity for good: gone now and on every later load
    pub fn destroy_permanently(&self, path: &str) -> bool {
        let live = self.scene.despawn(path);
        let stored = self.loader.remove_from_blueprint(path);
        live || stored
    }

    pub fn set_profile_present(&self, present: bool) {
        self.profile_present.store(present, Ordering::SeqCst);
    }

    pub fn set_avatar_present(&self, present: bool) {
        self.avatar_present.store(present, Ordering::SeqCst);
    }
}

impl Host for SimHost {
    fn profile(&self) -> Option<Arc<dyn GlobalProfile>> {
        self.profile_present
            .load(Ordering::SeqCst)
            .then(|| self.profile.clone() as Arc<dyn GlobalProfile>)
    }

    fn avatar(&self) -> Option<Arc<dyn Avatar>> {
        self.avatar_present
            .load(Ordering::SeqCst)
            .then(|| self.avatar.clone() as Arc<dyn Avatar>)
    }

    fn flag_table(&self) -> Arc<dyn FlagTable> {
        self.flag_table.clone()
    }

    fn world(&self) -> Arc<dyn World> {
        self.scene.clone()
    }

    fn loader(&self) -> Arc<dyn ContainerLoader> {
        self.loader.clone()
    }

    fn runtime(&self) -> Arc<dyn HostRuntime> {
        self.runtime.clone()
    }
}
