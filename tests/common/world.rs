//! Simulated world fixture
//!
//! One room with two spiders, a totem without physics, two persistent
//! flags and a wave encounter. Restore timings are shortened so a full
//! session finishes in a few milliseconds.

use std::sync::Arc;
use std::time::Duration;

use stasis::config::RestoreConfig;
use stasis::host::sim::{CombatantBlueprint, ContainerBlueprint, MachineBlueprint, SimHost};
use stasis::snapshot::{FsmValue, SequenceProgress, Vec3};
use stasis::{Config, EntryOverride, SaveStates};
use tempfile::TempDir;

pub const ROOM: &str = "Room";
pub const SPIDER_1: &str = "/Room/Spider_1";
pub const SPIDER_2: &str = "/Room/Spider_2";
pub const TOTEM: &str = "/Room/Totem";
pub const BATTLE_SCENE: &str = "/Room/Battle Scene";

pub fn room() -> ContainerBlueprint {
    let spider = |path: &str, x: f32| {
        CombatantBlueprint::new(path, "Spider", 20)
            .at(Vec3::new(x, 1.0, 0.0))
            .with_machine(
                MachineBlueprint::new("Spider AI", &["Idle", "Chase", "Attack"])
                    .with_var("Aggro", FsmValue::Bool(false))
                    .with_var("Target", FsmValue::Vector3(Vec3::ZERO)),
            )
    };

    ContainerBlueprint::new(ROOM)
        .with_spawn(Vec3::new(3.0, 1.0, 0.0))
        .with_gate("dreamGate", Vec3::new(0.0, 1.0, 0.0))
        .with_combatant(spider(SPIDER_1, 8.0))
        .with_combatant(spider(SPIDER_2, 12.0))
        .with_combatant(
            CombatantBlueprint::new(TOTEM, "Totem", 5)
                .at(Vec3::new(20.0, 0.0, 0.0))
                .without_physics()
                .without_recoil(),
        )
        .with_flag("doorOpen", false)
        .with_flag("leverPulled", false)
        .with_sequence(
            BATTLE_SCENE,
            SequenceProgress::Waves {
                wave: 0,
                enemies_remaining: 0,
                started: false,
            },
            Some(
                MachineBlueprint::new("Battle Control", &["Idle", "Wave 1", "Wave 2", "Done"])
                    .with_var("Enemies", FsmValue::Int(0))
                    .animated(),
            ),
        )
}

pub fn fast_restore() -> RestoreConfig {
    RestoreConfig {
        settle_delay: Duration::from_millis(1),
        poll_interval: Duration::from_millis(1),
        transition_timeout: Duration::from_secs(2),
        ..RestoreConfig::default()
    }
}

/// A booted host plus an engine persisting into a temporary directory
pub struct TestWorld {
    pub host: Arc<SimHost>,
    pub entry: Arc<EntryOverride>,
    pub states: SaveStates,
    pub dir: TempDir,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    pub fn with_config(adjust: impl FnOnce(Config) -> Config) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = adjust(
            Config::default()
                .with_storage_path(dir.path().join("savestates.json"))
                .with_restore(fast_restore()),
        );

        let entry = Arc::new(EntryOverride::new());
        let host = Arc::new(SimHost::with_load_delay(
            vec![room()],
            entry.clone(),
            Duration::from_millis(2),
        ));
        host.boot(ROOM).expect("Failed to boot room");

        let states = SaveStates::new(host.clone(), entry.clone(), &config);
        Self {
            host,
            entry,
            states,
            dir,
        }
    }
}
