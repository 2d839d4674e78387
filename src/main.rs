use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use stasis::host::sim::{CombatantBlueprint, ContainerBlueprint, MachineBlueprint, SimHost};
use stasis::host::{Avatar, CombatEntity, HostRuntime};
use stasis::snapshot::{AvatarKinematics, FsmValue, SequenceProgress, Vec3};
use stasis::{util, Config, EntryOverride, SaveStates, SnapshotStore};

/// Capture and restore the transient state of a simulated world
#[derive(Parser)]
#[command(name = "stasis", version)]
struct Cli {
    /// Data directory (defaults to ~/.stasis)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved states, oldest first
    List,

    /// Print one saved state as JSON
    Show {
        /// Id or name of the saved state
        selector: String,
    },

    /// Delete one saved state
    Delete {
        /// Id or name of the saved state
        selector: String,
    },

    /// Capture, disturb and restore a simulated world, then print the report
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir);

    // Initialize logging to file (~/.stasis/logs/stasis.log)
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    let config = Config::load();

    match cli.command {
        Commands::List => list(&config),
        Commands::Show { selector } => show(&config, &selector),
        Commands::Delete { selector } => delete(&config, &selector),
        Commands::Demo => demo(&config).await,
    }
}

fn list(config: &Config) -> Result<()> {
    let store = SnapshotStore::open(config.storage_path.clone());
    if store.is_empty() {
        println!("No saved states");
        return Ok(());
    }

    println!("{:<36}  {:<24}  {:<16}  CREATED", "ID", "NAME", "CONTAINER");
    for state in store.list() {
        println!(
            "{:<36}  {:<24}  {:<16}  {}",
            state.id,
            state.name,
            state.container_id,
            state.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn show(config: &Config, selector: &str) -> Result<()> {
    let store = SnapshotStore::open(config.storage_path.clone());
    let state = store
        .find(selector)
        .ok_or_else(|| anyhow!("No saved state matches '{}'", selector))?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

fn delete(config: &Config, selector: &str) -> Result<()> {
    let store = SnapshotStore::open(config.storage_path.clone());
    let state = store
        .find(selector)
        .ok_or_else(|| anyhow!("No saved state matches '{}'", selector))?;
    let removed = store.delete(state.id)?;
    println!("Deleted {} ({})", removed.name, removed.id);
    Ok(())
}

const DEMO_CONTAINER: &str = "Crossroads";
const DEMO_SPIDER: &str = "/Crossroads/Spider_1";

fn demo_world() -> Vec<ContainerBlueprint> {
    vec![ContainerBlueprint::new(DEMO_CONTAINER)
        .with_spawn(Vec3::new(4.0, 1.0, 0.0))
        .with_gate("dreamGate", Vec3::new(0.0, 1.0, 0.0))
        .with_combatant(
            CombatantBlueprint::new(DEMO_SPIDER, "Spider", 20)
                .at(Vec3::new(16.0, 1.0, 0.0))
                .with_machine(
                    MachineBlueprint::new("Spider AI", &["Idle", "Chase", "Attack"])
                        .with_var("Aggro", FsmValue::Bool(false)),
                ),
        )
        .with_flag("doorOpen", false)
        .with_sequence(
            "/Crossroads/Battle Scene",
            SequenceProgress::Waves {
                wave: 0,
                enemies_remaining: 0,
                started: false,
            },
            Some(
                MachineBlueprint::new("Battle Control", &["Idle", "Wave 1", "Wave 2"]).animated(),
            ),
        )]
}

/// Runs against a throwaway store so the real list is left alone
async fn demo(config: &Config) -> Result<()> {
    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
    let config = config
        .clone()
        .with_storage_path(scratch.path().join("savestates.json"));

    let entry = Arc::new(EntryOverride::new());
    let host = Arc::new(SimHost::new(demo_world(), entry.clone()));
    host.boot(DEMO_CONTAINER)?;
    let states = SaveStates::new(host.clone(), entry, &config);

    // Build up some state worth keeping
    let profile = host.sim_profile();
    profile.set_max_health(9);
    profile.set_health(5);
    host.sim_avatar().set_kinematics(AvatarKinematics {
        position: Vec3::new(12.5, 3.0, 0.0),
        velocity: Vec3::new(0.0, -2.0, 0.0),
        facing_right: false,
        grounded: false,
    });
    if let Some(spider) = host.scene().combatant(DEMO_SPIDER) {
        spider.damage(6);
        if let Some(ai) = spider.machine("Spider AI") {
            ai.transition("Chase")?;
            ai.set_var("Aggro", FsmValue::Bool(true));
        }
    }
    if let Some(door) = host.scene().flag("doorOpen") {
        door.set(true);
    }
    let id = states.capture(Some("checkpoint"))?;
    println!("Captured checkpoint {}", id);

    // Disturb everything
    profile.set_health(2);
    if let Some(door) = host.scene().flag("doorOpen") {
        door.set(false);
    }
    if let Some(spider) = host.scene().combatant(DEMO_SPIDER) {
        spider.damage(10);
    }
    host.sim_runtime().set_time_scale(0.3);

    let report = states.load_named("checkpoint").await?;
    println!("{}", report);

    let health = profile.data();
    let door = host.scene().flag("doorOpen").map(|d| d.value());
    let spider = host
        .scene()
        .combatant(DEMO_SPIDER)
        .map(|s| s.health().health);
    println!(
        "After restore: health {}/{}  doorOpen {:?}  spider health {:?}  avatar at {}  clock {}  input {}",
        health.health,
        health.max_health,
        door,
        spider,
        host.sim_avatar().kinematics().position,
        host.sim_runtime().time_scale(),
        host.sim_runtime().accepting_input()
    );
    Ok(())
}
