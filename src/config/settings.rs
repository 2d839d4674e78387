use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::fsm::StrategyRegistry;
use crate::util::paths::{config_path, states_path};

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the saved-state list is persisted
    pub storage_path: PathBuf,
    /// Restore sequencing
    pub restore: RestoreConfig,
    /// Behavior-machine restore strategies
    pub fsm: FsmConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreConfig {
    /// Content-free container global state is injected from
    pub neutral_container: String,
    /// Gate name used for the reentry-coordinate query
    pub reentry_gate: String,
    /// Pause before final avatar kinematics are applied
    pub settle_delay: Duration,
    /// How often loader state is polled while waiting
    pub poll_interval: Duration,
    /// Upper bound on each loader wait
    pub transition_timeout: Duration,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            neutral_container: "Quit_To_Menu".to_string(),
            reentry_gate: "dreamGate".to_string(),
            settle_delay: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            transition_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsmConfig {
    /// Machines restored with entry-action replay instead of a bare jump
    pub replay_entry: Vec<String>,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            replay_entry: vec!["Battle Control".to_string()],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: states_path(),
            restore: RestoreConfig::default(),
            fsm: FsmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlStorageConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlRestoreConfig {
    pub neutral_container: Option<String>,
    pub reentry_gate: Option<String>,
    pub settle_delay_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub transition_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlFsmConfig {
    pub replay_entry: Option<Vec<String>>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub storage: Option<TomlStorageConfig>,
    pub restore: Option<TomlRestoreConfig>,
    pub fsm: Option<TomlFsmConfig>,
}

impl Config {
    /// Load from the default config path, creating it on first run
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    /// Load from `path`, falling back to defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        let mut config = Config::default();
        if !path.exists() {
            return config;
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<TomlConfig>(&contents) {
                Ok(toml_config) => config.merge(toml_config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file");
            }
        }
        config
    }

    /// Parse a config document on top of the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let toml_config = toml::from_str::<TomlConfig>(contents)?;
        let mut config = Config::default();
        config.merge(toml_config);
        Ok(config)
    }

    fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(storage) = toml_config.storage {
            if let Some(path) = storage.path {
                self.storage_path = path;
            }
        }

        if let Some(restore) = toml_config.restore {
            if let Some(neutral) = restore.neutral_container {
                self.restore.neutral_container = neutral;
            }
            if let Some(gate) = restore.reentry_gate {
                self.restore.reentry_gate = gate;
            }
            if let Some(ms) = restore.settle_delay_ms {
                self.restore.settle_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = restore.poll_interval_ms {
                // A zero interval would spin the waiting task
                self.restore.poll_interval = Duration::from_millis(ms.max(1));
            }
            if let Some(ms) = restore.transition_timeout_ms {
                self.restore.transition_timeout = Duration::from_millis(ms);
            }
        }

        if let Some(fsm) = toml_config.fsm {
            if let Some(replay_entry) = fsm.replay_entry {
                self.fsm.replay_entry = replay_entry;
            }
        }
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    pub fn with_restore(mut self, restore: RestoreConfig) -> Self {
        self.restore = restore;
        self
    }

    /// Strategy registry resolved once from `fsm.replay_entry`
    pub fn strategy_registry(&self) -> StrategyRegistry {
        StrategyRegistry::with_replay_entry(self.fsm.replay_entry.iter().cloned())
    }
}
