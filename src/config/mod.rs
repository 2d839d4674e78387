mod settings;

pub use settings::{Config, FsmConfig, RestoreConfig, EXAMPLE_CONFIG};
