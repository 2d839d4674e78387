pub mod capture;
pub mod config;
pub mod engine;
pub mod entry;
pub mod flags;
pub mod fsm;
pub mod host;
pub mod resolve;
pub mod restore;
pub mod snapshot;
pub mod util;

pub use capture::CaptureError;
pub use config::Config;
pub use engine::SaveStates;
pub use entry::EntryOverride;
pub use fsm::{FsmRestoreStrategy, StrategyRegistry};
pub use host::{Host, HostError};
pub use resolve::{EntityResolver, ResolveMiss};
pub use restore::{Phase, PhaseError, RestoreError, RestoreReport};
pub use snapshot::{Snapshot, SnapshotId, SnapshotStore, StatesChanged, StoreError};
