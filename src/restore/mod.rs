//! Restore orchestration
//!
//! A restore tears the live world down to a neutral container, injects the
//! captured global state there, transitions back into the captured
//! container and then re-applies every captured record. Each phase is
//! isolated: a failure is logged and recorded and the next phase runs, so
//! the host always ends up unfrozen and accepting input.

mod apply;
mod phase;
mod report;
mod session;

use thiserror::Error;

pub use apply::{restore_entity, restore_sequence};
pub use phase::{Phase, PhaseError};
pub use report::{PhaseOutcome, PhaseRecord, RestoreReport};
pub use session::{RestoreOrchestrator, RestoreSession};

/// Reasons a restore never started
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    #[error("A restore is already in progress")]
    Busy,
    #[error("Saved state not found: {0}")]
    NotFound(String),
    #[error("Restore task failed: {0}")]
    Aborted(String),
}
