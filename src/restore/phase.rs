use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::host::HostError;

/// States of one restore session, strictly in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Suspend,
    UnloadTransient,
    LoadNeutralContainer,
    InjectGlobalState,
    BeginTargetTransition,
    WaitTransitionComplete,
    PostTransitionFixups,
    RestorePersistentFlags,
    RestoreEntities,
    RestoreSequenceControllers,
    ApplyAvatarKinematics,
    Resume,
    Terminal,
}

impl Phase {
    /// Phases with a body, in execution order
    pub const SEQUENCE: [Phase; 12] = [
        Phase::Suspend,
        Phase::UnloadTransient,
        Phase::LoadNeutralContainer,
        Phase::InjectGlobalState,
        Phase::BeginTargetTransition,
        Phase::WaitTransitionComplete,
        Phase::PostTransitionFixups,
        Phase::RestorePersistentFlags,
        Phase::RestoreEntities,
        Phase::RestoreSequenceControllers,
        Phase::ApplyAvatarKinematics,
        Phase::Resume,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Suspend => "Suspend",
            Phase::UnloadTransient => "UnloadTransient",
            Phase::LoadNeutralContainer => "LoadNeutralContainer",
            Phase::InjectGlobalState => "InjectGlobalState",
            Phase::BeginTargetTransition => "BeginTargetTransition",
            Phase::WaitTransitionComplete => "WaitTransitionComplete",
            Phase::PostTransitionFixups => "PostTransitionFixups",
            Phase::RestorePersistentFlags => "RestorePersistentFlags",
            Phase::RestoreEntities => "RestoreEntities",
            Phase::RestoreSequenceControllers => "RestoreSequenceControllers",
            Phase::ApplyAvatarKinematics => "ApplyAvatarKinematics",
            Phase::Resume => "Resume",
            Phase::Terminal => "Terminal",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Failure inside one phase body. Logged and recorded, never propagated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhaseError {
    #[error("Host error: {0}")]
    Host(#[from] HostError),
    #[error("Timed out after {waited:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: String,
        waited: Duration,
    },
    #[error("Expected container {expected} to be active, found {active:?}")]
    WrongContainer {
        expected: String,
        active: Option<String>,
    },
    #[error("Required host object unavailable: {0}")]
    Unavailable(&'static str),
    #[error("{failed} of {total} records failed to restore")]
    Partial { failed: usize, total: usize },
    #[error("Phase panicked: {0}")]
    Panicked(String),
}
