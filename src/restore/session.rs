//! The restore state machine

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout, Instant};

use crate::config::RestoreConfig;
use crate::entry::EntryOverride;
use crate::flags;
use crate::fsm::StrategyRegistry;
use crate::host::{
    Avatar, CapabilityKind, GlobalProfile, Host, Locomotion, RefreshNotice, TransitionRequest,
};
use crate::resolve::EntityResolver;
use crate::snapshot::Snapshot;

use super::apply::{restore_entity, restore_sequence};
use super::phase::{Phase, PhaseError};
use super::report::{PhaseOutcome, PhaseRecord, RestoreReport};
use super::RestoreError;

/// Starts restore sessions, at most one at a time
pub struct RestoreOrchestrator {
    host: Arc<dyn Host>,
    entry: Arc<EntryOverride>,
    config: RestoreConfig,
    strategies: Arc<StrategyRegistry>,
    in_flight: Arc<Semaphore>,
}

impl RestoreOrchestrator {
    pub fn new(
        host: Arc<dyn Host>,
        entry: Arc<EntryOverride>,
        config: RestoreConfig,
        strategies: StrategyRegistry,
    ) -> Self {
        Self {
            host,
            entry,
            config,
            strategies: Arc::new(strategies),
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.available_permits() == 0
    }

    /// Claim the single session slot for `snapshot`.
    ///
    /// Rejected with [`RestoreError::Busy`] while another session exists.
    pub fn begin(&self, snapshot: Snapshot) -> Result<RestoreSession, RestoreError> {
        let permit = self
            .in_flight
            .clone()
            .try_acquire_owned()
            .map_err(|_| RestoreError::Busy)?;

        Ok(RestoreSession {
            report: RestoreReport::new(snapshot.id, &snapshot.name, &snapshot.container_id),
            host: self.host.clone(),
            entry: self.entry.clone(),
            config: self.config.clone(),
            strategies: self.strategies.clone(),
            snapshot,
            phase: Phase::Idle,
            permit: Some(permit),
        })
    }
}

/// One run from `Idle` to `Terminal`.
///
/// Holding a session means holding the orchestrator's only slot; the slot
/// is released during `Resume`.
pub struct RestoreSession {
    host: Arc<dyn Host>,
    entry: Arc<EntryOverride>,
    config: RestoreConfig,
    strategies: Arc<StrategyRegistry>,
    snapshot: Snapshot,
    phase: Phase,
    report: RestoreReport,
    permit: Option<OwnedSemaphorePermit>,
}

impl RestoreSession {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run every phase in order. Never cancelled and never aborted early:
    /// a failing phase is logged and the next one runs.
    pub async fn run(mut self) -> RestoreReport {
        tracing::info!(
            snapshot = %self.snapshot.id,
            name = %self.snapshot.name,
            container = %self.snapshot.container_id,
            "Restore session started"
        );

        for phase in Phase::SEQUENCE {
            self.step(phase).await;
        }

        self.phase = Phase::Terminal;
        self.report.final_phase = Phase::Terminal;
        let failures = self.report.failures().count();
        tracing::info!(
            snapshot = %self.snapshot.id,
            failures,
            misses = self.report.resolve_misses.len(),
            "Restore session finished"
        );
        self.report
    }

    async fn step(&mut self, phase: Phase) {
        self.phase = phase;
        tracing::debug!(phase = %phase, "Entering restore phase");

        let result = AssertUnwindSafe(self.run_phase(phase))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PhaseError::Panicked(panic_message(&*panic))));

        // Released only after the host is interactive again
        if phase == Phase::Resume {
            drop(self.permit.take());
        }

        let outcome = match result {
            Ok(()) => PhaseOutcome::Completed,
            Err(e) => {
                tracing::warn!(phase = %phase, error = %e, "PhaseFailure: continuing restore");
                PhaseOutcome::Failed(e.to_string())
            }
        };
        self.report.phases.push(PhaseRecord { phase, outcome });
    }

    async fn run_phase(&mut self, phase: Phase) -> Result<(), PhaseError> {
        match phase {
            Phase::Suspend => self.suspend(),
            Phase::UnloadTransient => self.unload_transient(),
            Phase::LoadNeutralContainer => self.load_neutral_container().await,
            Phase::InjectGlobalState => self.inject_global_state(),
            Phase::BeginTargetTransition => self.begin_target_transition().await,
            Phase::WaitTransitionComplete => {
                let target = self.snapshot.container_id.clone();
                self.wait_for_container(&target).await
            }
            Phase::PostTransitionFixups => self.post_transition_fixups(),
            Phase::RestorePersistentFlags => {
                self.report.flags_refreshed = flags::apply_from_table(&*self.host.world());
                Ok(())
            }
            Phase::RestoreEntities => self.restore_entities(),
            Phase::RestoreSequenceControllers => self.restore_sequences(),
            Phase::ApplyAvatarKinematics => self.apply_avatar_kinematics().await,
            Phase::Resume => self.resume(),
            Phase::Idle | Phase::Terminal => Ok(()),
        }
    }

    fn avatar(&self) -> Result<Arc<dyn Avatar>, PhaseError> {
        self.host.avatar().ok_or(PhaseError::Unavailable("avatar"))
    }

    fn profile(&self) -> Result<Arc<dyn GlobalProfile>, PhaseError> {
        self.host
            .profile()
            .ok_or(PhaseError::Unavailable("global profile"))
    }

    fn suspend(&self) -> Result<(), PhaseError> {
        let runtime = self.host.runtime();
        runtime.set_time_scale(0.0);
        runtime.set_accepting_input(false);
        self.avatar()?.cancel_pending_actions();
        Ok(())
    }

    fn unload_transient(&self) -> Result<(), PhaseError> {
        self.host.runtime().close_menus();
        self.avatar()?.detach_from_surface();
        Ok(())
    }

    async fn load_neutral_container(&self) -> Result<(), PhaseError> {
        let neutral = &self.config.neutral_container;
        self.host.loader().load_container(neutral)?;
        self.wait_for_container(neutral).await
    }

    /// Global state goes in while the neutral container is active, so the
    /// target container's startup sees it complete. Anywhere else it would
    /// land in a live scene, so the writes are skipped.
    fn inject_global_state(&self) -> Result<(), PhaseError> {
        let neutral = &self.config.neutral_container;
        let loader = self.host.loader();
        let active = loader.active_container();
        if loader.is_transitioning() || active.as_deref() != Some(neutral.as_str()) {
            return Err(PhaseError::WrongContainer {
                expected: neutral.clone(),
                active,
            });
        }

        self.profile()?.populate(&self.snapshot.global_state_blob)?;
        self.host
            .flag_table()
            .populate(&self.snapshot.flag_table_blob)?;
        Ok(())
    }

    async fn begin_target_transition(&self) -> Result<(), PhaseError> {
        // A late neutral load must finish before the next one can start
        self.wait_until(|_| true, "loader to settle").await?;

        let container = &self.snapshot.container_id;
        let gate = &self.config.reentry_gate;
        self.entry
            .arm(container, gate, self.snapshot.avatar.kinematics.position);
        self.host.loader().begin_transition(TransitionRequest {
            container: container.clone(),
            gate: gate.clone(),
        })?;
        Ok(())
    }

    /// Poll until `container` is active and the loader has settled
    async fn wait_for_container(&self, container: &str) -> Result<(), PhaseError> {
        self.wait_until(
            |active| active == Some(container),
            &format!("container {}", container),
        )
        .await
    }

    /// Poll the idle loader's active container until `ready` accepts it,
    /// bounded by the transition timeout
    async fn wait_until(
        &self,
        ready: impl Fn(Option<&str>) -> bool,
        waiting_for: &str,
    ) -> Result<(), PhaseError> {
        let loader = self.host.loader();
        let started = Instant::now();
        let poll = self.config.poll_interval;

        let arrived = timeout(self.config.transition_timeout, async {
            loop {
                if !loader.is_transitioning() && ready(loader.active_container().as_deref()) {
                    break;
                }
                sleep(poll).await;
            }
        })
        .await;

        match arrived {
            Ok(()) => {
                tracing::debug!(waiting_for, elapsed = ?started.elapsed(), "Loader ready");
                Ok(())
            }
            Err(_) => Err(PhaseError::Timeout {
                waiting_for: waiting_for.to_string(),
                waited: started.elapsed(),
            }),
        }
    }

    fn post_transition_fixups(&self) -> Result<(), PhaseError> {
        let runtime = self.host.runtime();
        let avatar = self.avatar();
        if let Ok(avatar) = &avatar {
            avatar.on_entered_container(&self.snapshot.container_id);
        }
        let profile = self.profile();
        if let Ok(profile) = &profile {
            profile.bump_content_version();
        }
        for notice in [
            RefreshNotice::Inventory,
            RefreshNotice::Health,
            RefreshNotice::DamageValues,
        ] {
            runtime.broadcast(notice);
        }
        runtime.set_camera_live();

        avatar.and(profile).map(|_| ())
    }

    fn restore_entities(&mut self) -> Result<(), PhaseError> {
        let world = self.host.world();
        let mut resolver = EntityResolver::new(&*world);
        let total = self.snapshot.entities.len();
        let mut failed = 0;

        for record in &self.snapshot.entities {
            let entity = match resolver.resolve_or_miss(CapabilityKind::Health, &record.path) {
                Ok(found) => found.into_combat(),
                Err(miss) => {
                    self.report.resolve_misses.push(miss);
                    continue;
                }
            };
            let Some(entity) = entity else {
                continue;
            };

            // One bad entity must not cost the rest their restore
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                restore_entity(entity.as_ref(), record, &self.strategies)
            }));
            match result {
                Ok(Ok(machines)) => {
                    self.report.entities_restored += 1;
                    self.report.machines_restored += machines.restored;
                }
                Ok(Err(e)) => {
                    failed += 1;
                    tracing::warn!(path = %record.path, error = %e, "Entity restored partially");
                }
                Err(panic) => {
                    failed += 1;
                    tracing::warn!(
                        path = %record.path,
                        panic = %panic_message(&*panic),
                        "Entity restore panicked"
                    );
                }
            }
        }

        self.report.entities_failed = failed;
        if failed > 0 {
            return Err(PhaseError::Partial { failed, total });
        }
        Ok(())
    }

    fn restore_sequences(&mut self) -> Result<(), PhaseError> {
        let world = self.host.world();
        let mut resolver = EntityResolver::new(&*world);
        let total = self.snapshot.sequences.len();
        let mut failed = 0;

        for state in &self.snapshot.sequences {
            let controller = match resolver.resolve_or_miss(CapabilityKind::Sequence, &state.path) {
                Ok(found) => found.into_sequence(),
                Err(miss) => {
                    self.report.resolve_misses.push(miss);
                    continue;
                }
            };
            let Some(controller) = controller else {
                continue;
            };

            match restore_sequence(controller.as_ref(), state, &self.strategies) {
                Ok(machine_restored) => {
                    self.report.sequences_restored += 1;
                    self.report.machines_restored += usize::from(machine_restored);
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(path = %state.path, error = %e, "Failed to restore encounter");
                }
            }
        }

        if failed > 0 {
            return Err(PhaseError::Partial { failed, total });
        }
        Ok(())
    }

    async fn apply_avatar_kinematics(&self) -> Result<(), PhaseError> {
        // Let fresh components run their first frame before overriding them
        sleep(self.config.settle_delay).await;

        let avatar = self.avatar()?;
        let kinematics = self.snapshot.avatar.kinematics;
        avatar.apply_kinematics(&kinematics);
        avatar.set_visible(true);
        avatar.play_locomotion(if kinematics.grounded {
            Locomotion::Idle
        } else {
            Locomotion::Fall
        });
        Ok(())
    }

    fn resume(&self) -> Result<(), PhaseError> {
        let runtime = self.host.runtime();
        runtime.set_time_scale(1.0);
        runtime.set_accepting_input(true);
        if self.entry.disarm() {
            tracing::warn!("Entry override was never consumed, cleared");
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
