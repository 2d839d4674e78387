//! End-to-end gameplay scenarios

use super::common::world::{TestWorld, ROOM, SPIDER_1, SPIDER_2};
use stasis::host::{CapabilityKind, CombatEntity, HostRuntime};
use stasis::restore::PhaseOutcome;
use stasis::{Phase, ResolveMiss};

#[tokio::test]
async fn test_checkpoint_scenario() {
    let world = TestWorld::new();
    let profile = world.host.sim_profile();
    profile.set_max_health(9);
    profile.set_health(5);
    world.host.scene().flag("doorOpen").unwrap().set(true);

    world.states.capture(Some("checkpoint")).unwrap();

    // Take damage and close the door again
    profile.set_health(2);
    world.host.scene().flag("doorOpen").unwrap().set(false);
    world.host.sim_runtime().set_time_scale(0.5);

    let report = world.states.load_named("checkpoint").await.unwrap();
    assert_eq!(report.final_phase, Phase::Terminal);

    let data = profile.data();
    assert_eq!((data.health, data.max_health), (5, 9));
    assert!(world.host.scene().flag("doorOpen").unwrap().value());
    assert_eq!(world.host.sim_runtime().time_scale(), 1.0);
    assert!(world.host.sim_runtime().accepting_input());
}

#[tokio::test]
async fn test_defeated_enemy_is_a_single_resolve_miss() {
    let world = TestWorld::new();
    let id = world.states.capture(Some("before fight")).unwrap();
    let recorded = world.states.get(id).unwrap();
    assert!(!recorded.entity(SPIDER_1).unwrap().health.is_defeated);

    // The spider is killed for good before the restore
    let spider = world.host.scene().combatant(SPIDER_1).unwrap();
    spider.damage(100);
    assert!(spider.health().is_defeated);
    assert!(world.host.destroy_permanently(SPIDER_1));

    let report = world.states.load(id).await.unwrap();

    assert_eq!(
        report.resolve_misses,
        vec![ResolveMiss {
            kind: CapabilityKind::Health,
            path: SPIDER_1.to_string(),
        }]
    );
    assert_eq!(report.entities_restored, 2);
    assert_eq!(
        report.outcome(Phase::RestoreEntities),
        Some(&PhaseOutcome::Completed)
    );
    assert!(world.host.scene().combatant(SPIDER_1).is_none());
    assert_eq!(world.host.sim_runtime().time_scale(), 1.0);
}

#[tokio::test]
async fn test_unresolved_path_does_not_block_other_records() {
    let world = TestWorld::new();
    world
        .host
        .scene()
        .combatant(SPIDER_2)
        .unwrap()
        .damage(5);
    let id = world.states.capture(None).unwrap();

    world.host.destroy_permanently(SPIDER_1);
    let report = world.states.load(id).await.unwrap();

    assert_eq!(report.resolve_misses.len(), 1);
    let survivor = world.host.scene().combatant(SPIDER_2).unwrap();
    assert_eq!(survivor.health().health, 15);
    assert!(survivor.recoil().unwrap().is_recoiling);
}

#[tokio::test]
async fn test_restore_without_avatar_still_resumes() {
    let world = TestWorld::new();
    let id = world.states.capture(None).unwrap();
    world.host.set_avatar_present(false);
    world.host.sim_runtime().set_time_scale(0.0);

    let report = world.states.load(id).await.unwrap();

    let failed: Vec<Phase> = report.failures().map(|r| r.phase).collect();
    assert_eq!(
        failed,
        vec![
            Phase::Suspend,
            Phase::UnloadTransient,
            Phase::PostTransitionFixups,
            Phase::ApplyAvatarKinematics,
        ]
    );
    assert_eq!(report.outcome(Phase::Resume), Some(&PhaseOutcome::Completed));
    assert_eq!(world.host.sim_runtime().time_scale(), 1.0);
    assert!(world.host.sim_runtime().accepting_input());
    assert_eq!(world.host.sim_loader().arrivals().last().unwrap().container, ROOM);
}
