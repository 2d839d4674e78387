//! Integration tests for the durable saved-state list

use super::common::world::TestWorld;
use stasis::snapshot::{SnapshotStore, StatesChanged};
use stasis::StoreError;
use std::fs;

#[test]
fn test_delete_removes_exactly_one_and_notifies_once() {
    let world = TestWorld::new();
    let a = world.states.capture(Some("a")).unwrap();
    let b = world.states.capture(Some("b")).unwrap();
    let c = world.states.capture(Some("c")).unwrap();
    let mut rx = world.states.subscribe();

    let removed = world.states.delete(b).unwrap();

    assert_eq!(removed.name, "b");
    let ids: Vec<_> = world.states.list().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![a, c]);
    assert_eq!(rx.try_recv().unwrap(), StatesChanged::Deleted(b));
    assert!(rx.try_recv().is_err());

    assert!(matches!(
        world.states.delete(b),
        Err(StoreError::NotFound(id)) if id == b
    ));
    assert_eq!(world.states.list().len(), 2);
}

#[test]
fn test_list_survives_reopen_in_order() {
    let world = TestWorld::new();
    let first = world.states.capture(Some("first")).unwrap();
    let second = world.states.capture(Some("second")).unwrap();

    let reopened = SnapshotStore::open(world.states.store().path());
    let ids: Vec<_> = reopened.list().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(reopened.get(first), world.states.get(first));
}

#[test]
fn test_newest_name_wins() {
    let world = TestWorld::new();
    world.states.capture(Some("boss")).unwrap();
    let newer = world.states.capture(Some("boss")).unwrap();
    assert_eq!(world.states.find("boss").unwrap().id, newer);
    assert_eq!(
        world.states.find(&newer.to_string()).unwrap().name,
        "boss"
    );
}

#[test]
fn test_corrupt_file_reads_as_empty() {
    let world = TestWorld::new();
    let path = world.states.store().path().to_path_buf();
    fs::write(&path, "{ this is not json").unwrap();

    let store = SnapshotStore::open(&path);
    assert!(store.is_empty());
}
