//! Integration tests for the `stasis` binary

use assert_cmd::Command;
use predicates::prelude::*;
use stasis::capture::capture;
use stasis::snapshot::SnapshotStore;
use std::sync::Arc;
use tempfile::TempDir;

use super::common::world::{room, ROOM};
use stasis::host::sim::SimHost;
use stasis::EntryOverride;

fn stasis(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stasis").unwrap();
    cmd.arg("--data-dir").arg(data_dir.path());
    cmd
}

/// Seed the default saved-states file with one capture named `name`
fn seed(data_dir: &TempDir, name: &str) -> String {
    let host = SimHost::new(vec![room()], Arc::new(EntryOverride::new()));
    host.boot(ROOM).unwrap();
    let snapshot = capture(&host, Some(name)).unwrap();
    let store = SnapshotStore::open(data_dir.path().join("savestates.json"));
    store.append(snapshot).unwrap().to_string()
}

#[test]
fn test_list_empty() {
    let dir = TempDir::new().unwrap();
    stasis(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved states"));

    // First run writes the example config and the log file
    assert!(dir.path().join("config.toml").exists());
    assert!(dir.path().join("logs").join("stasis.log").exists());
}

#[test]
fn test_list_show_delete() {
    let dir = TempDir::new().unwrap();
    let id = seed(&dir, "checkpoint");

    stasis(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()).and(predicate::str::contains("checkpoint")));

    stasis(&dir)
        .args(["show", "checkpoint"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"container_id\": \"Room\""));

    stasis(&dir)
        .args(["delete", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted checkpoint"));

    stasis(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved states"));
}

#[test]
fn test_show_unknown_fails() {
    let dir = TempDir::new().unwrap();
    stasis(&dir)
        .args(["show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No saved state matches 'nope'"));
}

#[test]
fn test_demo_restores_checkpoint() {
    let dir = TempDir::new().unwrap();
    stasis(&dir)
        .arg("demo")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("final phase: Terminal")
                .and(predicate::str::contains("health 5/9"))
                .and(predicate::str::contains("doorOpen Some(true)"))
                .and(predicate::str::contains("clock 1"))
                .and(predicate::str::contains("input true")),
        );

    // The demo never touches the real list
    assert!(!dir.path().join("savestates.json").exists());
}
