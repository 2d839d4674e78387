//! Integration tests for Stasis
//!
//! These tests verify that capture, storage and restore work together
//! against the simulated host.

#[path = "../common/mod.rs"]
pub mod common;

pub mod cli;
pub mod restore_flow;
pub mod scenarios;
pub mod store_flow;
