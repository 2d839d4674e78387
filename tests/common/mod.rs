//! Shared test utilities for Stasis
//!
//! This module provides common helpers for integration tests:
//! - A simulated world with a known layout
//! - An engine wired to it with isolated storage

pub mod world;
