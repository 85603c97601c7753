//! TankGuard controller library.
//!
//! Exposes the pure-logic modules for integration testing and the two
//! binaries.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod consumption;
pub mod control;
pub mod drivers;
pub mod error;
pub mod leak;
pub mod pins;
pub mod scheduler;
pub mod sensors;
