//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the orchestration of the TankGuard controller:
//! sampling, pump control, scheduling and leak scanning, in a fixed order
//! each tick.  All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real pins.

pub mod commands;
pub mod events;
pub mod ports;
pub mod runner;
pub mod service;
