//! Actuator and supervision drivers.

pub mod relay;
pub mod watchdog;
