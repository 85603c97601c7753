//! Closed-loop control: the hysteresis pump controller.

pub mod pump;
