//! Default GPIO assignments for the TankGuard controller board.
//!
//! Single source of truth for the defaults in
//! [`PinConfig`](crate::config::PinConfig).  Numbers are BCM / GPIO
//! numbers, not header positions.  Every value can be overridden from the
//! config file, so a board respin only needs a config change.

// ---------------------------------------------------------------------------
// Pump relay
// ---------------------------------------------------------------------------

/// Digital output driving the pump contactor relay coil.
/// Most opto-isolated relay boards are active LOW.
pub const PUMP_RELAY_GPIO: u8 = 17;

// ---------------------------------------------------------------------------
// Level sensing
// ---------------------------------------------------------------------------

/// HC-SR04 trigger: 10 µs HIGH pulse starts a measurement.
pub const ULTRASONIC_TRIG_GPIO: u8 = 23;
/// HC-SR04 echo: HIGH for the round-trip time of the ping.
pub const ULTRASONIC_ECHO_GPIO: u8 = 24;

/// Float switch / capacitive threshold sensor.  HIGH = water above the probe.
pub const LEVEL_INPUT_GPIO: u8 = 27;

// ---------------------------------------------------------------------------
// Ultrasonic timing
// ---------------------------------------------------------------------------

/// Width of the trigger pulse (datasheet minimum is 10 µs).
pub const TRIGGER_PULSE_US: u32 = 10;
/// Settle time with trigger LOW before the pulse.
pub const TRIGGER_SETTLE_US: u32 = 2;
