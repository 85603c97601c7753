//! Unified error types for the TankGuard firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the loop and the event sink without allocation.
//!
//! | Kind             | Source                          | Policy                       |
//! |------------------|---------------------------------|------------------------------|
//! | `SensorTimeout`  | echo / pin read exceeded bound  | skip sample, keep last level |
//! | `SensorReadError`| garbage or implausible reading  | skip sample, keep last level |
//! | `ConfigError`    | invalid thresholds / fields     | fatal at startup             |
//! | `HardwareFault`  | pin configure / write failure   | fatal, relay off + release   |

use core::fmt;

use log::error;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The level probe could not produce a reading.
    Sensor(SensorError),
    /// The GPIO capability failed to configure, read, write or release a pin.
    Hardware(HardwareFault),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl Error {
    /// Taxonomy name used in the single fatal diagnostic line.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sensor(SensorError::Timeout) => "SensorTimeout",
            Self::Sensor(SensorError::ReadError) => "SensorReadError",
            Self::Hardware(_) => "HardwareFault",
            Self::Config(_) => "ConfigError",
        }
    }

    /// Fatal errors terminate the control loop; sensor errors never do.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Sensor(_))
    }

    /// The single diagnostic line written before a fatal exit.
    pub fn log_fatal(&self) {
        error!("FATAL {}: {}", self.kind(), self);
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The echo line (or blocking pin read) did not change within the bound.
    Timeout,
    /// The reading is malformed or physically implausible.
    ReadError,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "read timed out"),
            Self::ReadError => write!(f, "malformed reading"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware faults
// ---------------------------------------------------------------------------

/// Failure reported by the GPIO capability.  Carries the pin number where
/// one applies so the diagnostic can name the wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareFault {
    /// Pin direction / pull / initial level could not be applied.
    ConfigureFailed(u8),
    /// Pin level could not be read.
    ReadFailed(u8),
    /// Pin level could not be driven.
    WriteFailed(u8),
    /// The capability could not be released cleanly.
    ReleaseFailed,
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigureFailed(pin) => write!(f, "configure of GPIO {pin} failed"),
            Self::ReadFailed(pin) => write!(f, "read of GPIO {pin} failed"),
            Self::WriteFailed(pin) => write!(f, "write of GPIO {pin} failed"),
            Self::ReleaseFailed => write!(f, "GPIO release failed"),
        }
    }
}

impl From<HardwareFault> for Error {
    fn from(e: HardwareFault) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from loading or validating [`SystemConfig`](crate::config::SystemConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config file at the given location.
    NotFound,
    /// The document could not be parsed (syntax, type or missing field).
    Malformed,
    /// A field failed range or ordering validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Malformed => write!(f, "config malformed or missing a required field"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
