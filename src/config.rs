//! System configuration parameters
//!
//! All tunable parameters for the TankGuard controller.  Loaded from a
//! JSON or YAML document at startup by a [`ConfigPort`](crate::app::ports::ConfigPort)
//! adapter and validated before any state machine is built; an invalid
//! document stops the process before the relay is ever touched.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pins;
use crate::sensors::level::{Calibration, SmoothingMethod};

/// Largest smoothing window the sensor can hold (stack-allocated).
pub const MAX_SMOOTHING_WINDOW: usize = 32;

/// Core system configuration.
///
/// `pump_control` is the only group without defaults: a controller that
/// silently invented its thresholds would be worse than one that refuses
/// to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub pump_control: PumpControlConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub leak_detection: LeakDetectionConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

// --- Pump ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpControlConfig {
    /// Start filling at or below this level (0-100%).
    pub on_threshold_percent: f32,
    /// Stop filling at or above this level (0-100%).
    pub off_threshold_percent: f32,
    /// Safety ceiling: stop immediately, ignoring `min_run_seconds`.
    #[serde(default)]
    pub hard_off_percent: Option<f32>,
    /// Minimum time the pump stays on once energized.
    pub min_run_seconds: u32,
    /// Minimum rest time between a stop and the next start.
    pub min_off_seconds: u32,
    /// Delay between the start decision and energizing the relay.
    #[serde(default)]
    pub soft_start_delay_seconds: u32,
    /// Period of the human-readable status line.
    #[serde(default = "default_status_period")]
    pub status_publish_period_s: u32,
}

impl Default for PumpControlConfig {
    fn default() -> Self {
        Self {
            on_threshold_percent: 25.0,
            off_threshold_percent: 80.0,
            hard_off_percent: None,
            min_run_seconds: 180,
            min_off_seconds: 120,
            soft_start_delay_seconds: 0,
            status_publish_period_s: default_status_period(),
        }
    }
}

fn default_status_period() -> u32 {
    10
}

// --- Sensor ---

/// Which raw probe feeds the [`LevelSensor`](crate::sensors::level::LevelSensor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// HC-SR04 style trigger/echo distance probe.
    Ultrasonic,
    /// Single digital input (float switch): 0% or 100%.
    DigitalThreshold,
    /// Software tank model, no level hardware needed.
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub kind: SensorKind,
    pub smoothing: SmoothingConfig,
    pub calibration: Calibration,
    pub ultrasonic: UltrasonicConfig,
    pub simulation: SimulationConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::Ultrasonic,
            smoothing: SmoothingConfig::default(),
            calibration: Calibration::default(),
            ultrasonic: UltrasonicConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Number of calibrated readings kept (1..=32).
    pub window: usize,
    /// Minimum spacing between two hardware samples (milliseconds).
    pub period_ms: u32,
    pub method: SmoothingMethod,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 5,
            period_ms: 1000,
            method: SmoothingMethod::MedianMa,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UltrasonicConfig {
    /// Echo distance when the tank is full (sensor to water surface).
    pub full_distance_cm: f32,
    /// Echo distance when the tank is empty.
    pub empty_distance_cm: f32,
    /// Upper bound on each echo edge wait.
    pub echo_timeout_ms: u32,
}

impl Default for UltrasonicConfig {
    fn default() -> Self {
        Self {
            full_distance_cm: 20.0,
            empty_distance_cm: 180.0,
            echo_timeout_ms: 30, // ~5 m round trip
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub initial_percent: f32,
    /// Household draw while the pump is off.
    pub draw_percent_per_sec: f32,
    /// Net rise while the pump is on.
    pub fill_percent_per_sec: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_percent: 50.0,
            draw_percent_per_sec: 0.1,
            fill_percent_per_sec: 0.4,
        }
    }
}

// --- Hardware ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Use the in-memory GPIO capability and the simulated tank instead
    /// of real pins.  Honoured by both the firmware and the host runner.
    pub simulate: bool,
    pub relay_active_high: bool,
    pub pins: PinConfig,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            simulate: false,
            relay_active_high: false,
            pins: PinConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub pump_relay: u8,
    pub level_input: u8,
    pub trigger: u8,
    pub echo: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            pump_relay: pins::PUMP_RELAY_GPIO,
            level_input: pins::LEVEL_INPUT_GPIO,
            trigger: pins::ULTRASONIC_TRIG_GPIO,
            echo: pins::ULTRASONIC_ECHO_GPIO,
        }
    }
}

// --- Leak detection ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeakDetectionConfig {
    /// Drop (percentage points) over a scan that classifies as a leak.
    pub min_detectable_drop_percent: f32,
    pub nightly_scan: NightlyScanConfig,
    /// Whether manual "scan now" requests are honoured.
    pub manual_override_allowed: bool,
}

impl Default for LeakDetectionConfig {
    fn default() -> Self {
        Self {
            min_detectable_drop_percent: 1.0,
            nightly_scan: NightlyScanConfig::default(),
            manual_override_allowed: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NightlyScanConfig {
    pub enabled: bool,
    /// Hour of day (0-23) at or after which the daily scan starts.
    pub start_hour: u8,
    pub duration_minutes: u32,
}

impl Default for NightlyScanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_hour: 2,
            duration_minutes: 45,
        }
    }
}

// --- Runtime / analytics ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Control loop period (milliseconds).
    pub loop_period_ms: u32,
    /// During a failure streak, a `SENSOR_READ_ERROR` record is written for
    /// the first failure and then every N consecutive failures.
    pub sensor_error_report_every: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loop_period_ms: 1000,
            sensor_error_report_every: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub data_dir: String,
    pub level_log_csv: String,
    pub events_log_csv: String,
    /// Daily / weekly consumption estimate, one row per date.
    pub summary_csv: String,
    /// Tank volume used to turn level drops into litres.
    pub tank_capacity_liters: f32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            level_log_csv: "levels.csv".into(),
            events_log_csv: "events.csv".into(),
            summary_csv: "summaries.csv".into(),
            tank_capacity_liters: 1000.0,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            pump_control: PumpControlConfig::default(),
            sensor: SensorConfig::default(),
            hardware: HardwareConfig::default(),
            leak_detection: LeakDetectionConfig::default(),
            runtime: RuntimeConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing and validation
// ---------------------------------------------------------------------------

impl SystemConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: SystemConfig = serde_json::from_str(text).map_err(|e| {
            log::error!("config: {}", e);
            ConfigError::Malformed
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a YAML document and validate it.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let cfg: SystemConfig = serde_yaml::from_str(text).map_err(|e| {
            log::error!("config: {}", e);
            ConfigError::Malformed
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range and ordering checks.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pump_control;
        for v in [p.on_threshold_percent, p.off_threshold_percent] {
            if !(0.0..=100.0).contains(&v) {
                return Err(ConfigError::ValidationFailed(
                    "pump thresholds must be 0.0–100.0",
                ));
            }
        }
        if let Some(hard) = p.hard_off_percent {
            if !(0.0..=100.0).contains(&hard) {
                return Err(ConfigError::ValidationFailed(
                    "hard_off_percent must be 0.0–100.0",
                ));
            }
        }
        crate::control::pump::Thresholds::from(p).validate()?;

        let c = &self.sensor.calibration;
        if !((0.0..=100.0).contains(&c.min_percent) && (0.0..=100.0).contains(&c.max_percent)) {
            return Err(ConfigError::ValidationFailed(
                "calibration bounds must be 0.0–100.0",
            ));
        }

        let s = &self.sensor.smoothing;
        if !(1..=MAX_SMOOTHING_WINDOW).contains(&s.window) {
            return Err(ConfigError::ValidationFailed(
                "smoothing.window must be 1–32",
            ));
        }
        if s.period_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "smoothing.period_ms must be > 0",
            ));
        }

        let u = &self.sensor.ultrasonic;
        if self.sensor.kind == SensorKind::Ultrasonic {
            if !(u.full_distance_cm > 0.0
                && u.empty_distance_cm > u.full_distance_cm
                && u.empty_distance_cm.is_finite())
            {
                return Err(ConfigError::ValidationFailed(
                    "ultrasonic distances must satisfy 0 < full < empty",
                ));
            }
            if u.echo_timeout_ms == 0 {
                return Err(ConfigError::ValidationFailed(
                    "ultrasonic.echo_timeout_ms must be > 0",
                ));
            }
        }

        let sim = &self.sensor.simulation;
        if self.sensor.kind == SensorKind::Simulated
            && ![sim.initial_percent, sim.draw_percent_per_sec, sim.fill_percent_per_sec]
                .iter()
                .all(|v| v.is_finite())
        {
            return Err(ConfigError::ValidationFailed(
                "simulation rates must be finite",
            ));
        }

        let pins = &self.hardware.pins;
        let sensor_pins: &[u8] = match self.sensor.kind {
            SensorKind::Ultrasonic => &[pins.trigger, pins.echo],
            SensorKind::DigitalThreshold => &[pins.level_input],
            SensorKind::Simulated => &[],
        };
        if sensor_pins.contains(&pins.pump_relay) {
            return Err(ConfigError::ValidationFailed(
                "pump relay pin must not be shared with a sensor pin",
            ));
        }
        if self.sensor.kind == SensorKind::Ultrasonic && pins.trigger == pins.echo {
            return Err(ConfigError::ValidationFailed(
                "ultrasonic trigger and echo pins must differ",
            ));
        }

        let l = &self.leak_detection;
        if !(l.min_detectable_drop_percent > 0.0 && l.min_detectable_drop_percent <= 100.0) {
            return Err(ConfigError::ValidationFailed(
                "min_detectable_drop_percent must be in (0, 100]",
            ));
        }
        if l.nightly_scan.start_hour > 23 {
            return Err(ConfigError::ValidationFailed(
                "nightly_scan.start_hour must be 0–23",
            ));
        }
        if l.nightly_scan.duration_minutes == 0 {
            return Err(ConfigError::ValidationFailed(
                "nightly_scan.duration_minutes must be >= 1",
            ));
        }

        if !(10..=60_000).contains(&self.runtime.loop_period_ms) {
            return Err(ConfigError::ValidationFailed(
                "loop_period_ms must be 10–60000",
            ));
        }
        if self.runtime.sensor_error_report_every == 0 {
            return Err(ConfigError::ValidationFailed(
                "sensor_error_report_every must be >= 1",
            ));
        }

        let a = &self.analytics;
        if !(a.tank_capacity_liters > 0.0 && a.tank_capacity_liters.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "tank_capacity_liters must be a positive number",
            ));
        }
        Ok(())
    }
}
