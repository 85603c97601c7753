//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                 |
//! |----------------|--------------------|-----------------------------|
//! | `gpio`         | GpioPort           | ESP32 GPIO / in-memory pins |
//! | `hardware`     | LevelSource        | Level probe via GpioPort    |
//! |                | ActuatorPort       | Pump relay via GpioPort     |
//! | `log_sink`     | TelemetrySink      | Serial / console log output |
//! | `csv_sink`     | TelemetrySink      | `levels.csv`, `events.csv`  |
//! | `config_file`  | ConfigPort         | JSON file / firmware image  |
//! | `time`         | Clock              | ESP32 system timer, host OS |

pub mod config_file;
pub mod csv_sink;
pub mod gpio;
pub mod hardware;
pub mod log_sink;
pub mod time;
