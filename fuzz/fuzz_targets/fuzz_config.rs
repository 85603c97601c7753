//! Fuzz target: `SystemConfig::from_json`
//!
//! Feeds arbitrary bytes to the config parser and checks:
//! - No panics under any input
//! - Anything accepted also passes `validate()` and builds a `ControlLoop`
//!
//! cargo fuzz run fuzz_config

#![no_main]

use libfuzzer_sys::fuzz_target;
use tankguard::app::service::ControlLoop;
use tankguard::config::SystemConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(cfg) = SystemConfig::from_json(text) {
        assert!(cfg.validate().is_ok());
        let on = cfg.pump_control.on_threshold_percent;
        let off = cfg.pump_control.off_threshold_percent;
        assert!(on < off);
        let _ = ControlLoop::new(cfg);
    }
});
