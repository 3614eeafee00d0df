#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary TOML must either fail to parse or validate without panicking.
    if let Ok(cfg) = toml::from_str::<rotator_config::Config>(data) {
        if cfg.validate().is_ok() {
            // A config that validates must keep its speed window ordered.
            assert!(cfg.controller.min_speed <= cfg.controller.max_speed);
            assert!(cfg.limits.min_deg < cfg.limits.max_deg);
        }
    }
});
