//! Fuzz target for config.toml parsing and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tr_core::config::UploadConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = toml::from_str::<UploadConfig>(text) {
        let _ = config.validate();
    }
});
