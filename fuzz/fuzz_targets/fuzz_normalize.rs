//! Fuzz target for report normalization.
//!
//! Any report that parses must either normalize cleanly or fail with a typed
//! error, and normalizing the output again must not change it.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tr_bundle::ReportReader;

fuzz_target!(|data: &[u8]| {
    let Ok(report) = ReportReader::parse(data) else {
        return;
    };
    let Ok(once) = tr_core::normalize(&report) else {
        return;
    };
    let twice = tr_core::normalize(&once).expect("normalized report must normalize again");
    assert_eq!(once, twice);
});
