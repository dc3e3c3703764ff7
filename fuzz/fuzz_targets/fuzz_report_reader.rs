//! Fuzz target for report.json parsing.
//!
//! Report directories are produced by third-party reporters, so parsing must
//! reject malformed input with an error and never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tr_bundle::ReportReader;

fuzz_target!(|data: &[u8]| {
    let _ = ReportReader::parse(data);
});
