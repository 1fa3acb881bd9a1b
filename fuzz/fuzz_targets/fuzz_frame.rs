#![no_main]

use docwire::core::frame::Frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Header and length validation must reject, never panic
    let _ = Frame::from_bytes(data, 1024 * 1024);
});
