#![no_main]

use docwire::protocol::op_msg;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Section walking with arbitrary kinds, sizes and checksum flags
    let _ = op_msg::decode(1, data);
});
