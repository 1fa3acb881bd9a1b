#![no_main]

use docwire::protocol::{op_insert, op_query};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = op_query::decode(1, data);
    let _ = op_insert::decode(1, data);
    let _ = op_query::decode_reply(data);
});
