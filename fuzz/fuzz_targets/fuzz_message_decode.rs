//! Fuzz target: `decode`
//!
//! Any payload the codec accepts must encode back to the same bytes,
//! and reading its arguments as any type must not panic.
//!
//! cargo fuzz run fuzz_message_decode

#![no_main]

use admlink::protocol::{Endianness, decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(msg) = decode(data, Endianness::Little) else {
        return;
    };
    let again = encode(&msg).expect("decoded message must re-encode");
    assert_eq!(again.as_slice(), data);

    for i in 0..=msg.argument_count() {
        let _ = msg.get_bool(i);
        let _ = msg.get_u16(i);
        let _ = msg.get_i32(i);
        let _ = msg.get_string(i);
    }
});
