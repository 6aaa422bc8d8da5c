//! Fuzz target: command string parser.
//!
//! cargo fuzz run fuzz_command_string

#![no_main]

use admlink::command::parse;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(request) = parse(text) {
            assert!(!request.board().is_empty());
            assert!(!request.board().contains(':'));
        }
    }
});
