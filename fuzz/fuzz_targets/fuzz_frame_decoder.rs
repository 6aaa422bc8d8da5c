//! Fuzz target: `FrameDecoder::feed`
//!
//! Drives arbitrary byte sequences into the streaming frame decoder, in
//! one read and then split at every byte, and asserts that payloads stay
//! within the wire limit and both splits agree.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use admlink::protocol::MAX_MESSAGE_SIZE;
use admlink::protocol::frame::FrameDecoder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut whole = Vec::new();
    let mut decoder = FrameDecoder::new();
    decoder.feed(data, |payload| {
        assert!(!payload.is_empty(), "decoder must not yield empty payload");
        assert!(payload.len() <= MAX_MESSAGE_SIZE, "payload exceeds MAX_MESSAGE_SIZE");
        whole.push(payload.to_vec());
    });

    let mut split = Vec::new();
    decoder = FrameDecoder::new();
    for byte in data.chunks(1) {
        decoder.feed(byte, |payload| split.push(payload.to_vec()));
    }
    assert_eq!(whole, split, "read boundaries changed the frames");
});
