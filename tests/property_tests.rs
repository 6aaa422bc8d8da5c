//! Property tests for the wire codec, stream framing and tag space.

use std::time::{Duration, Instant};

use admlink::command::{CommandRequest, Step, parse};
use admlink::protocol::frame::{FrameDecoder, encode_frame};
use admlink::protocol::{Endianness, MAX_MESSAGE_SIZE, Message, MessageType, decode, encode};
use admlink::tracking::{TAG_COUNT, TagSpace};
use proptest::prelude::*;

// ── Codec ─────────────────────────────────────────────────────

proptest! {
    /// Arbitrary bytes never panic the decoder, and anything it accepts
    /// encodes back to the same bytes.
    #[test]
    fn decode_accepts_only_what_encode_reproduces(
        bytes in proptest::collection::vec(any::<u8>(), 0..=64),
    ) {
        if let Ok(msg) = decode(&bytes, Endianness::Little) {
            let again = encode(&msg).unwrap();
            prop_assert_eq!(again.as_slice(), bytes.as_slice());
        }
    }

    #[test]
    fn integers_keep_their_value_in_either_byte_order(
        little in any::<bool>(),
        a in any::<u16>(),
        b in any::<i32>(),
        c in any::<u32>(),
    ) {
        let endianness = Endianness::from_little(little);
        let mut msg = Message::to_target(MessageType::Command, 2).with_endianness(endianness);
        msg.add_u16(a).add_i32(b).add_u32(c);

        let decoded = decode(&encode(&msg).unwrap(), endianness).unwrap();
        prop_assert_eq!(decoded.get_u16(0).unwrap(), a);
        prop_assert_eq!(decoded.get_i32(1).unwrap(), b);
        prop_assert_eq!(decoded.get_u32(2).unwrap(), c);
    }

    #[test]
    fn oversized_messages_are_refused(extra in 1usize..40) {
        let mut msg = Message::new(MessageType::Data);
        msg.add_bytes(&vec![0xAB; MAX_MESSAGE_SIZE - 5 + extra]);
        prop_assert!(encode(&msg).is_err());
    }
}

// ── Framing ───────────────────────────────────────────────────

proptest! {
    /// However a stream of frames is split into reads, the decoder
    /// yields the original payloads in order.
    #[test]
    fn frames_survive_any_read_split(
        payloads in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 1..=MAX_MESSAGE_SIZE),
            1..8,
        ),
        chunk in 1usize..17,
    ) {
        let stream: Vec<u8> = payloads
            .iter()
            .flat_map(|p| encode_frame(p).unwrap().to_vec())
            .collect();

        let mut decoder = FrameDecoder::new();
        let mut out: Vec<Vec<u8>> = Vec::new();
        for read in stream.chunks(chunk) {
            decoder.feed(read, |p| out.push(p.to_vec()));
        }
        prop_assert_eq!(out, payloads);
        prop_assert_eq!(decoder.dropped(), 0);
    }

    #[test]
    fn garbage_never_yields_oversized_payloads(
        data in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&data, |p| {
            assert!(!p.is_empty() && p.len() <= MAX_MESSAGE_SIZE);
        });
    }
}

// ── Tag space ─────────────────────────────────────────────────

proptest! {
    /// Live tags are distinct and never zero; releasing them all
    /// empties the space.
    #[test]
    fn live_tags_are_unique(n in 1usize..=TAG_COUNT) {
        let now = Instant::now();
        let mut tags = TagSpace::new();
        let mut seen = Vec::with_capacity(n);
        for _ in 0..n {
            let tag = tags.create_at(Duration::from_secs(60), now).unwrap();
            prop_assert!(tag != 0);
            prop_assert!(!seen.contains(&tag));
            seen.push(tag);
        }
        prop_assert_eq!(tags.used_at(now), n);

        for tag in seen {
            tags.release_at(tag, now);
        }
        prop_assert_eq!(tags.used_at(now), 0);
        prop_assert_eq!(tags.available_at(now), TAG_COUNT);
    }

    /// A set's owner outlives its members and goes with the last one.
    #[test]
    fn set_owner_is_freed_after_its_members(members in 1usize..20) {
        let now = Instant::now();
        let mut tags = TagSpace::new();
        let owner = tags.create_set_at(Duration::from_secs(10), now).unwrap();
        let mut issued = Vec::new();
        for _ in 0..members {
            issued.push(tags.create_in_set_at(owner, now).unwrap());
        }
        prop_assert_eq!(issued[0], owner);
        prop_assert_eq!(tags.set_len(owner), Some(members));

        for tag in &issued {
            prop_assert_eq!(tags.release_at(*tag, now), owner);
        }
        prop_assert!(tags.contains_at(owner, now));
        tags.release_at(owner, now);
        prop_assert!(!tags.contains_at(owner, now));
        prop_assert_eq!(tags.used_at(now), 0);
    }
}

// ── Command strings ───────────────────────────────────────────

proptest! {
    #[test]
    fn command_parser_never_panics(input in "\\PC{0,40}") {
        let _ = parse(&input);
    }

    #[test]
    fn waits_parse_to_their_duration(ms in 0u64..100_000) {
        let input = format!("b1:sw1:on,wait[{ms}]");
        let Ok(CommandRequest::Device { steps, .. }) = parse(&input) else {
            return Err(TestCaseError::fail("not a device command"));
        };
        prop_assert_eq!(steps.last(), Some(&Step::Wait(Duration::from_millis(ms))));
    }
}
