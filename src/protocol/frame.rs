//! Length-prefix stream framing for byte-stream transports.
//!
//! Wire format:
//! ```text
//! ┌────────────┬──────────────────────────┐
//! │ Length (1B)│ Message payload (N B)    │
//! │ 1..=50     │                          │
//! └────────────┴──────────────────────────┘
//! ```
//!
//! The decoder accumulates incoming bytes and yields whole payloads. A
//! single socket read may hold part of a frame or several frames back
//! to back; both are handled.

use heapless::Vec as FrameVec;

use super::codec::MAX_MESSAGE_SIZE;

/// Length prefix size.
const PREFIX_SIZE: usize = 1;

/// A framed message: prefix plus payload.
pub type Frame = FrameVec<u8, { MAX_MESSAGE_SIZE + PREFIX_SIZE }>;

enum DecoderState {
    /// Waiting for the length byte.
    ReadingLength,
    /// Length received, reading payload.
    ReadingPayload { expected: usize, collected: usize },
}

/// Streaming frame decoder.
pub struct FrameDecoder {
    state: DecoderState,
    payload_buf: [u8; MAX_MESSAGE_SIZE],
    dropped: u32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::ReadingLength,
            payload_buf: [0; MAX_MESSAGE_SIZE],
            dropped: 0,
        }
    }

    /// Feed bytes into the decoder, calling `on_frame` for every complete
    /// payload. Returns the number of payloads delivered.
    pub fn feed(&mut self, data: &[u8], mut on_frame: impl FnMut(&[u8])) -> usize {
        let mut offset = 0;
        let mut delivered = 0;

        while offset < data.len() {
            match &mut self.state {
                DecoderState::ReadingLength => {
                    let expected = data[offset] as usize;
                    offset += 1;

                    if expected == 0 || expected > MAX_MESSAGE_SIZE {
                        // Not a valid prefix; resynchronise on the next byte.
                        self.dropped = self.dropped.wrapping_add(1);
                        continue;
                    }

                    self.state = DecoderState::ReadingPayload {
                        expected,
                        collected: 0,
                    };
                }

                DecoderState::ReadingPayload { expected, collected } => {
                    let needed = *expected - *collected;
                    let available = data.len() - offset;
                    let to_copy = needed.min(available);

                    self.payload_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);

                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == *expected {
                        let len = *expected;
                        self.state = DecoderState::ReadingLength;
                        on_frame(&self.payload_buf[..len]);
                        delivered += 1;
                    }
                }
            }
        }

        delivered
    }

    /// Count of length bytes rejected since construction.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Reset decoder state (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingLength;
    }
}

/// Prefix `payload` with its length.
///
/// Returns `None` for empty or oversized payloads.
pub fn encode_frame(payload: &[u8]) -> Option<Frame> {
    if payload.is_empty() || payload.len() > MAX_MESSAGE_SIZE {
        return None;
    }

    let mut frame = Frame::new();
    frame.push(payload.len() as u8).ok()?;
    frame.extend_from_slice(payload).ok()?;
    Some(frame)
}
