//! Message codec.
//!
//! Wire format:
//! ```text
//! ┌──────┬─────┬────────┬────────┬───────────────────────────────┐
//! │ type │ tag │ target │ sender │ { len:u8 │ value[len] } ...   │
//! └──────┴─────┴────────┴────────┴───────────────────────────────┘
//! ```
//!
//! The whole message, header included, must fit in [`MAX_MESSAGE_SIZE`]
//! bytes. Arguments are consumed until the input is exhausted.

use heapless::Vec as FrameVec;

use super::message::{Endianness, Message, MessageType};
use crate::error::ProtocolError;

/// Largest encoded message the board accepts.
pub const MAX_MESSAGE_SIZE: usize = 50;

/// Fixed header: type, tag, target, sender.
pub const HEADER_SIZE: usize = 4;

/// An encoded message, bounded by the wire limit.
pub type EncodedMessage = FrameVec<u8, MAX_MESSAGE_SIZE>;

/// Encode `msg` into its wire form.
pub fn encode(msg: &Message) -> Result<EncodedMessage, ProtocolError> {
    if msg.encoded_len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge);
    }

    let mut out = EncodedMessage::new();
    out.extend_from_slice(&[msg.kind as u8, msg.tag, msg.target, msg.sender])
        .map_err(|()| ProtocolError::MessageTooLarge)?;

    for arg in &msg.arguments {
        let len = u8::try_from(arg.len()).map_err(|_| ProtocolError::MessageTooLarge)?;
        out.push(len).map_err(|_| ProtocolError::MessageTooLarge)?;
        out.extend_from_slice(arg)
            .map_err(|()| ProtocolError::MessageTooLarge)?;
    }

    Ok(out)
}

/// Decode a validated payload into a message.
pub fn decode(bytes: &[u8], endianness: Endianness) -> Result<Message, ProtocolError> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge);
    }
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::MalformedMessage);
    }

    let kind = MessageType::from_u8(bytes[0]).ok_or(ProtocolError::UnknownMessageType(bytes[0]))?;
    let mut msg = Message::new(kind).with_endianness(endianness);
    msg.tag = bytes[1];
    msg.target = bytes[2];
    msg.sender = bytes[3];

    let mut offset = HEADER_SIZE;
    while offset < bytes.len() {
        let len = bytes[offset] as usize;
        offset += 1;
        let end = offset + len;
        if end > bytes.len() {
            return Err(ProtocolError::MalformedMessage);
        }
        msg.arguments.push(bytes[offset..end].to_vec());
        offset = end;
    }

    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let mut msg = Message::to_target(MessageType::Command, 3).with_tag(9);
        msg.add_u8(0x21);
        let bytes = encode(&msg).unwrap();
        assert_eq!(bytes.as_slice(), &[7, 9, 3, 3, 1, 0x21]);
    }

    #[test]
    fn header_only_message() {
        let msg = Message::new(MessageType::Ping);
        let bytes = encode(&msg).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(decode(&bytes, Endianness::Little).unwrap(), msg);
    }

    #[test]
    fn empty_argument_survives() {
        let mut msg = Message::new(MessageType::Data);
        msg.add_bytes(&[]).add_u8(1);
        let bytes = encode(&msg).unwrap();
        let back = decode(&bytes, Endianness::Little).unwrap();
        assert_eq!(back.argument_count(), 2);
        assert!(back.get_bytes(0).unwrap().is_empty());
    }

    #[test]
    fn rejects_oversized_message() {
        let mut msg = Message::new(MessageType::Data);
        msg.add_bytes(&[0u8; 45]);
        assert_eq!(msg.encoded_len(), 50);
        assert!(encode(&msg).is_ok());
        msg.add_bytes(&[]);
        assert_eq!(encode(&msg), Err(ProtocolError::MessageTooLarge));
    }

    #[test]
    fn rejects_short_header() {
        assert_eq!(
            decode(&[1, 2, 3], Endianness::Little),
            Err(ProtocolError::MalformedMessage)
        );
    }

    #[test]
    fn rejects_length_past_end() {
        assert_eq!(
            decode(&[11, 0, 1, 1, 5, 1, 2], Endianness::Little),
            Err(ProtocolError::MalformedMessage)
        );
    }

    #[test]
    fn rejects_unknown_type() {
        assert_eq!(
            decode(&[99, 0, 0, 0], Endianness::Little),
            Err(ProtocolError::UnknownMessageType(99))
        );
    }

    #[test]
    fn decode_applies_endianness() {
        let bytes = [11, 0, 2, 2, 2, 0x12, 0x34];
        let little = decode(&bytes, Endianness::Little).unwrap();
        let big = decode(&bytes, Endianness::Big).unwrap();
        assert_eq!(little.get_u16(0).unwrap(), 0x3412);
        assert_eq!(big.get_u16(0).unwrap(), 0x1234);
    }
}
