//! The `Message` value type and typed argument access.
//!
//! A message is a fixed header (type, tag, target, sender) followed by
//! an ordered list of raw byte arguments. Arguments carry no type on the
//! wire; readers convert them with the message's [`Endianness`].

use crate::error::ProtocolError;

/// Target/sender id addressing the board itself.
pub const BOARD_ID: u8 = 0;

/// Tag value meaning "no tag assigned".
pub const NO_TAG: u8 = 0;

// ---------------------------------------------------------------------------
// Message type
// ---------------------------------------------------------------------------

/// Every message type understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Initialise = 1,
    InitialiseResponse = 2,
    Configure = 3,
    ConfigureResponse = 4,
    StatusRequest = 5,
    StatusResponse = 6,
    Command = 7,
    CommandResponse = 8,
    Ping = 9,
    PingResponse = 10,
    Data = 11,
    Error = 12,
    Finalise = 13,
}

impl MessageType {
    pub const ALL: [MessageType; 13] = [
        Self::Initialise,
        Self::InitialiseResponse,
        Self::Configure,
        Self::ConfigureResponse,
        Self::StatusRequest,
        Self::StatusResponse,
        Self::Command,
        Self::CommandResponse,
        Self::Ping,
        Self::PingResponse,
        Self::Data,
        Self::Error,
        Self::Finalise,
    ];

    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| *t as u8 == raw)
    }

    /// True for the types a board sends in answer to a host request.
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::InitialiseResponse
                | Self::ConfigureResponse
                | Self::StatusResponse
                | Self::CommandResponse
                | Self::PingResponse
        )
    }
}

// ---------------------------------------------------------------------------
// Endianness
// ---------------------------------------------------------------------------

/// Byte order used to convert argument bytes to integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    pub fn from_little(little: bool) -> Self {
        if little { Self::Little } else { Self::Big }
    }

    fn write(self, value: u32, width: usize) -> Vec<u8> {
        let bytes = match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        };
        match self {
            Self::Little => bytes[..width].to_vec(),
            Self::Big => bytes[4 - width..].to_vec(),
        }
    }

    /// Read the low-order `width` bytes of `raw` as an unsigned integer.
    fn read(self, raw: &[u8], width: usize) -> Result<u32, ProtocolError> {
        if raw.len() < width {
            return Err(ProtocolError::ArgumentTypeMismatch);
        }
        let bytes = match self {
            Self::Little => &raw[..width],
            Self::Big => &raw[raw.len() - width..],
        };
        let mut value = 0u32;
        match self {
            Self::Little => {
                for b in bytes.iter().rev() {
                    value = (value << 8) | u32::from(*b);
                }
            }
            Self::Big => {
                for b in bytes {
                    value = (value << 8) | u32::from(*b);
                }
            }
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageType,
    pub tag: u8,
    pub target: u8,
    pub sender: u8,
    pub arguments: Vec<Vec<u8>>,
    /// Not encoded; decides how integer arguments are read and written.
    pub endianness: Endianness,
}

impl Message {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            tag: NO_TAG,
            target: BOARD_ID,
            sender: BOARD_ID,
            arguments: Vec::new(),
            endianness: Endianness::default(),
        }
    }

    /// A message addressed to `target`, with `sender` mirroring it.
    pub fn to_target(kind: MessageType, target: u8) -> Self {
        let mut msg = Self::new(kind);
        msg.target = target;
        msg.sender = target;
        msg
    }

    pub fn with_tag(mut self, tag: u8) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    // ── Builders ──────────────────────────────────────────────

    pub fn add_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.arguments.push(bytes.to_vec());
        self
    }

    pub fn add_bool(&mut self, value: bool) -> &mut Self {
        self.add_bytes(&[u8::from(value)])
    }

    pub fn add_u8(&mut self, value: u8) -> &mut Self {
        self.add_bytes(&[value])
    }

    pub fn add_u16(&mut self, value: u16) -> &mut Self {
        let bytes = self.endianness.write(u32::from(value), 2);
        self.arguments.push(bytes);
        self
    }

    pub fn add_i16(&mut self, value: i16) -> &mut Self {
        self.add_u16(value as u16)
    }

    pub fn add_u32(&mut self, value: u32) -> &mut Self {
        let bytes = self.endianness.write(value, 4);
        self.arguments.push(bytes);
        self
    }

    pub fn add_i32(&mut self, value: i32) -> &mut Self {
        self.add_u32(value as u32)
    }

    pub fn add_str(&mut self, value: &str) -> &mut Self {
        self.add_bytes(value.as_bytes())
    }

    // ── Typed access ──────────────────────────────────────────

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    pub fn has_argument(&self, index: usize) -> bool {
        index < self.arguments.len()
    }

    pub fn get_bytes(&self, index: usize) -> Result<&[u8], ProtocolError> {
        self.arguments
            .get(index)
            .map(Vec::as_slice)
            .ok_or(ProtocolError::MissingArgument(index))
    }

    pub fn get_bool(&self, index: usize) -> Result<bool, ProtocolError> {
        Ok(self.get_u8(index)? != 0)
    }

    pub fn get_u8(&self, index: usize) -> Result<u8, ProtocolError> {
        let raw = self.get_bytes(index)?;
        Ok(self.endianness.read(raw, 1)? as u8)
    }

    pub fn get_u16(&self, index: usize) -> Result<u16, ProtocolError> {
        let raw = self.get_bytes(index)?;
        Ok(self.endianness.read(raw, 2)? as u16)
    }

    pub fn get_i16(&self, index: usize) -> Result<i16, ProtocolError> {
        Ok(self.get_u16(index)? as i16)
    }

    pub fn get_u32(&self, index: usize) -> Result<u32, ProtocolError> {
        let raw = self.get_bytes(index)?;
        self.endianness.read(raw, 4)
    }

    pub fn get_i32(&self, index: usize) -> Result<i32, ProtocolError> {
        Ok(self.get_u32(index)? as i32)
    }

    /// Argument as UTF-8 text; invalid sequences are replaced.
    pub fn get_string(&self, index: usize) -> Result<String, ProtocolError> {
        let raw = self.get_bytes(index)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    /// Total encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        super::codec::HEADER_SIZE + self.arguments.iter().map(|a| 1 + a.len()).sum::<usize>()
    }
}
