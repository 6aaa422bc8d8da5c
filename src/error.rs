//! Unified error types for the board engine.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! board's and the device workers' error handling uniform. Focused
//! sub-enums (`ProtocolError`, `TagError`) stay `Copy` so they can be
//! passed around the inbound path without allocation.

use core::fmt;

use crate::protocol::message::MessageType;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the engine funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A payload could not be encoded or decoded. Fatal to one message only.
    Protocol(ProtocolError),
    /// Tag allocation or tag-set misuse.
    Tag(TagError),
    /// A command was issued to a device that has not finished configuring.
    DeviceNotReady(String),
    /// A device or group id is already registered on the board.
    DuplicateId(String),
    /// An operation was attempted from a state that does not allow it.
    InvalidTransition(&'static str),
    /// No device or group with this id is registered.
    UnknownDevice(String),
    /// The device has no command registered under this alias.
    UnknownCommand(String),
    /// Supplied parameters do not match the command's declaration.
    InvalidParameters(&'static str),
    /// The transport did not open or become ready before the deadline.
    ConnectTimeout,
    /// The board did not answer a synchronisation request in time.
    SynchroniseTimeout,
    /// The board and its devices did not become ready in time.
    ReadyTimeout,
    /// The board reports a different number of devices than are registered.
    DeviceCountMismatch { local: u8, remote: u8 },
    /// The operation needs an open transport.
    NotConnected,
    /// The transport refused to open.
    TransportOpen(String),
    /// The transport failed while sending. Fatal to the session.
    TransportSend(String),
    /// An `ERROR` message from the board.
    Remote(RemoteError),
    /// The device's command queue is full.
    CommandQueueFull(String),
    /// A command string addressed another board.
    BoardMismatch(String),
    /// A paused request lapsed before it was allowed to proceed.
    RequestExpired(u8),
    /// A device worker thread could not be started.
    Worker(String),
    /// The engine is shutting down.
    Stopping,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Tag(e) => write!(f, "tag: {e}"),
            Self::DeviceNotReady(id) => write!(f, "device {id} is not ready"),
            Self::DuplicateId(id) => write!(f, "id {id} is already registered"),
            Self::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            Self::UnknownDevice(id) => write!(f, "unknown device or group {id}"),
            Self::UnknownCommand(alias) => write!(f, "unknown command {alias}"),
            Self::InvalidParameters(msg) => write!(f, "invalid parameters: {msg}"),
            Self::ConnectTimeout => write!(f, "connect timed out"),
            Self::SynchroniseTimeout => write!(f, "synchronise timed out"),
            Self::ReadyTimeout => write!(f, "board did not become ready"),
            Self::DeviceCountMismatch { local, remote } => {
                write!(f, "device count mismatch (local {local}, board {remote})")
            }
            Self::NotConnected => write!(f, "not connected"),
            Self::TransportOpen(msg) => write!(f, "transport open failed: {msg}"),
            Self::TransportSend(msg) => write!(f, "transport send failed: {msg}"),
            Self::Remote(e) => write!(f, "remote: {e}"),
            Self::CommandQueueFull(id) => write!(f, "command queue for {id} is full"),
            Self::BoardMismatch(id) => write!(f, "command addressed to board {id}"),
            Self::RequestExpired(tag) => write!(f, "request {tag} expired"),
            Self::Worker(msg) => write!(f, "worker: {msg}"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Header too short, or an argument length runs past the buffer end.
    MalformedMessage,
    /// Encoded message would exceed the wire limit.
    MessageTooLarge,
    /// The type byte does not name a known message type.
    UnknownMessageType(u8),
    /// A typed read asked for more bytes than the argument holds.
    ArgumentTypeMismatch,
    /// The argument index is out of range.
    MissingArgument(usize),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedMessage => write!(f, "malformed message"),
            Self::MessageTooLarge => write!(f, "message too large"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type {b}"),
            Self::ArgumentTypeMismatch => write!(f, "argument type mismatch"),
            Self::MissingArgument(i) => write!(f, "missing argument {i}"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Tag errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagError {
    /// All 255 tags are in use and none has expired.
    TagSpaceExhausted,
    /// The tag is not the owner of a tag-set.
    UnknownSet(u8),
    /// The tag-set owner's TTL has lapsed.
    SetExpired(u8),
}

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagSpaceExhausted => write!(f, "tag space exhausted"),
            Self::UnknownSet(t) => write!(f, "tag {t} is not a set"),
            Self::SetExpired(t) => write!(f, "tag set {t} has expired"),
        }
    }
}

impl From<TagError> for Error {
    fn from(e: TagError) -> Self {
        Self::Tag(e)
    }
}

// ---------------------------------------------------------------------------
// Remote errors
// ---------------------------------------------------------------------------

/// An error reported by the board in an `ERROR` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteError {
    pub code: u8,
    pub sub_code: u8,
    /// Message type that provoked the error, when the board includes it.
    pub origin: Option<MessageType>,
}

impl RemoteError {
    /// Code used when an `ERROR` message itself cannot be decoded.
    pub const UNKNOWN_CODE: u8 = 0xFF;

    pub const fn unknown() -> Self {
        Self {
            code: Self::UNKNOWN_CODE,
            sub_code: 0,
            origin: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.code == Self::UNKNOWN_CODE
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "unknown error");
        }
        write!(f, "code {} sub-code {}", self.code, self.sub_code)?;
        if let Some(origin) = self.origin {
            write!(f, " (in reply to {origin:?})")?;
        }
        Ok(())
    }
}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        Self::Remote(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
