//! Host-side engine for microcontroller boards and their devices.
//!
//! Drives a board over any byte [`Transport`](protocol::Transport):
//! compact binary messages, one-byte request tags with expiry, a board
//! handshake followed by one per device, and per-device command workers
//! that turn compound commands into wire messages.
//!
//! Nothing here installs a logger or touches the filesystem; the
//! embedding application supplies the transport, the `log` backend and
//! any [`SnapshotStore`](snapshot::SnapshotStore).

#![deny(unused_must_use)]

pub mod adapters;
pub mod board;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod protocol;
pub mod snapshot;
pub mod tracking;

pub use board::{Board, BoardState};
pub use config::{AttachmentMode, BoardConfig};
pub use device::{Device, DeviceGroup, DeviceState};
pub use error::{Error, Result};
