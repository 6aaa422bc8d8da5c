//! Board wire protocol.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Protocol Stack                          │
//! │                                                            │
//! │  ┌───────────┐   ┌──────────┐   ┌───────────────────────┐  │
//! │  │ Transport │──▶│  Codec   │──▶│  Board (router)       │  │
//! │  │ (trait)   │   │ (decode) │   │  → Board / Device     │  │
//! │  └───────────┘   └──────────┘   └───────────────────────┘  │
//! │       ▲                                    │               │
//! │       │              ┌─────────────────────┘               │
//! │       │              ▼                                     │
//! │  ┌───────────┐   ┌──────────┐                              │
//! │  │ Transport │◀──│  Codec   │                              │
//! │  │ (send)    │   │ (encode) │                              │
//! │  └───────────┘   └──────────┘                              │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod frame;
pub mod message;
pub mod transport;

pub use codec::{MAX_MESSAGE_SIZE, decode, encode};
pub use message::{BOARD_ID, Endianness, Message, MessageType, NO_TAG};
pub use transport::{Inbound, InboundEvent, Transport};
