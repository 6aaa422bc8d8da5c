//! What a device needs from the board it is attached to.
//!
//! Devices hold a `Weak<dyn BoardLink>`; the board owns its devices,
//! never the reverse.

use std::time::Duration;

use crate::config::AttachmentMode;
use crate::error::Result;
use crate::events::Event;
use crate::protocol::{Endianness, Message};
use crate::tracking::Request;

pub trait BoardLink: Send + Sync {
    fn board_id(&self) -> &str;

    /// Encode and send one message.
    fn send(&self, msg: Message) -> Result<()>;

    /// Allocate a tracked request on the board's tracker.
    fn track(&self, owner: Option<&str>, ttl: Duration) -> Result<Request>;

    fn track_set(&self, owner: Option<&str>, ttl: Duration) -> Result<Request>;

    fn track_in_set(&self, set: u8) -> Result<Request>;

    /// Release a tag that will never see a response.
    fn release(&self, tag: u8) -> Option<Request>;

    fn publish(&self, event: Event);

    fn endianness(&self) -> Endianness;

    fn attachment_mode(&self) -> AttachmentMode;

    /// Cooperative shutdown flag; long waits must poll it.
    fn is_stopping(&self) -> bool;

    fn request_ttl(&self) -> Duration;

    fn command_ttl_margin(&self) -> Duration;

    /// A device reached `Initialised` and is about to configure.
    fn device_initialised(&self) {}
}
