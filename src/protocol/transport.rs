//! Transport port: any channel that delivers whole, validated payloads.
//!
//! Concrete implementations:
//! - TCP socket with length-prefix framing (`adapters::tcp`)
//! - in-process simulated boards (integration tests)
//!
//! The board is generic over `Transport`, so adding a serial or BLE link
//! needs no change to the board logic. Inbound data is pushed through the
//! [`Inbound`] handle given to `open`; the transport must serialise its
//! deliveries.

use std::fmt;
use std::sync::Arc;

/// Something the transport observed on the inbound side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// One whole payload, framing already stripped and validated.
    Data(Vec<u8>),
    /// The stream failed with a transport-specific code.
    StreamError(i32),
}

/// Callback handle the transport uses to deliver inbound events.
#[derive(Clone)]
pub struct Inbound(Arc<dyn Fn(InboundEvent) + Send + Sync>);

impl Inbound {
    pub fn new(f: impl Fn(InboundEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn deliver(&self, event: InboundEvent) {
        (self.0)(event);
    }

    pub fn data(&self, payload: &[u8]) {
        self.deliver(InboundEvent::Data(payload.to_vec()));
    }
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Inbound(..)")
    }
}

/// Byte-payload transport channel.
pub trait Transport: Send {
    /// Start opening the link. May return before the link is usable;
    /// the board polls [`is_open`](Self::is_open) and
    /// [`is_ready`](Self::is_ready).
    fn open(&mut self, inbound: Inbound) -> anyhow::Result<()>;

    /// Close the link. Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// True once any transport-level handshake has completed.
    fn is_ready(&self) -> bool;

    /// Send one encoded message.
    fn send(&mut self, payload: &[u8]) -> anyhow::Result<()>;
}

/// A transport that is never open. Placeholder for boards built
/// before their link is known.
pub struct NullTransport;

impl Transport for NullTransport {
    fn open(&mut self, _inbound: Inbound) -> anyhow::Result<()> {
        anyhow::bail!("null transport cannot open")
    }

    fn close(&mut self) {}

    fn is_open(&self) -> bool {
        false
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn send(&mut self, _payload: &[u8]) -> anyhow::Result<()> {
        anyhow::bail!("null transport is not connected")
    }
}
