//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing change and response events to the
//! `log` facade. A broadcast or persistence adapter would implement the
//! same trait.

use log::{debug, info, warn};

use crate::events::{Capability, Event, EventSink, Recipient};

/// Adapter that logs every [`Event`].
///
/// `Data` changes are frequent, so they go out at debug level.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u64,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &Event) {
        self.emitted += 1;
        match event {
            Event::Change(c) if c.capabilities.contains(Capability::Error) => {
                warn!("ERROR | {} | {} -> {}", c.entity_id, c.old, c.new);
            }
            Event::Change(c) if c.capabilities.contains(Capability::Data) => {
                debug!("DATA  | {}.{} = {}", c.entity_id, c.field, c.new);
            }
            Event::Change(c) => {
                info!(
                    "CHANGE| {}.{} | {} -> {}",
                    c.entity_id, c.field, c.old, c.new
                );
            }
            Event::Response {
                recipient,
                source,
                kind,
                tag,
            } => {
                let to = match recipient {
                    Recipient::Owner(owner) => owner.as_str(),
                    Recipient::Broadcast => "*",
                };
                info!("REPLY | {} {:?} tag={} -> {}", source, kind, tag, to);
            }
        }
    }
}
