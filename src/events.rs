//! Change events, property capability tables and the outbound event bus.
//!
//! Every observable mutation of a board or device produces a
//! [`ChangeEvent`]. Each field an entity exposes is declared once in a
//! static property table (see [`Described`]) together with the
//! capabilities that decide how consumers treat it (logged, broadcast,
//! persisted).
//!
//! ```text
//!   Board / Device ──publish()──▶ EventBus (bounded) ──▶ EventSink (port)
//! ```
//!
//! The bus never blocks a publisher: when full, the event is dropped
//! with a warning.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future::block_on;

use crate::protocol::MessageType;
use crate::snapshot::FieldValue;

// ───────────────────────────────────────────────────────────────
// Capabilities
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Capability {
    Identifier = 0,
    Descriptor = 1,
    State = 2,
    Data = 3,
    MetaData = 4,
    Error = 5,
    Serializable = 6,
}

impl Capability {
    /// Bit mask for this capability in a [`CapabilitySet`].
    pub const fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const EMPTY: Self = Self(0);

    pub const fn of(caps: &[Capability]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < caps.len() {
            bits |= caps[i].mask();
            i += 1;
        }
        Self(bits)
    }

    pub const fn contains(self, cap: Capability) -> bool {
        self.0 & cap.mask() != 0
    }

    pub const fn with(self, cap: Capability) -> Self {
        Self(self.0 | cap.mask())
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// One entry of an entity's property table.
#[derive(Debug, Clone, Copy)]
pub struct Property {
    pub name: &'static str,
    pub caps: CapabilitySet,
}

impl Property {
    pub const fn new(name: &'static str, caps: &[Capability]) -> Self {
        Self {
            name,
            caps: CapabilitySet::of(caps),
        }
    }
}

/// Entities that declare their observable fields statically.
pub trait Described {
    const PROPERTIES: &'static [Property];

    fn capabilities_of(field: &str) -> CapabilitySet {
        capabilities_in(Self::PROPERTIES, field)
    }
}

/// Look `field` up in a property table.
pub fn capabilities_in(table: &[Property], field: &str) -> CapabilitySet {
    table
        .iter()
        .find(|p| p.name == field)
        .map_or(CapabilitySet::EMPTY, |p| p.caps)
}

// ───────────────────────────────────────────────────────────────
// Events
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity_id: String,
    pub field: &'static str,
    pub old: FieldValue,
    pub new: FieldValue,
    pub capabilities: CapabilitySet,
}

/// Who a response event is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Owner(String),
    Broadcast,
}

impl Recipient {
    pub fn from_owner(owner: Option<&str>) -> Self {
        owner.map_or(Self::Broadcast, |o| Self::Owner(o.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Change(ChangeEvent),
    /// A board or device handled an inbound message.
    Response {
        recipient: Recipient,
        source: String,
        kind: MessageType,
        tag: u8,
    },
}

/// Collects the changes made while an entity's lock is held so they can
/// be published after it is released.
#[derive(Debug)]
pub struct ChangeSet {
    entity_id: String,
    changes: Vec<ChangeEvent>,
}

impl ChangeSet {
    pub fn new(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_owned(),
            changes: Vec::new(),
        }
    }

    /// Record a change of `field` on a `T`. No-op when unchanged.
    pub fn record<T: Described>(
        &mut self,
        field: &'static str,
        old: impl Into<FieldValue>,
        new: impl Into<FieldValue>,
    ) {
        self.record_in(T::PROPERTIES, field, old, new);
    }

    /// Record a change of a field declared in `table`.
    pub fn record_in(
        &mut self,
        table: &[Property],
        field: &'static str,
        old: impl Into<FieldValue>,
        new: impl Into<FieldValue>,
    ) {
        let (old, new) = (old.into(), new.into());
        if old == new {
            return;
        }
        self.changes.push(ChangeEvent {
            entity_id: self.entity_id.clone(),
            field,
            old,
            new,
            capabilities: capabilities_in(table, field),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_events(self) -> impl Iterator<Item = Event> {
        self.changes.into_iter().map(Event::Change)
    }
}

// ───────────────────────────────────────────────────────────────
// Event bus
// ───────────────────────────────────────────────────────────────

/// Bus depth.
pub const EVENT_BUS_DEPTH: usize = 64;

type EventChannel = Channel<CriticalSectionRawMutex, Event, EVENT_BUS_DEPTH>;

/// Bounded multi-producer event channel. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    channel: Arc<EventChannel>,
    dropped: Arc<AtomicU32>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(Channel::new()),
            dropped: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Publish without blocking. Drops the event when the bus is full.
    pub fn publish(&self, event: Event) {
        if self.channel.try_send(event).is_err() {
            let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            log::warn!("EventBus: full, dropped event ({} total)", n);
        }
    }

    pub fn try_next(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    /// Block until an event arrives.
    pub fn next_blocking(&self) -> Event {
        block_on(self.channel.receive())
    }

    /// Take every queued event.
    pub fn drain(&self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

/// Consumer of published events (logging, broadcast, persistence).
pub trait EventSink {
    fn emit(&mut self, event: &Event);
}

/// Forward every queued event on `bus` to `sink`. Returns the count.
pub fn pump(bus: &EventBus, sink: &mut dyn EventSink) -> usize {
    let mut n = 0;
    while let Some(event) = bus.try_next() {
        sink.emit(&event);
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thing;

    impl Described for Thing {
        const PROPERTIES: &'static [Property] = &[
            Property::new("id", &[Capability::Identifier]),
            Property::new("enabled", &[Capability::State, Capability::Serializable]),
        ];
    }

    #[test]
    fn capability_masks() {
        let caps = CapabilitySet::of(&[Capability::State, Capability::Serializable]);
        assert!(caps.contains(Capability::State));
        assert!(caps.contains(Capability::Serializable));
        assert!(!caps.contains(Capability::Data));
        assert_eq!(caps.bits(), 0b0100_0100);
        assert!(caps.with(Capability::Data).contains(Capability::Data));
    }

    #[test]
    fn property_lookup() {
        assert!(Thing::capabilities_of("enabled").contains(Capability::Serializable));
        assert!(Thing::capabilities_of("missing").is_empty());
    }

    #[test]
    fn change_set_skips_unchanged() {
        let mut changes = ChangeSet::new("t1");
        changes.record::<Thing>("enabled", false, false);
        assert!(changes.is_empty());
        changes.record::<Thing>("enabled", false, true);
        let events: Vec<_> = changes.into_events().collect();
        assert_eq!(events.len(), 1);
        let Event::Change(change) = &events[0] else {
            panic!("expected change event");
        };
        assert_eq!(change.entity_id, "t1");
        assert!(change.capabilities.contains(Capability::State));
    }

    #[test]
    fn bus_drops_when_full() {
        let bus = EventBus::new();
        for i in 0..EVENT_BUS_DEPTH + 3 {
            bus.publish(Event::Response {
                recipient: Recipient::Broadcast,
                source: "b1".into(),
                kind: MessageType::PingResponse,
                tag: i as u8,
            });
        }
        assert_eq!(bus.len(), EVENT_BUS_DEPTH);
        assert_eq!(bus.dropped(), 3);
        assert_eq!(bus.drain().len(), EVENT_BUS_DEPTH);
        assert!(bus.is_empty());
    }

    #[test]
    fn recipient_from_owner() {
        assert_eq!(Recipient::from_owner(Some("a")), Recipient::Owner("a".into()));
        assert_eq!(Recipient::from_owner(None), Recipient::Broadcast);
    }
}
