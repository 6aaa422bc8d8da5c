//! Board controller: one session with one microcontroller.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ Board                                                          │
//! │                                                                │
//! │  begin() ─▶ connect ─▶ INITIALISE ─▶ CONFIGURE ─▶ devices ─▶ ready
//! │                                                                │
//! │  ┌──────────────┐   ┌────────────────┐   ┌──────────────────┐  │
//! │  │ Transport    │──▶│ inbound router │──▶│ Device[1..n]     │  │
//! │  │ (port)       │   │ (one at a time)│   │ handle_message   │  │
//! │  └──────▲───────┘   └───────┬────────┘   └────────┬─────────┘  │
//! │         │                   │ release tag         │ workers    │
//! │         │           ┌───────▼────────┐            │            │
//! │         └── send ───│ RequestTracker │◀── track ──┘            │
//! │                     └────────────────┘                         │
//! │  supervisor thread: reconnect / synchronise / inactivity       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Devices live in an arena owned by the board; a device's wire address
//! is its arena index plus one. Devices reach back through a
//! `Weak<dyn BoardLink>`.

pub mod state;

mod commands;
mod inbound;
mod supervisor;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

pub use state::BoardState;

use crate::config::{AttachmentMode, BoardConfig, ConfigError};
use crate::device::worker::WAIT_SLICE;
use crate::device::{BoardLink, Device, DeviceGroup};
use crate::error::{Error, RemoteError, Result};
use crate::events::{Capability, ChangeSet, Described, Event, EventBus, Property};
use crate::protocol::{BOARD_ID, Endianness, Inbound, Message, MessageType, Transport, encode};
use crate::snapshot::{Persistable, SnapshotStore, StoreError, restore_entity, save_entity};
use crate::tracking::{Request, RequestTracker};
use supervisor::Supervisor;

// ───────────────────────────────────────────────────────────────
// Registry
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct Registry {
    devices: Vec<Arc<Device>>,
    index: HashMap<String, usize>,
    groups: HashMap<String, DeviceGroup>,
}

impl Registry {
    fn device(&self, id: &str) -> Option<Arc<Device>> {
        self.index.get(id).map(|&i| Arc::clone(&self.devices[i]))
    }

    fn at_address(&self, address: u8) -> Option<Arc<Device>> {
        usize::from(address)
            .checked_sub(1)
            .and_then(|i| self.devices.get(i))
            .cloned()
    }

    fn is_taken(&self, id: &str) -> bool {
        self.index.contains_key(id) || self.groups.contains_key(id)
    }
}

/// Resolved target of a command.
pub(crate) enum Target {
    Device(Arc<Device>),
    Group(DeviceGroup),
}

// ───────────────────────────────────────────────────────────────
// Session
// ───────────────────────────────────────────────────────────────

struct Session {
    state: BoardState,
    error: Option<RemoteError>,
    last_activity: Option<Instant>,
    last_ping: Option<Instant>,
    /// Device capacity reported by the board.
    capacity: Option<u8>,
    /// Set when a status response disagrees with the registry.
    count_mismatch: Option<Error>,
}

pub(crate) struct BoardCore {
    me: Weak<BoardCore>,
    config: BoardConfig,
    endianness: Endianness,
    registry: RwLock<Registry>,
    session: Mutex<Session>,
    tracker: Mutex<RequestTracker>,
    transport: Mutex<Box<dyn Transport>>,
    /// Serialises inbound payloads.
    inbound: Mutex<()>,
    connecting: AtomicBool,
    stopping: AtomicBool,
    synchronised: AtomicBool,
    supervising: AtomicBool,
    supervisor: Mutex<Option<Supervisor>>,
    events: EventBus,
}

impl Described for Board {
    const PROPERTIES: &'static [Property] = &[
        Property::new("id", &[Capability::Identifier]),
        Property::new("name", &[Capability::Descriptor]),
        Property::new("state", &[Capability::State]),
        Property::new("attachment_mode", &[Capability::MetaData]),
        Property::new("error", &[Capability::Error]),
    ];
}

impl BoardCore {
    fn id(&self) -> &str {
        &self.config.board_id
    }

    fn devices(&self) -> Vec<Arc<Device>> {
        self.registry.read().devices.clone()
    }

    fn device_count(&self) -> usize {
        self.registry.read().devices.len()
    }

    fn device_at(&self, address: u8) -> Option<Arc<Device>> {
        self.registry.read().at_address(address)
    }

    pub(crate) fn target(&self, id: &str) -> Result<Target> {
        let registry = self.registry.read();
        if let Some(device) = registry.device(id) {
            return Ok(Target::Device(device));
        }
        registry
            .groups
            .get(id)
            .cloned()
            .map(Target::Group)
            .ok_or_else(|| Error::UnknownDevice(id.to_owned()))
    }

    fn state(&self) -> BoardState {
        self.session.lock().state
    }

    fn set_state(&self, next: BoardState) {
        let previous = {
            let mut session = self.session.lock();
            std::mem::replace(&mut session.state, next)
        };
        if previous == next {
            return;
        }
        if next.is_failed() {
            warn!("Board[{}]: {} -> {}", self.id(), previous, next);
        } else {
            info!("Board[{}]: {} -> {}", self.id(), previous, next);
        }
        let mut changes = ChangeSet::new(self.id());
        changes.record::<Board>("state", previous.name(), next.name());
        self.publish_changes(changes);
    }

    fn record_error(&self, err: RemoteError) {
        let previous = self.session.lock().error.replace(err);
        let mut changes = ChangeSet::new(self.id());
        changes.record::<Board>(
            "error",
            previous.map(|e| e.to_string()),
            Some(err.to_string()),
        );
        self.publish_changes(changes);
    }

    fn publish_changes(&self, changes: ChangeSet) {
        for event in changes.into_events() {
            self.events.publish(event);
        }
    }

    // ── Connection ────────────────────────────────────────────

    fn is_connected(&self) -> bool {
        let transport = self.transport.lock();
        transport.is_open() && transport.is_ready()
    }

    /// Open the transport and wait until it is open and ready.
    fn connect(&self, timeout: Duration) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        if self.connecting.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidTransition("connect already in progress"));
        }
        let result = self.open_transport(timeout);
        if let Err(e) = &result {
            warn!("Board[{}]: connect failed: {}", self.id(), e);
            self.transport.lock().close();
        }
        self.connecting.store(false, Ordering::SeqCst);
        result
    }

    fn open_transport(&self, timeout: Duration) -> Result<()> {
        let me = self.me.clone();
        let inbound = Inbound::new(move |event| {
            if let Some(core) = me.upgrade() {
                core.on_event(event);
            }
        });
        self.transport
            .lock()
            .open(inbound)
            .map_err(|e| Error::TransportOpen(e.to_string()))?;

        let deadline = Instant::now() + timeout;
        let interval = self.config.connect_poll_interval();
        self.poll_until(deadline, interval, Error::ConnectTimeout, || {
            self.transport.lock().is_open()
        })?;
        self.poll_until(deadline, interval, Error::ConnectTimeout, || {
            self.transport.lock().is_ready()
        })?;
        info!("Board[{}]: connected", self.id());
        Ok(())
    }

    /// Close the transport and end the session. Idempotent.
    fn disconnect(&self) {
        self.synchronised.store(false, Ordering::SeqCst);
        self.transport.lock().close();
        self.tracker.lock().clear();
        for device in self.devices() {
            device.reset();
        }
        {
            let mut session = self.session.lock();
            session.capacity = None;
            session.last_activity = None;
        }
        if self.state() != BoardState::Created {
            info!("Board[{}]: disconnected", self.id());
        }
        self.set_state(BoardState::Created);
    }

    /// Disconnect from a fresh thread, so it is safe from inside the
    /// inbound callback or while the transport lock is held.
    fn disconnect_async(&self) {
        let me = self.me.clone();
        let spawned = thread::Builder::new()
            .name(format!("disconnect-{}", self.id()))
            .spawn(move || {
                if let Some(core) = me.upgrade() {
                    core.disconnect();
                }
            });
        if let Err(e) = spawned {
            error!("Board[{}]: cannot spawn disconnect: {}", self.id(), e);
        }
    }

    /// Sleep in slices until `done` holds, the deadline passes or the
    /// board starts stopping.
    fn poll_until(
        &self,
        deadline: Instant,
        interval: Duration,
        timeout: Error,
        done: impl Fn() -> bool,
    ) -> Result<()> {
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                return Err(Error::Stopping);
            }
            if done() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(timeout);
            }
            thread::sleep(interval.min(deadline - now));
        }
    }

    // ── Session ───────────────────────────────────────────────

    /// One begin attempt: reconnect, handshake, wait for readiness and
    /// synchronise.
    fn start_session(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        self.disconnect();
        self.set_state(BoardState::Beginning);
        self.connect(self.config.connect_timeout().min(timeout))?;
        self.set_state(BoardState::Begun);
        self.initialise()?;
        self.poll_until(
            deadline,
            self.config.ready_poll_interval(),
            Error::ReadyTimeout,
            || self.is_ready(),
        )?;
        self.synchronise(self.config.synchronise_timeout())
    }

    /// Send the board-level `INITIALISE`: attachment mode, device count,
    /// analog reference. Devices restart their own handshake afterwards.
    fn initialise(&self) -> Result<()> {
        let count = u8::try_from(self.device_count())
            .map_err(|_| Error::InvalidParameters("more than 255 devices"))?;
        let mut msg = self.board_message(MessageType::Initialise);
        msg.add_u8(self.config.attachment_mode as u8)
            .add_u8(count)
            .add_u8(self.config.analog_reference as u8);

        self.synchronised.store(false, Ordering::SeqCst);
        for device in self.devices() {
            device.reset();
        }
        let previous = self.state();
        self.set_state(BoardState::Initialising);
        if let Err(e) = self.send(msg) {
            self.set_state(previous);
            return Err(e);
        }
        Ok(())
    }

    /// Send the board-level `CONFIGURE`.
    fn configure(&self) -> Result<()> {
        self.set_state(BoardState::Configuring);
        self.send(self.board_message(MessageType::Configure))
    }

    /// Request status and wait for a matching device count.
    fn synchronise(&self, timeout: Duration) -> Result<()> {
        self.synchronised.store(false, Ordering::SeqCst);
        self.session.lock().count_mismatch = None;
        self.send(self.board_message(MessageType::StatusRequest))?;

        let deadline = Instant::now() + timeout;
        self.poll_until(deadline, WAIT_SLICE, Error::SynchroniseTimeout, || {
            self.synchronised.load(Ordering::SeqCst)
                || self.session.lock().count_mismatch.is_some()
        })?;
        match self.session.lock().count_mismatch.take() {
            Some(mismatch) => Err(mismatch),
            None => {
                debug!("Board[{}]: synchronised", self.id());
                Ok(())
            }
        }
    }

    fn is_ready(&self) -> bool {
        if !self.is_connected() {
            return false;
        }
        let devices = self.devices();
        if devices.is_empty() {
            matches!(
                self.state(),
                BoardState::Configured | BoardState::DeviceConfigured
            )
        } else {
            devices.iter().all(|d| d.is_ready())
        }
    }

    fn idle_for(&self) -> Option<Duration> {
        self.session.lock().last_activity.map(|t| t.elapsed())
    }

    fn board_message(&self, kind: MessageType) -> Message {
        Message::to_target(kind, BOARD_ID).with_endianness(self.endianness)
    }

    fn send_request(&self, kind: MessageType, requester: Option<&str>) -> Result<Option<Request>> {
        let request = match requester {
            Some(owner) => Some(self.track(Some(owner), self.config.request_ttl())?),
            None => None,
        };
        let tag = request.as_ref().map_or(0, |r| r.tag);
        if let Err(e) = self.send(self.board_message(kind).with_tag(tag)) {
            if request.is_some() {
                self.tracker.lock().release(tag);
            }
            return Err(e);
        }
        Ok(request)
    }
}

impl BoardLink for BoardCore {
    fn board_id(&self) -> &str {
        self.id()
    }

    fn send(&self, msg: Message) -> Result<()> {
        let frame = encode(&msg)?;
        let mut transport = self.transport.lock();
        let usable = transport.is_ready()
            || (self.connecting.load(Ordering::SeqCst) && transport.is_open());
        if !usable {
            return Err(Error::NotConnected);
        }
        if let Err(e) = transport.send(&frame) {
            drop(transport);
            error!("Board[{}]: send failed: {}", self.id(), e);
            self.disconnect_async();
            return Err(Error::TransportSend(e.to_string()));
        }
        debug!(
            "Board[{}]: sent {:?} tag {} to {}",
            self.id(),
            msg.kind,
            msg.tag,
            msg.target
        );
        Ok(())
    }

    fn track(&self, owner: Option<&str>, ttl: Duration) -> Result<Request> {
        Ok(self.tracker.lock().add(owner, ttl)?)
    }

    fn track_set(&self, owner: Option<&str>, ttl: Duration) -> Result<Request> {
        Ok(self.tracker.lock().add_set(owner, ttl)?)
    }

    fn track_in_set(&self, set: u8) -> Result<Request> {
        Ok(self.tracker.lock().add_in_set(set)?)
    }

    fn release(&self, tag: u8) -> Option<Request> {
        self.tracker.lock().release(tag)
    }

    fn publish(&self, event: Event) {
        self.events.publish(event);
    }

    fn endianness(&self) -> Endianness {
        self.endianness
    }

    fn attachment_mode(&self) -> AttachmentMode {
        self.config.attachment_mode
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn request_ttl(&self) -> Duration {
        self.config.request_ttl()
    }

    fn command_ttl_margin(&self) -> Duration {
        self.config.command_ttl_margin()
    }

    fn device_initialised(&self) {
        self.update_aggregate();
    }
}

// ───────────────────────────────────────────────────────────────
// Public handle
// ───────────────────────────────────────────────────────────────

/// Host-side controller for one board and its devices.
pub struct Board {
    core: Arc<BoardCore>,
}

impl Board {
    pub fn new(
        config: BoardConfig,
        transport: impl Transport + 'static,
    ) -> core::result::Result<Self, ConfigError> {
        config.validate()?;
        let endianness = Endianness::from_little(config.little_endian);
        let core = Arc::new_cyclic(|me| BoardCore {
            me: me.clone(),
            config,
            endianness,
            registry: RwLock::new(Registry::default()),
            session: Mutex::new(Session {
                state: BoardState::Created,
                error: None,
                last_activity: None,
                last_ping: None,
                capacity: None,
                count_mismatch: None,
            }),
            tracker: Mutex::new(RequestTracker::new()),
            transport: Mutex::new(Box::new(transport)),
            inbound: Mutex::new(()),
            connecting: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            synchronised: AtomicBool::new(false),
            supervising: AtomicBool::new(false),
            supervisor: Mutex::new(None),
            events: EventBus::new(),
        });
        Ok(Self { core })
    }

    pub fn id(&self) -> &str {
        self.core.id()
    }

    pub fn name(&self) -> &str {
        &self.core.config.name
    }

    pub fn config(&self) -> &BoardConfig {
        &self.core.config
    }

    pub fn state(&self) -> BoardState {
        self.core.state()
    }

    pub fn last_error(&self) -> Option<RemoteError> {
        self.core.session.lock().error
    }

    pub fn last_ping_at(&self) -> Option<Instant> {
        self.core.session.lock().last_ping
    }

    /// Device capacity the board reported in its `INITIALISE_RESPONSE`.
    pub fn capacity(&self) -> Option<u8> {
        self.core.session.lock().capacity
    }

    /// Change and response events from the board and its devices.
    pub fn events(&self) -> &EventBus {
        &self.core.events
    }

    /// Live outstanding requests.
    pub fn outstanding_requests(&self) -> usize {
        let mut tracker = self.core.tracker.lock();
        tracker.sweep();
        tracker.len()
    }

    // ── Registry ──────────────────────────────────────────────

    /// Register a device. Its address is its registration order,
    /// starting at 1.
    pub fn add_device(&self, device: Arc<Device>) -> Result<()> {
        if self.state() >= BoardState::Initialising {
            return Err(Error::InvalidTransition(
                "devices can only be added before initialising",
            ));
        }
        let mut registry = self.core.registry.write();
        if registry.is_taken(device.id()) {
            return Err(Error::DuplicateId(device.id().to_owned()));
        }
        let address = u8::try_from(registry.devices.len() + 1)
            .map_err(|_| Error::InvalidParameters("more than 255 devices"))?;
        let me = Arc::downgrade(&self.core);
        let link: Weak<dyn BoardLink> = me;
        device.attach(address, link)?;
        let slot = registry.devices.len();
        registry.index.insert(device.id().to_owned(), slot);
        registry.devices.push(device);
        Ok(())
    }

    /// Register a named group of already registered devices.
    pub fn add_device_group(&self, id: &str, device_ids: &[&str]) -> Result<()> {
        if self.state() >= BoardState::Initialising {
            return Err(Error::InvalidTransition(
                "groups can only be added before initialising",
            ));
        }
        let mut registry = self.core.registry.write();
        if registry.is_taken(id) {
            return Err(Error::DuplicateId(id.to_owned()));
        }
        let members = device_ids
            .iter()
            .map(|d| {
                registry
                    .device(d)
                    .ok_or_else(|| Error::UnknownDevice((*d).to_owned()))
            })
            .collect::<Result<Vec<_>>>()?;
        registry
            .groups
            .insert(id.to_owned(), DeviceGroup::new(id, members));
        Ok(())
    }

    pub fn device(&self, id: &str) -> Option<Arc<Device>> {
        self.core.registry.read().device(id)
    }

    pub fn group(&self, id: &str) -> Option<DeviceGroup> {
        self.core.registry.read().groups.get(id).cloned()
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.core.devices()
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Open the transport. Returns at once if already connected.
    pub fn connect(&self, timeout: Duration) -> Result<()> {
        self.core.connect(timeout)
    }

    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    /// Close the transport and reset every device. Idempotent.
    pub fn disconnect(&self) {
        self.core.disconnect();
    }

    /// Connect, run the board and device handshakes, synchronise, then
    /// start the supervisor. Retries up to `max_begin_attempts` times.
    pub fn begin(&self, timeout: Duration) -> Result<()> {
        let core = &self.core;
        if core.stopping.load(Ordering::SeqCst) {
            return Err(Error::Stopping);
        }
        let attempts = core.config.max_begin_attempts.max(1);
        let mut last = Error::ReadyTimeout;
        for attempt in 1..=attempts {
            match core.start_session(timeout) {
                Ok(()) => {
                    info!("Board[{}]: ready", self.id());
                    self.start_supervisor()?;
                    return Ok(());
                }
                Err(Error::Stopping) => return Err(Error::Stopping),
                Err(e) => {
                    warn!(
                        "Board[{}]: begin attempt {}/{} failed: {}",
                        self.id(),
                        attempt,
                        attempts,
                        e
                    );
                    last = e;
                }
            }
        }
        core.disconnect();
        Err(last)
    }

    /// Re-send the board-level `INITIALISE`.
    pub fn initialise(&self) -> Result<()> {
        self.core.initialise()
    }

    /// Re-send the board-level `CONFIGURE`.
    pub fn configure(&self) -> Result<()> {
        self.core.configure()
    }

    /// Request status and wait until the board confirms the registry.
    pub fn synchronise(&self, timeout: Duration) -> Result<()> {
        self.core.synchronise(timeout)
    }

    pub fn is_synchronised(&self) -> bool {
        self.core.synchronised.load(Ordering::SeqCst)
    }

    /// Connected and handshaken: the board itself when it has no
    /// devices, otherwise every device.
    pub fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    pub fn request_status(&self, requester: Option<&str>) -> Result<Option<Request>> {
        self.core.send_request(MessageType::StatusRequest, requester)
    }

    pub fn ping(&self, requester: Option<&str>) -> Result<Option<Request>> {
        self.core.send_request(MessageType::Ping, requester)
    }

    /// Send a raw message through the board's transport.
    pub fn send(&self, msg: Message) -> Result<()> {
        self.core.send(msg)
    }

    /// Feed one inbound payload, as the transport does.
    pub fn on_data(&self, payload: &[u8]) {
        self.core.on_data(payload);
    }

    /// Run one supervisor pass now. Returns false if a pass was already
    /// running.
    pub fn supervise(&self) -> bool {
        self.core.supervise()
    }

    fn start_supervisor(&self) -> Result<()> {
        let mut slot = self.core.supervisor.lock();
        if slot.is_none() {
            *slot = Some(Supervisor::spawn(
                Arc::downgrade(&self.core),
                self.id(),
                self.core.config.supervisor_interval(),
            )?);
        }
        Ok(())
    }

    /// Stop the supervisor and the device workers, then disconnect.
    pub fn end(&self) {
        let core = &self.core;
        if core.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Board[{}]: stopping", self.id());
        let supervisor = core.supervisor.lock().take();
        if let Some(mut supervisor) = supervisor {
            supervisor.stop();
        }
        for device in core.devices() {
            device.stop_worker();
        }
        core.disconnect();
    }

    pub fn is_stopping(&self) -> bool {
        self.core.is_stopping()
    }

    // ── Commands ──────────────────────────────────────────────

    /// Run `alias` on a device or on every member of a group.
    pub fn execute(
        &self,
        target: &str,
        alias: &str,
        params: &[crate::command::Value],
        requester: Option<&str>,
    ) -> Result<Request> {
        match self.core.target(target)? {
            Target::Device(device) => device.execute(alias, params, requester),
            Target::Group(group) => group.execute(alias, params, requester),
        }
    }

    /// Run a command string: `board:status`, `board:ping` or
    /// `board:target:cmd [args],wait[ms],...`.
    ///
    /// Board actions sent without a requester return `None`.
    pub fn execute_command_string(
        &self,
        input: &str,
        requester: Option<&str>,
    ) -> Result<Option<Request>> {
        commands::execute_string(self, input, requester)
    }

    // ── Snapshots ─────────────────────────────────────────────

    /// Save every device's snapshot.
    pub fn save_snapshots(&self, store: &mut dyn SnapshotStore) -> core::result::Result<(), StoreError> {
        for device in self.devices() {
            save_entity(store, device.as_ref())?;
        }
        debug!("Board[{}]: saved {} snapshots", self.id(), self.core.device_count());
        Ok(())
    }

    /// Restore every device that has a stored snapshot. Returns how many
    /// were restored.
    pub fn restore_snapshots(&self, store: &dyn SnapshotStore) -> core::result::Result<usize, StoreError> {
        let mut restored = 0;
        for device in self.devices() {
            if restore_entity(store, device.as_ref())? {
                restored += 1;
            } else {
                debug!(
                    "Board[{}]: no snapshot under {}",
                    self.id(),
                    device.snapshot_key()
                );
            }
        }
        Ok(restored)
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        self.end();
    }
}
