//! Devices: per-peripheral state machine and command scheduler.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Device                                                   │
//! │  ┌────────────┐  ┌─────────────┐  ┌───────────────────┐  │
//! │  │ lifecycle  │  │ CommandSet  │  │ Worker (queue +   │  │
//! │  │ + fields   │  │ alias → cmd │  │ thread, FIFO)     │  │
//! │  └─────┬──────┘  └─────────────┘  └─────────┬─────────┘  │
//! │        │ Box<dyn DeviceBehavior>             │           │
//! │        ▼                                     ▼           │
//! │   switch / sensor hooks           Weak<dyn BoardLink>    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Inbound messages arrive through [`Device::handle_message`] on the
//! board's inbound path; commands run on the device's own worker.

pub mod behavior;
pub mod group;
pub mod link;
pub mod sensor;
pub mod state;
pub mod switch;
pub mod worker;

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

pub use behavior::{Category, DeviceBehavior, Generic};
pub use group::DeviceGroup;
pub use link::BoardLink;
pub use sensor::AnalogSensor;
pub use state::DeviceState;
pub use switch::{Switch, SwitchMode};

use crate::command::{Command, CommandKind, CommandSet, DeviceCommand, ParamKind, Value};
use crate::config::AttachmentMode;
use crate::error::{Error, ProtocolError, RemoteError, Result};
use crate::events::{Capability, ChangeSet, Described, Property};
use crate::protocol::{Message, MessageType};
use crate::snapshot::{FieldValue, Persistable, Snapshot};
use crate::tracking::Request;
use worker::{Invocation, WAIT_SLICE, Worker, cooperative_sleep};

/// Report interval sent with `CONFIGURE` until changed.
pub const DEFAULT_REPORT_INTERVAL_MS: u16 = 1000;

/// An error recorded against a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Raised on the host, e.g. inside the command worker.
    Local(String),
    /// Reported by the board.
    Remote(RemoteError),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(msg) => f.write_str(msg),
            Self::Remote(e) => write!(f, "{e}"),
        }
    }
}

struct Inner {
    state: DeviceState,
    enabled: bool,
    report_interval: u16,
    last_error: Option<DeviceError>,
    last_message: Option<Instant>,
    last_status: Option<Instant>,
    last_ping: Option<Instant>,
    last_command_response: Option<Instant>,
    behavior: Box<dyn DeviceBehavior>,
}

impl Inner {
    fn set_state(&mut self, state: DeviceState, changes: &mut ChangeSet) {
        changes.record::<Device>("state", self.state.name(), state.name());
        self.state = state;
    }

    fn set_enabled(&mut self, enabled: bool, changes: &mut ChangeSet) {
        changes.record::<Device>("enabled", self.enabled, enabled);
        self.enabled = enabled;
    }

    fn set_report_interval(&mut self, interval: u16, changes: &mut ChangeSet) {
        changes.record::<Device>(
            "report_interval",
            i64::from(self.report_interval),
            i64::from(interval),
        );
        self.report_interval = interval;
    }

    fn set_error(&mut self, err: DeviceError, changes: &mut ChangeSet) {
        changes.record::<Device>(
            "error",
            self.last_error.as_ref().map(ToString::to_string),
            Some(err.to_string()),
        );
        self.last_error = Some(err);
    }
}

struct Attachment {
    address: u8,
    link: Weak<dyn BoardLink>,
}

/// One addressable peripheral behind a board.
pub struct Device {
    id: String,
    name: String,
    category: Category,
    inner: Mutex<Inner>,
    commands: Mutex<CommandSet>,
    attachment: OnceLock<Attachment>,
    worker: Mutex<Option<Worker>>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Described for Device {
    const PROPERTIES: &'static [Property] = &[
        Property::new("id", &[Capability::Identifier]),
        Property::new("name", &[Capability::Descriptor]),
        Property::new("category", &[Capability::MetaData]),
        Property::new("state", &[Capability::State]),
        Property::new("enabled", &[Capability::State, Capability::Serializable]),
        Property::new(
            "report_interval",
            &[Capability::State, Capability::Serializable],
        ),
        Property::new("error", &[Capability::Error]),
    ];
}

impl Device {
    pub fn new(id: &str, name: &str, behavior: impl DeviceBehavior + 'static) -> Arc<Self> {
        let mut commands = CommandSet::new();
        commands.add(
            "enable",
            Command::preset(DeviceCommand::Enable, vec![Value::Bool(true)]),
        );
        commands.add("disable", Command::atomic(DeviceCommand::Disable, vec![]));
        commands.add(
            "setreportinterval",
            Command::atomic(DeviceCommand::SetReportInterval, vec![ParamKind::U16]),
        );
        behavior.register_commands(&mut commands);

        Arc::new(Self {
            id: id.to_owned(),
            name: name.to_owned(),
            category: behavior.category(),
            inner: Mutex::new(Inner {
                state: DeviceState::Created,
                enabled: true,
                report_interval: DEFAULT_REPORT_INTERVAL_MS,
                last_error: None,
                last_message: None,
                last_status: None,
                last_ping: None,
                last_command_response: None,
                behavior: Box::new(behavior),
            }),
            commands: Mutex::new(commands),
            attachment: OnceLock::new(),
            worker: Mutex::new(None),
        })
    }

    pub fn switch(id: &str, name: &str, pin: u8) -> Arc<Self> {
        Self::new(id, name, Switch::active(pin))
    }

    pub fn analog_sensor(id: &str, name: &str, pin: u8) -> Arc<Self> {
        Self::new(id, name, AnalogSensor::new(pin))
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Board-local address, once attached.
    pub fn address(&self) -> Option<u8> {
        self.attachment.get().map(|a| a.address)
    }

    pub fn state(&self) -> DeviceState {
        self.inner.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    pub fn report_interval(&self) -> u16 {
        self.inner.lock().report_interval
    }

    /// Local setting sent with the next `CONFIGURE`.
    pub fn set_report_interval(&self, interval: u16) {
        let mut changes = ChangeSet::new(&self.id);
        self.inner.lock().set_report_interval(interval, &mut changes);
        self.publish(changes);
    }

    pub fn last_error(&self) -> Option<DeviceError> {
        self.inner.lock().last_error.clone()
    }

    pub fn last_message_at(&self) -> Option<Instant> {
        self.inner.lock().last_message
    }

    pub fn last_status_at(&self) -> Option<Instant> {
        self.inner.lock().last_status
    }

    pub fn last_ping_at(&self) -> Option<Instant> {
        self.inner.lock().last_ping
    }

    pub fn last_command_response_at(&self) -> Option<Instant> {
        self.inner.lock().last_command_response
    }

    /// Current value of a named field, common or behaviour-specific.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        let inner = self.inner.lock();
        match name {
            "id" => Some(self.id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "category" => Some(FieldValue::Int(self.category as i64)),
            "state" => Some(inner.state.name().into()),
            "enabled" => Some(inner.enabled.into()),
            "report_interval" => Some(FieldValue::Int(i64::from(inner.report_interval))),
            "error" => Some(inner.last_error.as_ref().map(ToString::to_string).into()),
            _ => inner
                .behavior
                .fields()
                .into_iter()
                .find(|(f, _)| *f == name)
                .map(|(_, v)| v),
        }
    }

    /// Register an extra command, e.g. a compound sequence.
    pub fn add_command(&self, alias: &str, command: Command) {
        self.commands.lock().add(alias, command);
    }

    pub fn has_command(&self, alias: &str) -> bool {
        self.commands.lock().contains(alias)
    }

    /// Invocations waiting behind the one in flight.
    pub fn pending_commands(&self) -> usize {
        self.worker.lock().as_ref().map_or(0, Worker::pending)
    }

    // ── Attachment ────────────────────────────────────────────

    pub(crate) fn attach(&self, address: u8, link: Weak<dyn BoardLink>) -> Result<()> {
        self.attachment
            .set(Attachment { address, link })
            .map_err(|_| Error::DuplicateId(self.id.clone()))
    }

    fn link(&self) -> Result<Arc<dyn BoardLink>> {
        self.attachment
            .get()
            .and_then(|a| a.link.upgrade())
            .ok_or(Error::NotConnected)
    }

    fn message(&self, link: &Arc<dyn BoardLink>, kind: MessageType) -> Message {
        Message::to_target(kind, self.address().unwrap_or_default())
            .with_endianness(link.endianness())
    }

    fn publish(&self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        if let Ok(link) = self.link() {
            for event in changes.into_events() {
                link.publish(event);
            }
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Send `INITIALISE` carrying name and category.
    pub fn initialise(&self) -> Result<()> {
        let link = self.link()?;
        let mut changes = ChangeSet::new(&self.id);
        let previous = {
            let mut inner = self.inner.lock();
            if inner.state >= DeviceState::Initialising {
                return Err(Error::InvalidTransition("device is already initialising"));
            }
            let previous = inner.state;
            inner.set_state(DeviceState::Initialising, &mut changes);
            previous
        };

        let mut msg = self.message(&link, MessageType::Initialise);
        msg.add_str(&self.name).add_u8(self.category as u8);
        if let Err(e) = link.send(msg) {
            self.inner.lock().state = previous;
            return Err(e);
        }

        debug!("Device[{}]: initialising", self.id);
        self.publish(changes);
        Ok(())
    }

    /// Send `CONFIGURE` carrying `enabled`, `report_interval` and the
    /// behaviour's configuration.
    pub fn configure(&self) -> Result<()> {
        let link = self.link()?;
        let mut changes = ChangeSet::new(&self.id);
        let mut msg = self.message(&link, MessageType::Configure);
        let previous = {
            let mut inner = self.inner.lock();
            if !matches!(
                inner.state,
                DeviceState::Initialised | DeviceState::Configured
            ) {
                return Err(Error::InvalidTransition("device is not initialised"));
            }
            msg.add_bool(inner.enabled).add_u16(inner.report_interval);
            inner.behavior.build_config(&mut msg);
            let previous = inner.state;
            inner.set_state(DeviceState::Configuring, &mut changes);
            previous
        };

        if let Err(e) = link.send(msg) {
            self.inner.lock().state = previous;
            return Err(e);
        }

        debug!("Device[{}]: configuring", self.id);
        self.publish(changes);
        Ok(())
    }

    /// Send `STATUS_REQUEST`, tracked when a requester is given.
    pub fn request_status(&self, requester: Option<&str>) -> Result<Option<Request>> {
        self.send_request(MessageType::StatusRequest, requester)
    }

    /// Send `PING`, tracked when a requester is given.
    pub fn ping(&self, requester: Option<&str>) -> Result<Option<Request>> {
        self.send_request(MessageType::Ping, requester)
    }

    fn send_request(&self, kind: MessageType, requester: Option<&str>) -> Result<Option<Request>> {
        let link = self.link()?;
        let request = match requester {
            Some(owner) => Some(link.track(Some(owner), link.request_ttl())?),
            None => None,
        };
        let tag = request.as_ref().map_or(0, |r| r.tag);
        if let Err(e) = link.send(self.message(&link, kind).with_tag(tag)) {
            if request.is_some() {
                link.release(tag);
            }
            return Err(e);
        }
        Ok(request)
    }

    /// Back to `Created`; used when the board session ends.
    pub fn reset(&self) {
        let mut changes = ChangeSet::new(&self.id);
        {
            let mut inner = self.inner.lock();
            inner.set_state(DeviceState::Created, &mut changes);
            inner.last_message = None;
            inner.last_status = None;
            inner.last_ping = None;
        }
        self.publish(changes);
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Apply one inbound message addressed to this device.
    ///
    /// The board has already released the message's tag; `request` is
    /// the binding it had, if any.
    pub fn handle_message(&self, msg: &Message, request: Option<&Request>) -> Result<()> {
        let mode = self
            .link()
            .map_or(AttachmentMode::Master, |l| l.attachment_mode());
        let mut changes = ChangeSet::new(&self.id);

        let outcome = {
            let mut inner = self.inner.lock();
            inner.last_message = Some(Instant::now());
            self.apply(&mut inner, msg, mode, &mut changes)
        };
        self.publish(changes);

        if let Some(r) = request {
            debug!(
                "Device[{}]: {:?} for tag {} ({})",
                self.id,
                msg.kind,
                r.tag,
                r.owner.as_deref().unwrap_or("broadcast")
            );
        }

        match outcome? {
            FollowUp::Configure => {
                if let Ok(link) = self.link() {
                    link.device_initialised();
                }
                self.configure()
            }
            FollowUp::None => Ok(()),
        }
    }

    fn apply(
        &self,
        inner: &mut Inner,
        msg: &Message,
        mode: AttachmentMode,
        changes: &mut ChangeSet,
    ) -> core::result::Result<FollowUp, ProtocolError> {
        let now = Instant::now();
        match msg.kind {
            MessageType::InitialiseResponse => {
                if inner.state != DeviceState::Initialising {
                    warn!(
                        "Device[{}]: unexpected INITIALISE_RESPONSE in state {}",
                        self.id, inner.state
                    );
                    return Ok(FollowUp::None);
                }
                inner.set_state(DeviceState::Initialised, changes);
                inner.behavior.on_initialise_response(msg, changes);
                Ok(FollowUp::Configure)
            }

            MessageType::ConfigureResponse => {
                if inner.state != DeviceState::Configuring {
                    warn!(
                        "Device[{}]: unexpected CONFIGURE_RESPONSE in state {}",
                        self.id, inner.state
                    );
                    return Ok(FollowUp::None);
                }
                inner.behavior.on_configure_response(msg, changes)?;
                inner.set_state(DeviceState::Configured, changes);
                info!("Device[{}]: ready", self.id);
                Ok(FollowUp::None)
            }

            MessageType::StatusResponse => {
                let enabled = msg.get_bool(0)?;
                let interval = msg.get_u16(1)?;
                inner.set_enabled(enabled, changes);
                inner.set_report_interval(interval, changes);
                inner.behavior.on_status(msg, 2, changes)?;
                inner.last_status = Some(now);
                if mode == AttachmentMode::Observer && inner.state < DeviceState::Configured {
                    inner.set_state(DeviceState::Configured, changes);
                    info!("Device[{}]: adopted from status", self.id);
                }
                Ok(FollowUp::None)
            }

            MessageType::PingResponse => {
                inner.last_ping = Some(now);
                Ok(FollowUp::None)
            }

            MessageType::CommandResponse => {
                let raw = msg.get_u8(0)?;
                let command =
                    DeviceCommand::from_u8(raw).ok_or(ProtocolError::MalformedMessage)?;
                match command {
                    DeviceCommand::Enable => {
                        let enabled = if msg.has_argument(1) {
                            msg.get_bool(1)?
                        } else {
                            true
                        };
                        inner.set_enabled(enabled, changes);
                    }
                    DeviceCommand::Disable => inner.set_enabled(false, changes),
                    DeviceCommand::SetReportInterval if msg.has_argument(1) => {
                        let interval = msg.get_u16(1)?;
                        inner.set_report_interval(interval, changes);
                    }
                    _ => {}
                }
                inner
                    .behavior
                    .on_command_response(command, msg, 1, changes)?;
                inner.last_command_response = Some(now);
                Ok(FollowUp::None)
            }

            MessageType::Data => {
                inner.behavior.on_data(msg, changes)?;
                Ok(FollowUp::None)
            }

            MessageType::Error => {
                let err = decode_remote_error(msg);
                warn!("Device[{}]: board reported {}", self.id, err);
                inner.set_error(DeviceError::Remote(err), changes);
                Ok(FollowUp::None)
            }

            other => {
                debug!("Device[{}]: ignoring {:?}", self.id, other);
                Ok(FollowUp::None)
            }
        }
    }

    fn record_error(&self, err: DeviceError) {
        let mut changes = ChangeSet::new(&self.id);
        self.inner.lock().set_error(err, &mut changes);
        self.publish(changes);
    }

    // ── Commands ──────────────────────────────────────────────

    /// Queue the command registered as `alias`.
    ///
    /// Returns at once with the request tracking the invocation; the
    /// device's worker emits the wire messages.
    pub fn execute(
        self: &Arc<Self>,
        alias: &str,
        params: &[Value],
        requester: Option<&str>,
    ) -> Result<Request> {
        let (command, args) = self.resolve(alias, params)?;
        self.enqueue(command, args, requester)
    }

    /// Queue an ad-hoc command.
    pub fn execute_command(
        self: &Arc<Self>,
        command: Command,
        params: &[Value],
        requester: Option<&str>,
    ) -> Result<Request> {
        self.ensure_ready()?;
        let args = command.bind(params)?;
        self.enqueue(command, args, requester)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(Error::DeviceNotReady(self.id.clone()))
        }
    }

    /// Ready check, alias lookup and parameter binding.
    pub(crate) fn resolve(&self, alias: &str, params: &[Value]) -> Result<(Command, Vec<Value>)> {
        self.ensure_ready()?;
        let command = self
            .commands
            .lock()
            .get(alias)
            .cloned()
            .ok_or_else(|| Error::UnknownCommand(alias.to_owned()))?;
        let args = command.bind(params)?;
        Ok((command, args))
    }

    /// Declared parameter types of `alias`.
    pub fn command_params(&self, alias: &str) -> Option<Vec<ParamKind>> {
        self.commands
            .lock()
            .get(alias)
            .map(|c| c.params().to_vec())
    }

    pub(crate) fn command_ttl(&self, command: &Command, link: &Arc<dyn BoardLink>) -> Duration {
        link.request_ttl()
            .max(command.total_delay() + link.command_ttl_margin())
    }

    fn enqueue(
        self: &Arc<Self>,
        command: Command,
        args: Vec<Value>,
        requester: Option<&str>,
    ) -> Result<Request> {
        let link = self.link()?;
        let ttl = self.command_ttl(&command, &link);
        let request = link.track(requester, ttl)?;
        if let Err(e) = self.submit(command, args, request.clone()) {
            link.release(request.tag);
            return Err(e);
        }
        Ok(request)
    }

    /// Hand an invocation to the worker, starting it on first use.
    pub(crate) fn submit(
        self: &Arc<Self>,
        command: Command,
        args: Vec<Value>,
        request: Request,
    ) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_none() {
            *worker = Some(Worker::spawn(Arc::downgrade(self), &self.id)?);
        }
        let tag = request.tag;
        let queued = worker.as_ref().is_some_and(|w| {
            w.submit(Invocation {
                command,
                args,
                request,
            })
        });
        if queued {
            debug!("Device[{}]: queued invocation tag {}", self.id, tag);
            Ok(())
        } else {
            warn!("Device[{}]: command queue full", self.id);
            Err(Error::CommandQueueFull(self.id.clone()))
        }
    }

    /// Stop the worker after its queued work and wait for it.
    pub fn stop_worker(&self) {
        let worker = self.worker.lock().take();
        if let Some(mut worker) = worker {
            worker.stop();
        }
    }

    /// Worker-thread entry point for one invocation.
    fn run_invocation(&self, invocation: Invocation) {
        let Invocation {
            command,
            args,
            request,
        } = invocation;
        let link = match self.link() {
            Ok(link) => link,
            Err(e) => {
                warn!("Device[{}]: dropping invocation: {}", self.id, e);
                return;
            }
        };

        let mut first = true;
        let result = if link.is_stopping() {
            Err(Error::Stopping)
        } else {
            self.run_command(&link, &command, &args, &request, &mut first)
        };

        // The invocation tag never went on the wire.
        if first {
            link.release(request.tag);
        }

        match result {
            Ok(()) => debug!("Device[{}]: invocation tag {} done", self.id, request.tag),
            Err(Error::Stopping) => debug!("Device[{}]: invocation cancelled", self.id),
            Err(e) => {
                error!("Device[{}]: command failed: {}", self.id, e);
                self.record_error(DeviceError::Local(e.to_string()));
            }
        }
    }

    /// Depth-first execution. The first atomic step uses the invocation
    /// tag; later steps mint new tags for the same owner.
    fn run_command(
        &self,
        link: &Arc<dyn BoardLink>,
        command: &Command,
        args: &[Value],
        request: &Request,
        first: &mut bool,
    ) -> Result<()> {
        match command.kind() {
            CommandKind::Atomic { command: cmd, .. } => {
                let bound = command.bind(args)?;
                self.wait_until_proceed(link, request)?;
                self.ensure_ready()?;

                let minted = if *first {
                    None
                } else {
                    Some(link.track(request.owner.as_deref(), link.request_ttl())?)
                };
                let tag = minted.as_ref().map_or(request.tag, |r| r.tag);

                let mut msg = self.message(link, MessageType::Command).with_tag(tag);
                msg.add_u8(*cmd as u8);
                for value in &bound {
                    value.write_to(&mut msg);
                }
                if let Err(e) = link.send(msg) {
                    if let Some(r) = minted {
                        link.release(r.tag);
                    }
                    return Err(e);
                }
                *first = false;
                Ok(())
            }
            CommandKind::Delay(duration) => cooperative_sleep(*duration, || link.is_stopping()),
            CommandKind::Compound { children, repeat } => {
                for _ in 0..*repeat {
                    for child in children {
                        self.run_command(link, child, &[], request, first)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn wait_until_proceed(&self, link: &Arc<dyn BoardLink>, request: &Request) -> Result<()> {
        while !request.may_proceed() {
            if link.is_stopping() {
                return Err(Error::Stopping);
            }
            if request.is_expired() {
                return Err(Error::RequestExpired(request.tag));
            }
            thread::sleep(WAIT_SLICE);
        }
        Ok(())
    }
}

enum FollowUp {
    None,
    Configure,
}

/// Decode an `ERROR` message: code, sub-code, optional originating type.
/// Anything undecodable becomes the generic unknown error.
pub fn decode_remote_error(msg: &Message) -> RemoteError {
    let (Ok(code), Ok(sub_code)) = (msg.get_u8(0), msg.get_u8(1)) else {
        return RemoteError::unknown();
    };
    let origin = msg
        .get_u8(2)
        .ok()
        .and_then(MessageType::from_u8);
    RemoteError {
        code,
        sub_code,
        origin,
    }
}

impl Persistable for Device {
    fn snapshot_key(&self) -> String {
        format!("device:{}", self.id)
    }

    fn serialize(&self) -> Snapshot {
        let inner = self.inner.lock();
        let mut snapshot = Snapshot::new();
        snapshot.insert("enabled".into(), inner.enabled.into());
        snapshot.insert(
            "report_interval".into(),
            FieldValue::Int(i64::from(inner.report_interval)),
        );
        let table = inner.behavior.properties();
        for (field, value) in inner.behavior.fields() {
            if crate::events::capabilities_in(table, field).contains(Capability::Serializable) {
                snapshot.insert(field.to_owned(), value);
            }
        }
        snapshot
    }

    fn deserialize(&self, snapshot: &Snapshot) {
        let mut changes = ChangeSet::new(&self.id);
        {
            let mut inner = self.inner.lock();
            for (field, value) in snapshot {
                match (field.as_str(), value) {
                    ("enabled", FieldValue::Bool(v)) => inner.set_enabled(*v, &mut changes),
                    ("report_interval", FieldValue::Int(v)) => {
                        if let Ok(v) = u16::try_from(*v) {
                            inner.set_report_interval(v, &mut changes);
                        }
                    }
                    (field, value) => inner.behavior.restore(field, value),
                }
            }
        }
        self.publish(changes);
    }
}
