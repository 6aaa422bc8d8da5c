//! Inbound routing and board-level message handling.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use log::{debug, error, info, warn};

use super::{BoardCore, BoardState};
use crate::config::{AnalogReference, AttachmentMode};
use crate::device::{BoardLink, Device, decode_remote_error};
use crate::error::{Error, Result};
use crate::events::{Event, Recipient};
use crate::protocol::{BOARD_ID, InboundEvent, Message, MessageType, decode};

impl BoardCore {
    pub(super) fn on_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::Data(payload) => self.on_data(&payload),
            InboundEvent::StreamError(code) => {
                error!("Board[{}]: stream error {}", self.id(), code);
                self.disconnect_async();
            }
        }
    }

    /// Decode one payload, release its tag and route it to the board or
    /// the addressed device.
    pub(super) fn on_data(&self, payload: &[u8]) {
        let _inbound = self.inbound.lock();

        let msg = match decode(payload, self.endianness) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(
                    "Board[{}]: dropping {} byte payload: {}",
                    self.id(),
                    payload.len(),
                    e
                );
                return;
            }
        };
        let now = Instant::now();
        self.session.lock().last_activity = Some(now);
        let request = self.tracker.lock().release(msg.tag);

        let (source, outcome) = if msg.target == BOARD_ID {
            (self.id().to_owned(), self.handle_board_message(&msg))
        } else {
            let Some(device) = self.device_at(msg.target) else {
                warn!(
                    "Board[{}]: {:?} for unknown device address {}",
                    self.id(),
                    msg.kind,
                    msg.target
                );
                return;
            };
            let outcome = device.handle_message(&msg, request.as_ref());
            self.after_device_message(&device, &msg);
            (device.id().to_owned(), outcome)
        };

        if let Err(e) = outcome {
            warn!(
                "Board[{}]: {:?} from {} not applied: {}",
                self.id(),
                msg.kind,
                source,
                e
            );
        }

        if msg.kind.is_response() || msg.kind == MessageType::Error {
            let owner = request.as_ref().and_then(|r| r.recipient_at(now));
            self.events.publish(Event::Response {
                recipient: Recipient::from_owner(owner),
                source,
                kind: msg.kind,
                tag: msg.tag,
            });
        }
    }

    fn handle_board_message(&self, msg: &Message) -> Result<()> {
        match msg.kind {
            MessageType::InitialiseResponse => self.on_initialise_response(msg),
            MessageType::ConfigureResponse => self.on_configure_response(),
            MessageType::StatusResponse => self.on_status_response(msg),
            MessageType::PingResponse => {
                self.session.lock().last_ping = Some(Instant::now());
                Ok(())
            }
            MessageType::Error => {
                let err = decode_remote_error(msg);
                warn!("Board[{}]: board reported {}", self.id(), err);
                self.record_error(err);
                match err.origin {
                    Some(MessageType::Initialise) => self.set_state(BoardState::InitialiseFailed),
                    Some(MessageType::Configure) => self.set_state(BoardState::ConfigureFailed),
                    _ => {}
                }
                Ok(())
            }
            other => {
                debug!("Board[{}]: ignoring {:?}", self.id(), other);
                Ok(())
            }
        }
    }

    /// Arguments: attachment mode, analog reference, device capacity.
    fn on_initialise_response(&self, msg: &Message) -> Result<()> {
        if self.state() != BoardState::Initialising {
            warn!(
                "Board[{}]: unexpected INITIALISE_RESPONSE in state {}",
                self.id(),
                self.state()
            );
            return Ok(());
        }
        let mode = AttachmentMode::from_u8(msg.get_u8(0)?);
        let reference = AnalogReference::from_u8(msg.get_u8(1)?);
        let capacity = msg.get_u8(2)?;

        let local = self.device_count();
        let failure = if mode != Some(self.config.attachment_mode) {
            Some("attachment mode mismatch")
        } else if reference != Some(self.config.analog_reference) {
            Some("analog reference mismatch")
        } else if local > usize::from(capacity) {
            Some("more devices registered than the board supports")
        } else {
            None
        };
        if let Some(reason) = failure {
            error!("Board[{}]: initialise rejected: {}", self.id(), reason);
            self.set_state(BoardState::InitialiseFailed);
            self.disconnect_async();
            return Err(Error::InvalidTransition(reason));
        }

        self.session.lock().capacity = Some(capacity);
        self.set_state(BoardState::Initialised);
        self.configure()
    }

    fn on_configure_response(&self) -> Result<()> {
        if self.state() != BoardState::Configuring {
            warn!(
                "Board[{}]: unexpected CONFIGURE_RESPONSE in state {}",
                self.id(),
                self.state()
            );
            return Ok(());
        }
        self.set_state(BoardState::Configured);
        let devices = self.devices();

        if self.config.attachment_mode == AttachmentMode::Observer {
            info!("Board[{}]: observing {} devices", self.id(), devices.len());
            self.send(self.board_message(MessageType::StatusRequest))?;
            for device in &devices {
                if let Err(e) = device.request_status(None) {
                    warn!("Board[{}]: status for {} failed: {}", self.id(), device.id(), e);
                }
            }
            return Ok(());
        }

        if devices.is_empty() {
            self.set_state(BoardState::DeviceConfigured);
            return Ok(());
        }
        self.set_state(BoardState::DeviceInitialising);
        for device in &devices {
            if let Err(e) = device.initialise() {
                warn!(
                    "Board[{}]: initialise of {} failed: {}",
                    self.id(),
                    device.id(),
                    e
                );
            }
        }
        Ok(())
    }

    /// Argument 0: the device count the board holds.
    fn on_status_response(&self, msg: &Message) -> Result<()> {
        let remote = msg.get_u8(0)?;
        let local = self.device_count();
        if usize::from(remote) != local {
            let mismatch = Error::DeviceCountMismatch {
                local: u8::try_from(local).unwrap_or(u8::MAX),
                remote,
            };
            error!("Board[{}]: {}", self.id(), mismatch);
            self.session.lock().count_mismatch = Some(mismatch.clone());
            self.disconnect_async();
            return Err(mismatch);
        }
        self.synchronised.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn after_device_message(&self, device: &Arc<Device>, msg: &Message) {
        match msg.kind {
            MessageType::InitialiseResponse
            | MessageType::ConfigureResponse
            | MessageType::StatusResponse => self.update_aggregate(),
            MessageType::Error => {
                let failed = match decode_remote_error(msg).origin {
                    Some(MessageType::Initialise) => BoardState::DeviceInitialiseFailed,
                    Some(MessageType::Configure) => BoardState::DeviceConfigureFailed,
                    _ => return,
                };
                if self.state().is_board_configured() {
                    warn!("Board[{}]: {} failed its handshake", self.id(), device.id());
                    self.set_state(failed);
                }
            }
            _ => {}
        }
    }

    /// Move the board to the `Device*` state every device has reached.
    /// Only moves forward, except out of a failed state.
    pub(super) fn update_aggregate(&self) {
        let current = self.state();
        if !current.is_board_configured() {
            return;
        }
        let slowest = self.devices().iter().map(|d| d.state()).min();
        let Some(next) = slowest.and_then(BoardState::aggregate_of) else {
            return;
        };
        if next > current || (current.is_failed() && next != current) {
            self.set_state(next);
        }
    }
}
