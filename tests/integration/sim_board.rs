//! Simulated board firmware for integration tests.
//!
//! `SimBoard` is a [`Transport`] whose far end answers like a board:
//! handshakes, status, ping and switch commands. Replies come from a
//! responder thread, the way a real transport's reader delivers them.
//! The same reply logic also backs a TCP server for the socket tests.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use admlink::command::DeviceCommand;
use admlink::protocol::frame::{FrameDecoder, encode_frame};
use admlink::protocol::{
    BOARD_ID, Endianness, Inbound, InboundEvent, Message, MessageType, Transport, decode, encode,
};
use parking_lot::Mutex;

/// Firmware-side state and knobs.
#[derive(Debug, Default)]
pub struct SimState {
    /// Every message the host sent, in order.
    pub received: Vec<Message>,
    /// Stop answering anything.
    pub silent: bool,
    /// Device count to report instead of the one from `INITIALISE`.
    pub reported_devices: Option<u8>,
    /// Refuse `open()`.
    pub refuse_open: bool,
    pub opens: usize,
    pub capacity: u8,
    devices: u8,
    mode: u8,
    analog_reference: u8,
    pins: HashMap<u8, bool>,
}

impl SimState {
    pub fn received_of(&self, kind: MessageType) -> Vec<Message> {
        self.received
            .iter()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect()
    }

    pub fn pin(&self, address: u8) -> bool {
        self.pins.get(&address).copied().unwrap_or(false)
    }
}

/// Compute the firmware's answer to one host message.
pub fn respond(state: &mut SimState, msg: &Message) -> Option<Message> {
    state.received.push(msg.clone());
    if state.silent {
        return None;
    }
    let mut reply = Message::to_target(msg.kind, msg.target).with_tag(msg.tag);

    match (msg.kind, msg.target) {
        (MessageType::Initialise, BOARD_ID) => {
            state.mode = msg.get_u8(0).ok()?;
            state.devices = msg.get_u8(1).ok()?;
            state.analog_reference = msg.get_u8(2).ok()?;
            reply.kind = MessageType::InitialiseResponse;
            reply
                .add_u8(state.mode)
                .add_u8(state.analog_reference)
                .add_u8(state.capacity);
        }
        (MessageType::StatusRequest, BOARD_ID) => {
            reply.kind = MessageType::StatusResponse;
            reply.add_u8(state.reported_devices.unwrap_or(state.devices));
        }
        (MessageType::StatusRequest, address) => {
            reply.kind = MessageType::StatusResponse;
            reply
                .add_bool(true)
                .add_u16(1000)
                .add_bool(state.pin(address));
        }
        (MessageType::Initialise, _) => reply.kind = MessageType::InitialiseResponse,
        (MessageType::Configure, _) => reply.kind = MessageType::ConfigureResponse,
        (MessageType::Ping, _) => reply.kind = MessageType::PingResponse,
        (MessageType::Command, address) => {
            let raw = msg.get_u8(0).ok()?;
            reply.kind = MessageType::CommandResponse;
            reply.add_u8(raw);
            match DeviceCommand::from_u8(raw)? {
                DeviceCommand::On => {
                    state.pins.insert(address, true);
                    reply.add_bool(true);
                }
                DeviceCommand::Off => {
                    state.pins.insert(address, false);
                    reply.add_bool(false);
                }
                _ => {}
            }
        }
        _ => return None,
    }
    Some(reply)
}

/// In-process simulated board.
#[derive(Clone)]
pub struct SimBoard {
    pub state: Arc<Mutex<SimState>>,
    link: Arc<Mutex<Option<(mpsc::Sender<Vec<u8>>, Inbound)>>>,
}

#[allow(dead_code)]
impl SimBoard {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                capacity: 16,
                ..SimState::default()
            })),
            link: Arc::new(Mutex::new(None)),
        }
    }

    /// Push an unsolicited message (e.g. `DATA`) to the host.
    pub fn push(&self, msg: &Message) {
        let inbound = self.link.lock().as_ref().map(|(_, i)| i.clone());
        if let Some(inbound) = inbound {
            inbound.data(&encode(msg).unwrap());
        }
    }

    /// The far end drops the link.
    pub fn hang_up(&self) {
        let link = self.link.lock().take();
        if let Some((_, inbound)) = link {
            inbound.deliver(InboundEvent::StreamError(-1));
        }
    }

    pub fn received_of(&self, kind: MessageType) -> Vec<Message> {
        self.state.lock().received_of(kind)
    }
}

impl Transport for SimBoard {
    fn open(&mut self, inbound: Inbound) -> anyhow::Result<()> {
        {
            let mut state = self.state.lock();
            state.opens += 1;
            if state.refuse_open {
                anyhow::bail!("simulated board refused the link");
            }
        }
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let state = Arc::clone(&self.state);
        let replies = inbound.clone();
        thread::spawn(move || {
            for payload in rx {
                let Ok(msg) = decode(&payload, Endianness::Little) else {
                    continue;
                };
                let reply = respond(&mut state.lock(), &msg);
                if let Some(reply) = reply {
                    replies.data(&encode(&reply).unwrap());
                }
            }
        });
        *self.link.lock() = Some((tx, inbound));
        Ok(())
    }

    fn close(&mut self) {
        self.link.lock().take();
    }

    fn is_open(&self) -> bool {
        self.link.lock().is_some()
    }

    fn is_ready(&self) -> bool {
        self.is_open()
    }

    fn send(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        match self.link.lock().as_ref() {
            Some((tx, _)) => tx
                .send(payload.to_vec())
                .map_err(|_| anyhow::anyhow!("simulated board is gone")),
            None => anyhow::bail!("not open"),
        }
    }
}

/// Serve one simulated board over TCP with 1-byte length framing.
/// Returns the address and the shared firmware state.
#[allow(dead_code)]
pub fn spawn_tcp_board() -> (SocketAddr, Arc<Mutex<SimState>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(Mutex::new(SimState {
        capacity: 16,
        ..SimState::default()
    }));
    let shared = Arc::clone(&state);
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut writer = stream.try_clone().unwrap();
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 128];
        while let Ok(n) = stream.read(&mut buf) {
            if n == 0 {
                break;
            }
            let mut replies = Vec::new();
            decoder.feed(&buf[..n], |payload| {
                if let Ok(msg) = decode(payload, Endianness::Little) {
                    replies.extend(respond(&mut shared.lock(), &msg));
                }
            });
            for reply in replies {
                let frame = encode_frame(&encode(&reply).unwrap()).unwrap();
                if writer.write_all(&frame).is_err() {
                    return;
                }
            }
        }
    });
    (addr, state)
}

/// Poll `cond` for up to three seconds.
pub fn wait_for(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
