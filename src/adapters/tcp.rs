//! TCP transport adapter.
//!
//! Connects to a board bridge (serial-to-TCP gateway, simulator) and
//! carries each message as one length-prefixed frame, see
//! [`frame`](crate::protocol::frame).
//!
//! ## Connection model
//!
//! 1. `open()` connects with a timeout and starts a reader thread.
//! 2. The reader feeds socket bytes through a [`FrameDecoder`] and
//!    delivers whole payloads to the board, one at a time.
//! 3. EOF or a read error is reported as a stream error unless the
//!    transport was closed locally.
//! 4. `close()` shuts the socket down; the reader exits on its own.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, bail};
use log::{debug, info, warn};

use crate::protocol::frame::{FrameDecoder, encode_frame};
use crate::protocol::{Inbound, InboundEvent, Transport};

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Stream error code reported when the peer closes the connection.
pub const STREAM_CLOSED: i32 = 0;

const READ_BUF_SIZE: usize = 256;

pub struct TcpTransport {
    addr: SocketAddr,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
    /// Set by `close()` so the reader does not report the shutdown.
    closed: Arc<AtomicBool>,
}

impl TcpTransport {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stream: None,
            closed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Transport for TcpTransport {
    fn open(&mut self, inbound: Inbound) -> anyhow::Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = TcpStream::connect_timeout(&self.addr, self.connect_timeout)
            .with_context(|| format!("connecting to {}", self.addr))?;
        stream.set_nodelay(true).context("setting TCP_NODELAY")?;
        let reader = stream.try_clone().context("cloning socket for reader")?;

        let closed = Arc::new(AtomicBool::new(false));
        let reader_closed = Arc::clone(&closed);
        thread::Builder::new()
            .name(format!("tcp-rx-{}", self.addr))
            .spawn(move || read_loop(reader, inbound, reader_closed))
            .context("spawning reader thread")?;

        info!("TCP: connected to {}", self.addr);
        self.closed = closed;
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            info!("TCP: closed {}", self.addr);
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some() && !self.closed.load(Ordering::SeqCst)
    }

    fn is_ready(&self) -> bool {
        self.is_open()
    }

    fn send(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            bail!("not connected");
        };
        let Some(frame) = encode_frame(payload) else {
            bail!("payload of {} bytes cannot be framed", payload.len());
        };
        stream
            .write_all(&frame)
            .with_context(|| format!("writing to {}", self.addr))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop(mut stream: TcpStream, inbound: Inbound, closed: Arc<AtomicBool>) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let code = match stream.read(&mut buf) {
            Ok(0) => STREAM_CLOSED,
            Ok(n) => {
                decoder.feed(&buf[..n], |payload| inbound.data(payload));
                continue;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => e.raw_os_error().unwrap_or(-1),
        };

        if closed.swap(true, Ordering::SeqCst) {
            debug!("TCP: reader stopped");
        } else {
            warn!("TCP: stream ended (code {})", code);
            inbound.deliver(InboundEvent::StreamError(code));
        }
        if decoder.dropped() > 0 {
            debug!("TCP: {} bad length prefixes skipped", decoder.dropped());
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[test]
    fn frames_flow_both_ways() {
        let (listener, addr) = listener();
        let (tx, rx) = mpsc::channel();
        let mut transport = TcpTransport::new(addr);
        transport
            .open(Inbound::new(move |e| {
                let _ = tx.send(e);
            }))
            .unwrap();
        assert!(transport.is_open() && transport.is_ready());

        let (mut peer, _) = listener.accept().unwrap();
        transport.send(&[1, 0, 0, 0]).unwrap();
        let mut got = [0u8; 5];
        peer.read_exact(&mut got).unwrap();
        assert_eq!(got, [4, 1, 0, 0, 0]);

        // Two frames in one write, the second split across writes.
        peer.write_all(&[2, 9, 9, 3, 7]).unwrap();
        peer.write_all(&[7, 7]).unwrap();
        let timeout = Duration::from_secs(2);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), InboundEvent::Data(vec![9, 9]));
        assert_eq!(rx.recv_timeout(timeout).unwrap(), InboundEvent::Data(vec![7, 7, 7]));
        transport.close();
    }

    #[test]
    fn peer_hangup_is_a_stream_error() {
        let (listener, addr) = listener();
        let (tx, rx) = mpsc::channel();
        let mut transport = TcpTransport::new(addr);
        transport
            .open(Inbound::new(move |e| {
                let _ = tx.send(e);
            }))
            .unwrap();
        let (peer, _) = listener.accept().unwrap();
        drop(peer);

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            InboundEvent::StreamError(STREAM_CLOSED)
        );
        assert!(!transport.is_open());
    }

    #[test]
    fn local_close_is_silent() {
        let (listener, addr) = listener();
        let (tx, rx) = mpsc::channel();
        let mut transport = TcpTransport::new(addr);
        transport
            .open(Inbound::new(move |e| {
                let _ = tx.send(e);
            }))
            .unwrap();
        let _peer = listener.accept().unwrap();
        transport.close();
        assert!(!transport.is_open());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(transport.send(&[1]).is_err());
    }

    #[test]
    fn connect_refused() {
        let (listener, addr) = listener();
        drop(listener);
        let mut transport =
            TcpTransport::new(addr).with_connect_timeout(Duration::from_millis(200));
        assert!(transport.open(Inbound::new(|_| {})).is_err());
        assert!(!transport.is_open());
    }
}
