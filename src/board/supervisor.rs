//! Background supervision of a begun board.
//!
//! Each interval, one pass:
//!
//! - not connected: run a begin attempt
//! - ready: synchronise; on failure re-initialise
//! - connected, not ready, quiet past the inactivity timeout: synchronise;
//!   on failure disconnect
//!
//! A pass that finds the previous one still running is skipped.

use std::sync::atomic::Ordering;
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use super::BoardCore;
use crate::device::BoardLink;
use crate::device::worker::cooperative_sleep;
use crate::error::{Error, Result};

pub(super) struct Supervisor {
    handle: Option<JoinHandle<()>>,
}

impl Supervisor {
    pub(super) fn spawn(core: Weak<BoardCore>, board_id: &str, interval: Duration) -> Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("supervisor-{board_id}"))
            .spawn(move || {
                loop {
                    let stopping = || core.upgrade().is_none_or(|c| c.is_stopping());
                    if cooperative_sleep(interval, stopping).is_err() {
                        break;
                    }
                    let Some(core) = core.upgrade() else {
                        break;
                    };
                    core.supervise();
                }
            })
            .map_err(|e| Error::Worker(e.to_string()))?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wait for the thread to notice the stopping flag and exit.
    pub(super) fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("Supervisor: thread panicked");
            }
        }
    }
}

impl BoardCore {
    /// One supervisor pass. Returns false when a pass was already running.
    pub(super) fn supervise(&self) -> bool {
        if self
            .supervising
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Board[{}]: supervisor busy, skipping", self.id());
            return false;
        }
        self.supervise_once();
        self.supervising.store(false, Ordering::SeqCst);
        true
    }

    fn supervise_once(&self) {
        if self.is_stopping() || self.connecting.load(Ordering::SeqCst) {
            return;
        }

        if !self.is_connected() {
            info!("Board[{}]: reconnecting", self.id());
            if let Err(e) = self.start_session(self.config.begin_timeout()) {
                warn!("Board[{}]: reconnect failed: {}", self.id(), e);
            }
            return;
        }

        let timeout = self.config.synchronise_timeout();
        if self.is_ready() {
            if let Err(e) = self.synchronise(timeout) {
                warn!(
                    "Board[{}]: synchronise failed: {}; re-initialising",
                    self.id(),
                    e
                );
                if let Err(e) = self.initialise() {
                    warn!("Board[{}]: re-initialise failed: {}", self.id(), e);
                }
            }
            return;
        }

        let idle = self
            .idle_for()
            .is_none_or(|idle| idle > self.config.inactivity_timeout());
        if idle {
            debug!("Board[{}]: idle, probing", self.id());
            if let Err(e) = self.synchronise(timeout) {
                warn!("Board[{}]: no answer ({}), disconnecting", self.id(), e);
                self.disconnect();
            }
        }
    }
}
