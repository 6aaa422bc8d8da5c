//! Per-device command worker.
//!
//! ```text
//!  execute() ──try_send──▶ ┌──────────────────┐ ──receive──▶ worker thread
//!  execute() ──try_send──▶ │ queue (FIFO, 16) │              run depth-first
//!                          └──────────────────┘              one at a time
//! ```
//!
//! One invocation runs at a time per device, so two `execute()` calls on
//! the same device never interleave on the wire. The thread holds only a
//! weak reference to its device.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future::block_on;

use super::Device;
use crate::command::{Command, Value};
use crate::error::{Error, Result};
use crate::tracking::Request;

/// Queued invocations per device.
pub const COMMAND_QUEUE_DEPTH: usize = 16;

/// Granularity of cooperative waits.
pub(crate) const WAIT_SLICE: Duration = Duration::from_millis(20);

/// One queued command invocation.
pub struct Invocation {
    pub command: Command,
    pub args: Vec<Value>,
    pub request: Request,
}

pub enum WorkerMsg {
    Run(Invocation),
    Stop,
}

type WorkQueue = Channel<CriticalSectionRawMutex, WorkerMsg, COMMAND_QUEUE_DEPTH>;

pub struct Worker {
    queue: Arc<WorkQueue>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(device: Weak<Device>, name: &str) -> Result<Self> {
        let queue: Arc<WorkQueue> = Arc::new(Channel::new());
        let rx = Arc::clone(&queue);

        let handle = thread::Builder::new()
            .name(format!("dev-{name}"))
            .spawn(move || {
                loop {
                    match block_on(rx.receive()) {
                        WorkerMsg::Stop => break,
                        WorkerMsg::Run(invocation) => {
                            let Some(device) = device.upgrade() else {
                                break;
                            };
                            device.run_invocation(invocation);
                        }
                    }
                }
            })
            .map_err(|e| Error::Worker(e.to_string()))?;

        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    /// Queue without blocking. Returns false when the queue is full.
    pub fn submit(&self, invocation: Invocation) -> bool {
        self.queue.try_send(WorkerMsg::Run(invocation)).is_ok()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Ask the thread to exit after the queued work and wait for it.
    pub fn stop(&mut self) {
        block_on(self.queue.send(WorkerMsg::Stop));
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Worker: thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            // Detach: the thread exits on its own once the device is gone.
            let _ = self.queue.try_send(WorkerMsg::Stop);
        }
    }
}

/// Sleep for `duration` in slices, bailing out when `stopping` reports
/// true.
pub(crate) fn cooperative_sleep(duration: Duration, stopping: impl Fn() -> bool) -> Result<()> {
    let deadline = Instant::now() + duration;
    loop {
        if stopping() {
            return Err(Error::Stopping);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep((deadline - now).min(WAIT_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn sleep_completes() {
        let start = Instant::now();
        cooperative_sleep(Duration::from_millis(30), || false).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn sleep_stops_early() {
        let stop = AtomicBool::new(false);
        let start = Instant::now();
        let result = cooperative_sleep(Duration::from_secs(5), || {
            let hit = start.elapsed() > Duration::from_millis(40);
            if hit {
                stop.store(true, Ordering::SeqCst);
            }
            stop.load(Ordering::SeqCst)
        });
        assert_eq!(result, Err(Error::Stopping));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
