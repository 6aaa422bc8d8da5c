//! Named groups of devices addressed as one command target.
//!
//! A group invocation allocates one tag-set; every member device runs
//! the command under its own member tag, and the set completes once the
//! last member's response has been released.

use std::sync::Arc;

use log::warn;

use super::Device;
use crate::command::{Command, Value};
use crate::error::{Error, Result};
use crate::tracking::Request;

#[derive(Debug, Clone)]
pub struct DeviceGroup {
    id: String,
    devices: Vec<Arc<Device>>,
}

impl DeviceGroup {
    pub fn new(id: &str, devices: Vec<Arc<Device>>) -> Self {
        Self {
            id: id.to_owned(),
            devices,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d.id() == device_id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.devices.iter().all(|d| d.is_ready())
    }

    /// Run `alias` on every member. Fails before queuing anything if any
    /// member is not ready or lacks the command.
    pub fn execute(
        &self,
        alias: &str,
        params: &[Value],
        requester: Option<&str>,
    ) -> Result<Request> {
        self.execute_with(requester, |d| d.resolve(alias, params))
    }

    /// Run whatever `plan` resolves for each member under one tag-set.
    pub(crate) fn execute_with(
        &self,
        requester: Option<&str>,
        plan: impl Fn(&Device) -> Result<(Command, Vec<Value>)>,
    ) -> Result<Request> {
        let first = self
            .devices
            .first()
            .ok_or(Error::InvalidParameters("device group is empty"))?;
        let link = first.link()?;

        let resolved = self
            .devices
            .iter()
            .map(|d| plan(d.as_ref()).map(|(c, a)| (d, c, a)))
            .collect::<Result<Vec<_>>>()?;

        let ttl = resolved
            .iter()
            .map(|(d, c, _)| d.command_ttl(c, &link))
            .max()
            .unwrap_or_else(|| link.request_ttl());
        let set = link.track_set(requester, ttl)?;

        let mut queued = 0;
        let mut first_error = None;
        for (device, command, args) in resolved {
            let outcome = link
                .track_in_set(set.tag)
                .and_then(|member| {
                    let tag = member.tag;
                    device
                        .submit(command, args, member)
                        .inspect_err(|_| {
                            link.release(tag);
                        })
                });
            match outcome {
                Ok(()) => queued += 1,
                Err(e) => {
                    warn!("Group[{}]: {} not queued: {}", self.id, device.id(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if queued == 0 => {
                link.release(set.tag);
                Err(e)
            }
            _ => Ok(set),
        }
    }
}
