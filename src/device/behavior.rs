//! Per-kind device behaviour.
//!
//! A [`Device`](super::Device) handles the shared lifecycle, the common
//! `enabled` / `report_interval` fields and command scheduling. What
//! differs between a switch and a sensor lives behind this trait.
//!
//! Argument layout seen by the hooks (`first` is the index of the first
//! argument the behaviour owns):
//!
//! ```text
//! CONFIGURE         enabled, report_interval, <build_config>...
//! STATUS_RESPONSE   enabled, report_interval, <on_status>...
//! COMMAND_RESPONSE  command byte, <on_command_response>...
//! DATA              <on_data>...
//! ```

use crate::command::{CommandSet, DeviceCommand};
use crate::error::ProtocolError;
use crate::events::{ChangeSet, Property};
use crate::protocol::Message;
use crate::snapshot::FieldValue;

/// Device category byte sent with `INITIALISE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Category {
    Generic = 0,
    Diagnostics = 1,
    Switch = 2,
    AnalogSensor = 3,
    TemperatureSensor = 4,
    Counter = 5,
    Servo = 6,
    IrTransmitter = 7,
    IrReceiver = 8,
    Display = 9,
}

pub trait DeviceBehavior: Send {
    fn category(&self) -> Category;

    /// Static table of the fields this behaviour adds.
    fn properties(&self) -> &'static [Property] {
        &[]
    }

    /// Add kind-specific commands to the device's vocabulary.
    fn register_commands(&self, _commands: &mut CommandSet) {}

    /// Append kind-specific `CONFIGURE` arguments.
    fn build_config(&self, _msg: &mut Message) {}

    fn on_initialise_response(&mut self, _msg: &Message, _changes: &mut ChangeSet) {}

    fn on_configure_response(
        &mut self,
        _msg: &Message,
        _changes: &mut ChangeSet,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn on_status(
        &mut self,
        _msg: &Message,
        _first: usize,
        _changes: &mut ChangeSet,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn on_data(&mut self, _msg: &Message, _changes: &mut ChangeSet) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn on_command_response(
        &mut self,
        _command: DeviceCommand,
        _msg: &Message,
        _first: usize,
        _changes: &mut ChangeSet,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Current values of the fields in [`properties`](Self::properties).
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        Vec::new()
    }

    /// Restore one field from a snapshot. Unknown fields are ignored.
    fn restore(&mut self, _field: &str, _value: &FieldValue) {}
}

/// A device with no kind-specific behaviour.
#[derive(Debug, Default)]
pub struct Generic;

impl DeviceBehavior for Generic {
    fn category(&self) -> Category {
        Category::Generic
    }
}
