//! Digital switch.
//!
//! An active switch is driven by the host (`on` / `off`); a passive
//! switch reports pin changes from the board as `DATA`.

use crate::command::{Command, CommandSet, DeviceCommand};
use crate::error::ProtocolError;
use crate::events::{Capability, ChangeSet, Property};
use crate::protocol::Message;
use crate::snapshot::FieldValue;

use super::behavior::{Category, DeviceBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SwitchMode {
    Active = 1,
    Passive = 2,
}

#[derive(Debug)]
pub struct Switch {
    mode: SwitchMode,
    pin: u8,
    pin_state: bool,
}

const PROPERTIES: &[Property] = &[
    Property::new("mode", &[Capability::MetaData]),
    Property::new("pin", &[Capability::Descriptor]),
    Property::new(
        "pin_state",
        &[Capability::State, Capability::Data, Capability::Serializable],
    ),
];

impl Switch {
    pub fn new(mode: SwitchMode, pin: u8) -> Self {
        Self {
            mode,
            pin,
            pin_state: false,
        }
    }

    pub fn active(pin: u8) -> Self {
        Self::new(SwitchMode::Active, pin)
    }

    pub fn passive(pin: u8) -> Self {
        Self::new(SwitchMode::Passive, pin)
    }

    pub fn pin_state(&self) -> bool {
        self.pin_state
    }

    fn set_pin_state(&mut self, state: bool, changes: &mut ChangeSet) {
        changes.record_in(PROPERTIES, "pin_state", self.pin_state, state);
        self.pin_state = state;
    }
}

impl DeviceBehavior for Switch {
    fn category(&self) -> Category {
        Category::Switch
    }

    fn properties(&self) -> &'static [Property] {
        PROPERTIES
    }

    fn register_commands(&self, commands: &mut CommandSet) {
        if self.mode == SwitchMode::Active {
            commands.add("on", Command::atomic(DeviceCommand::On, vec![]));
            commands.add("off", Command::atomic(DeviceCommand::Off, vec![]));
        }
    }

    fn build_config(&self, msg: &mut Message) {
        msg.add_u8(self.mode as u8)
            .add_u8(self.pin)
            .add_bool(self.pin_state);
    }

    fn on_status(
        &mut self,
        msg: &Message,
        first: usize,
        changes: &mut ChangeSet,
    ) -> Result<(), ProtocolError> {
        if msg.has_argument(first) {
            self.set_pin_state(msg.get_bool(first)?, changes);
        }
        Ok(())
    }

    fn on_data(&mut self, msg: &Message, changes: &mut ChangeSet) -> Result<(), ProtocolError> {
        self.set_pin_state(msg.get_bool(0)?, changes);
        Ok(())
    }

    fn on_command_response(
        &mut self,
        command: DeviceCommand,
        msg: &Message,
        first: usize,
        changes: &mut ChangeSet,
    ) -> Result<(), ProtocolError> {
        let state = match command {
            DeviceCommand::On | DeviceCommand::Off if msg.has_argument(first) => {
                msg.get_bool(first)?
            }
            DeviceCommand::On => true,
            DeviceCommand::Off => false,
            _ => return Ok(()),
        };
        self.set_pin_state(state, changes);
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("mode", FieldValue::Int(self.mode as i64)),
            ("pin", FieldValue::Int(i64::from(self.pin))),
            ("pin_state", FieldValue::Bool(self.pin_state)),
        ]
    }

    fn restore(&mut self, field: &str, value: &FieldValue) {
        if field == "pin_state" {
            if let Some(v) = value.as_bool() {
                self.pin_state = v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageType;

    #[test]
    fn only_active_switch_registers_on_off() {
        let mut commands = CommandSet::new();
        Switch::passive(4).register_commands(&mut commands);
        assert!(commands.is_empty());
        Switch::active(4).register_commands(&mut commands);
        assert!(commands.contains("on") && commands.contains("OFF"));
    }

    #[test]
    fn command_response_updates_pin_state() {
        let mut sw = Switch::active(4);
        let mut changes = ChangeSet::new("sw1");
        let mut msg = Message::to_target(MessageType::CommandResponse, 1);
        msg.add_u8(DeviceCommand::On as u8);
        sw.on_command_response(DeviceCommand::On, &msg, 1, &mut changes)
            .unwrap();
        assert!(sw.pin_state());
        assert!(!changes.is_empty());

        msg.add_bool(false);
        sw.on_command_response(DeviceCommand::On, &msg, 1, &mut changes)
            .unwrap();
        assert!(!sw.pin_state());
    }

    #[test]
    fn data_reports_pin_state() {
        let mut sw = Switch::passive(7);
        let mut changes = ChangeSet::new("sw2");
        let mut msg = Message::to_target(MessageType::Data, 2);
        msg.add_bool(true);
        sw.on_data(&msg, &mut changes).unwrap();
        assert!(sw.pin_state());
    }

    #[test]
    fn config_layout() {
        let sw = Switch::active(9);
        let mut msg = Message::new(MessageType::Configure);
        sw.build_config(&mut msg);
        assert_eq!(msg.get_u8(0).unwrap(), SwitchMode::Active as u8);
        assert_eq!(msg.get_u8(1).unwrap(), 9);
        assert!(!msg.get_bool(2).unwrap());
    }
}
