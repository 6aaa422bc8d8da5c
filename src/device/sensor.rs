//! Analog sensor reporting raw readings as `DATA`.

use crate::error::ProtocolError;
use crate::events::{Capability, ChangeSet, Property};
use crate::protocol::Message;
use crate::snapshot::FieldValue;

use super::behavior::{Category, DeviceBehavior};

#[derive(Debug)]
pub struct AnalogSensor {
    pin: u8,
    value: Option<u16>,
}

const PROPERTIES: &[Property] = &[
    Property::new("pin", &[Capability::Descriptor]),
    Property::new("value", &[Capability::Data, Capability::Serializable]),
];

impl AnalogSensor {
    pub fn new(pin: u8) -> Self {
        Self { pin, value: None }
    }

    /// Last reading, if one has arrived.
    pub fn value(&self) -> Option<u16> {
        self.value
    }

    fn set_value(&mut self, value: u16, changes: &mut ChangeSet) {
        changes.record_in(
            PROPERTIES,
            "value",
            self.value.map(i64::from),
            Some(i64::from(value)),
        );
        self.value = Some(value);
    }
}

impl DeviceBehavior for AnalogSensor {
    fn category(&self) -> Category {
        Category::AnalogSensor
    }

    fn properties(&self) -> &'static [Property] {
        PROPERTIES
    }

    fn build_config(&self, msg: &mut Message) {
        msg.add_u8(self.pin);
    }

    fn on_status(
        &mut self,
        msg: &Message,
        first: usize,
        changes: &mut ChangeSet,
    ) -> Result<(), ProtocolError> {
        if msg.has_argument(first) {
            self.set_value(msg.get_u16(first)?, changes);
        }
        Ok(())
    }

    fn on_data(&mut self, msg: &Message, changes: &mut ChangeSet) -> Result<(), ProtocolError> {
        self.set_value(msg.get_u16(0)?, changes);
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("pin", FieldValue::Int(i64::from(self.pin))),
            ("value", self.value.map(i64::from).into()),
        ]
    }

    fn restore(&mut self, field: &str, value: &FieldValue) {
        if field == "value" {
            self.value = value.as_int().and_then(|v| u16::try_from(v).ok());
        }
    }
}
