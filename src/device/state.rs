//! Device lifecycle states.
//!
//! ```text
//! Created ─initialise()─▶ Initialising ─INITIALISE_RESPONSE─▶ Initialised
//!                                                                 │
//!         Configured ◀─CONFIGURE_RESPONSE─ Configuring ◀─configure()┘
//! ```
//!
//! States only move forward within a session. A board disconnect resets
//! every device to `Created`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DeviceState {
    Created = 0,
    Initialising = 1,
    Initialised = 2,
    Configuring = 3,
    Configured = 4,
}

impl DeviceState {
    pub const COUNT: usize = 5;

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Self::Created),
            1 => Some(Self::Initialising),
            2 => Some(Self::Initialised),
            3 => Some(Self::Configuring),
            4 => Some(Self::Configured),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initialising => "initialising",
            Self::Initialised => "initialised",
            Self::Configuring => "configuring",
            Self::Configured => "configured",
        }
    }

    /// Ready to accept commands.
    pub fn is_ready(self) -> bool {
        self == Self::Configured
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_lifecycle() {
        assert!(DeviceState::Created < DeviceState::Initialising);
        assert!(DeviceState::Configuring < DeviceState::Configured);
        for i in 0..DeviceState::COUNT {
            assert_eq!(DeviceState::from_index(i).map(|s| s as usize), Some(i));
        }
        assert_eq!(DeviceState::from_index(DeviceState::COUNT), None);
    }

    #[test]
    fn only_configured_is_ready() {
        assert!(DeviceState::Configured.is_ready());
        assert!(!DeviceState::Configuring.is_ready());
    }
}
