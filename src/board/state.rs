//! Board session states.
//!
//! ```text
//! Created ─▶ Beginning ─▶ Begun ─▶ Initialising ─▶ Initialised ─▶ Configuring ─▶ Configured
//!                                        │                             │              │
//!                                        ▼                             ▼              ▼
//!                                 InitialiseFailed              ConfigureFailed   Device* (aggregate)
//!
//! DeviceInitialising ─▶ DeviceInitialised ─▶ DeviceConfiguring ─▶ DeviceConfigured
//!        │                                          │
//!        ▼                                          ▼
//! DeviceInitialiseFailed                    DeviceConfigureFailed
//! ```
//!
//! The `Device*` states are derived: the board is in `DeviceX` once every
//! registered device has reached at least the matching device state.

use std::fmt;

use crate::device::DeviceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum BoardState {
    Created = 0,
    Beginning = 1,
    Begun = 2,
    Initialising = 3,
    Initialised = 4,
    InitialiseFailed = 5,
    Configuring = 6,
    Configured = 7,
    ConfigureFailed = 8,
    DeviceInitialising = 9,
    DeviceInitialised = 10,
    DeviceInitialiseFailed = 11,
    DeviceConfiguring = 12,
    DeviceConfigured = 13,
    DeviceConfigureFailed = 14,
}

impl BoardState {
    pub const COUNT: usize = 15;

    const ALL: [Self; Self::COUNT] = [
        Self::Created,
        Self::Beginning,
        Self::Begun,
        Self::Initialising,
        Self::Initialised,
        Self::InitialiseFailed,
        Self::Configuring,
        Self::Configured,
        Self::ConfigureFailed,
        Self::DeviceInitialising,
        Self::DeviceInitialised,
        Self::DeviceInitialiseFailed,
        Self::DeviceConfiguring,
        Self::DeviceConfigured,
        Self::DeviceConfigureFailed,
    ];

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Beginning => "beginning",
            Self::Begun => "begun",
            Self::Initialising => "initialising",
            Self::Initialised => "initialised",
            Self::InitialiseFailed => "initialise_failed",
            Self::Configuring => "configuring",
            Self::Configured => "configured",
            Self::ConfigureFailed => "configure_failed",
            Self::DeviceInitialising => "device_initialising",
            Self::DeviceInitialised => "device_initialised",
            Self::DeviceInitialiseFailed => "device_initialise_failed",
            Self::DeviceConfiguring => "device_configuring",
            Self::DeviceConfigured => "device_configured",
            Self::DeviceConfigureFailed => "device_configure_failed",
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            Self::InitialiseFailed
                | Self::ConfigureFailed
                | Self::DeviceInitialiseFailed
                | Self::DeviceConfigureFailed
        )
    }

    /// The board-level handshake has completed and device states now
    /// drive the aggregate.
    pub fn is_board_configured(self) -> bool {
        self >= Self::Configured && self != Self::ConfigureFailed
    }

    /// Aggregate state for a board whose slowest device is in `slowest`.
    pub fn aggregate_of(slowest: DeviceState) -> Option<Self> {
        match slowest {
            DeviceState::Created => None,
            DeviceState::Initialising => Some(Self::DeviceInitialising),
            DeviceState::Initialised => Some(Self::DeviceInitialised),
            DeviceState::Configuring => Some(Self::DeviceConfiguring),
            DeviceState::Configured => Some(Self::DeviceConfigured),
        }
    }
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
