//! Board configuration parameters
//!
//! Everything a host needs to drive one board: identity, attachment
//! mode, byte order, and the timing of the connect/begin/supervisor
//! cycles. Loaded from JSON by the embedding application.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether this host owns the board's devices or only watches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttachmentMode {
    /// The host initialises and configures every device.
    Master = 1,
    /// Another host owns the board; devices are adopted from status.
    Observer = 2,
}

impl AttachmentMode {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Master),
            2 => Some(Self::Observer),
            _ => None,
        }
    }
}

/// Analog reference voltage source the board must be using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AnalogReference {
    External = 0,
    Default = 1,
    Internal = 3,
}

impl AnalogReference {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::External),
            1 => Some(Self::Default),
            3 => Some(Self::Internal),
            _ => None,
        }
    }
}

/// Configuration for one board session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    // --- Identity ---
    /// Id used in command strings and log prefixes
    pub board_id: String,
    /// Human-readable name
    pub name: String,

    // --- Protocol ---
    pub attachment_mode: AttachmentMode,
    pub analog_reference: AnalogReference,
    /// Byte order of integer arguments
    pub little_endian: bool,

    // --- Connect / begin ---
    /// Deadline for the transport to open and become ready
    pub connect_timeout_ms: u32,
    pub connect_poll_interval_ms: u32,
    /// Poll interval while waiting for the board to become ready
    pub ready_poll_interval_ms: u32,
    /// Deadline for one begin attempt
    pub begin_timeout_ms: u32,
    pub max_begin_attempts: u8,

    // --- Supervisor ---
    pub supervisor_interval_ms: u32,
    /// Connected but silent for this long triggers a synchronise
    pub inactivity_timeout_ms: u32,
    pub synchronise_timeout_ms: u32,

    // --- Requests ---
    /// Default TTL of tracked requests
    pub request_ttl_ms: u32,
    /// Added to a command's total delay to derive its request TTL
    pub command_ttl_margin_ms: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            board_id: "board".into(),
            name: "Board".into(),

            attachment_mode: AttachmentMode::Master,
            analog_reference: AnalogReference::Default,
            little_endian: true,

            connect_timeout_ms: 10_000,
            connect_poll_interval_ms: 100,
            ready_poll_interval_ms: 250,
            begin_timeout_ms: 15_000,
            max_begin_attempts: 3,

            supervisor_interval_ms: 5_000,
            inactivity_timeout_ms: 30_000,
            synchronise_timeout_ms: 3_000,

            request_ttl_ms: 10_000,
            command_ttl_margin_ms: 2_000,
        }
    }
}

/// Errors from loading or validating a [`BoardConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The input is not a valid config document.
    Parse(String),
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "config parse error: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl BoardConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject out-of-range values rather than clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_id.is_empty() || self.board_id.contains(':') {
            return Err(ConfigError::ValidationFailed(
                "board_id must be non-empty and must not contain ':'",
            ));
        }
        if self.connect_poll_interval_ms == 0 || self.ready_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll intervals must be > 0"));
        }
        if self.connect_poll_interval_ms > self.connect_timeout_ms {
            return Err(ConfigError::ValidationFailed(
                "connect_poll_interval_ms must be <= connect_timeout_ms",
            ));
        }
        if self.begin_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("begin_timeout_ms must be > 0"));
        }
        if !(1..=10).contains(&self.max_begin_attempts) {
            return Err(ConfigError::ValidationFailed("max_begin_attempts must be 1–10"));
        }
        if self.supervisor_interval_ms < 100 {
            return Err(ConfigError::ValidationFailed(
                "supervisor_interval_ms must be >= 100",
            ));
        }
        if self.synchronise_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "synchronise_timeout_ms must be > 0",
            ));
        }
        if self.inactivity_timeout_ms <= self.supervisor_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "inactivity_timeout_ms must be > supervisor_interval_ms",
            ));
        }
        if self.request_ttl_ms < 100 {
            return Err(ConfigError::ValidationFailed("request_ttl_ms must be >= 100"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        ms(self.connect_timeout_ms)
    }

    pub fn connect_poll_interval(&self) -> Duration {
        ms(self.connect_poll_interval_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        ms(self.ready_poll_interval_ms)
    }

    pub fn begin_timeout(&self) -> Duration {
        ms(self.begin_timeout_ms)
    }

    pub fn supervisor_interval(&self) -> Duration {
        ms(self.supervisor_interval_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        ms(self.inactivity_timeout_ms)
    }

    pub fn synchronise_timeout(&self) -> Duration {
        ms(self.synchronise_timeout_ms)
    }

    pub fn request_ttl(&self) -> Duration {
        ms(self.request_ttl_ms)
    }

    pub fn command_ttl_margin(&self) -> Duration {
        ms(self.command_ttl_margin_ms)
    }
}

fn ms(v: u32) -> Duration {
    Duration::from_millis(u64::from(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(BoardConfig::default().validate().is_ok());
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = BoardConfig::default();
        assert!(
            c.connect_poll_interval_ms < c.connect_timeout_ms,
            "connect polling should be finer than its deadline"
        );
        assert!(c.synchronise_timeout_ms < c.supervisor_interval_ms);
        assert!(c.supervisor_interval_ms < c.inactivity_timeout_ms);
    }

    #[test]
    fn serde_roundtrip() {
        let c = BoardConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: BoardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = BoardConfig {
            attachment_mode: AttachmentMode::Observer,
            ..BoardConfig::default()
        };
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: BoardConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn from_json_fills_defaults() {
        let c = BoardConfig::from_json(r#"{"board_id":"b7","attachment_mode":"Observer"}"#)
            .unwrap();
        assert_eq!(c.board_id, "b7");
        assert_eq!(c.attachment_mode, AttachmentMode::Observer);
        assert_eq!(c.max_begin_attempts, 3);
    }

    #[test]
    fn from_json_rejects_invalid() {
        assert!(matches!(
            BoardConfig::from_json(r#"{"max_begin_attempts":0}"#),
            Err(ConfigError::ValidationFailed(_))
        ));
        assert!(matches!(
            BoardConfig::from_json(r#"{"board_id":"a:b"}"#),
            Err(ConfigError::ValidationFailed(_))
        ));
        assert!(matches!(
            BoardConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn wire_enum_bytes() {
        assert_eq!(AttachmentMode::from_u8(AttachmentMode::Observer as u8), Some(AttachmentMode::Observer));
        assert_eq!(AnalogReference::from_u8(3), Some(AnalogReference::Internal));
        assert_eq!(AnalogReference::from_u8(2), None);
    }
}
