//! Command values: atomic device commands, delays and compounds.
//!
//! ```text
//!            Compound (repeat 4)
//!     ┌──────────┬───────┼────────┬─────────┐
//!   enable   delay(5s) disable delay(1s)  ...
//! ```
//!
//! `total_delay` is cached on every node and recomputed bottom-up when a
//! compound's children or repeat count change.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::Message;

// ---------------------------------------------------------------------------
// Device commands
// ---------------------------------------------------------------------------

/// Command byte carried as the first argument of a `COMMAND` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceCommand {
    None = 0,
    Compound = 1,
    Test = 2,
    Enable = 3,
    Disable = 4,
    SetReportInterval = 5,
    Start = 6,
    Stop = 7,
    Pause = 8,
    Reset = 9,
    On = 10,
    Off = 11,
    Move = 12,
    Rotate = 13,
    Print = 14,
    SetCursor = 15,
    Delay = 16,
    Play = 17,
    Record = 18,
    Transmit = 19,
    Save = 20,
    Activate = 21,
    Deactivate = 22,
    Resume = 23,
    Tone = 24,
    Send = 25,
    Request = 26,
}

impl DeviceCommand {
    pub const ALL: [DeviceCommand; 27] = [
        Self::None,
        Self::Compound,
        Self::Test,
        Self::Enable,
        Self::Disable,
        Self::SetReportInterval,
        Self::Start,
        Self::Stop,
        Self::Pause,
        Self::Reset,
        Self::On,
        Self::Off,
        Self::Move,
        Self::Rotate,
        Self::Print,
        Self::SetCursor,
        Self::Delay,
        Self::Play,
        Self::Record,
        Self::Transmit,
        Self::Save,
        Self::Activate,
        Self::Deactivate,
        Self::Resume,
        Self::Tone,
        Self::Send,
        Self::Request,
    ];

    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    U8,
    I16,
    U16,
    I32,
    U32,
    Str,
}

/// A typed command parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    Str(String),
}

impl Value {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Bool(_) => ParamKind::Bool,
            Self::U8(_) => ParamKind::U8,
            Self::I16(_) => ParamKind::I16,
            Self::U16(_) => ParamKind::U16,
            Self::I32(_) => ParamKind::I32,
            Self::U32(_) => ParamKind::U32,
            Self::Str(_) => ParamKind::Str,
        }
    }

    /// Parse command-string text as a value of `kind`.
    pub fn parse(kind: ParamKind, text: &str) -> Option<Self> {
        let text = text.trim();
        Some(match kind {
            ParamKind::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Self::Bool(true),
                "false" | "0" | "off" | "no" => Self::Bool(false),
                _ => return None,
            },
            ParamKind::U8 => Self::U8(text.parse().ok()?),
            ParamKind::I16 => Self::I16(text.parse().ok()?),
            ParamKind::U16 => Self::U16(text.parse().ok()?),
            ParamKind::I32 => Self::I32(text.parse().ok()?),
            ParamKind::U32 => Self::U32(text.parse().ok()?),
            ParamKind::Str => Self::Str(text.to_owned()),
        })
    }

    /// Append this value as one message argument.
    pub fn write_to(&self, msg: &mut Message) {
        match self {
            Self::Bool(v) => msg.add_bool(*v),
            Self::U8(v) => msg.add_u8(*v),
            Self::I16(v) => msg.add_i16(*v),
            Self::U16(v) => msg.add_u16(*v),
            Self::I32(v) => msg.add_i32(*v),
            Self::U32(v) => msg.add_u32(*v),
            Self::Str(v) => msg.add_str(v),
        };
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

// ---------------------------------------------------------------------------
// Command tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Atomic {
        command: DeviceCommand,
        /// Declared parameter types.
        params: Vec<ParamKind>,
        /// Arguments used when the caller supplies none.
        defaults: Vec<Value>,
    },
    Delay(Duration),
    Compound {
        children: Vec<Command>,
        repeat: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    total_delay: Duration,
}

impl Command {
    pub fn atomic(command: DeviceCommand, params: Vec<ParamKind>) -> Self {
        Self {
            kind: CommandKind::Atomic {
                command,
                params,
                defaults: Vec::new(),
            },
            total_delay: Duration::ZERO,
        }
    }

    /// An atomic command with preset arguments, e.g. `enable` as
    /// `ENABLE(true)`.
    pub fn preset(command: DeviceCommand, defaults: Vec<Value>) -> Self {
        let params = defaults.iter().map(Value::kind).collect();
        Self {
            kind: CommandKind::Atomic {
                command,
                params,
                defaults,
            },
            total_delay: Duration::ZERO,
        }
    }

    pub fn delay(duration: Duration) -> Self {
        Self {
            kind: CommandKind::Delay(duration),
            total_delay: duration,
        }
    }

    pub fn compound(children: Vec<Command>, repeat: u32) -> Result<Self> {
        let mut cmd = Self {
            kind: CommandKind::Compound {
                children,
                repeat: 1,
            },
            total_delay: Duration::ZERO,
        };
        cmd.set_repeat(repeat)?;
        Ok(cmd)
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self.kind, CommandKind::Atomic { .. })
    }

    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    pub fn add_child(&mut self, child: Command) -> Result<()> {
        match &mut self.kind {
            CommandKind::Compound { children, .. } => {
                children.push(child);
                self.recompute();
                Ok(())
            }
            CommandKind::Delay(_) => Err(Error::InvalidParameters("a delay cannot have children")),
            CommandKind::Atomic { .. } => {
                Err(Error::InvalidParameters("an atomic command cannot have children"))
            }
        }
    }

    pub fn set_repeat(&mut self, count: u32) -> Result<()> {
        if count == 0 {
            return Err(Error::InvalidParameters("repeat must be at least 1"));
        }
        match &mut self.kind {
            CommandKind::Compound { repeat, .. } => {
                *repeat = count;
                self.recompute();
                Ok(())
            }
            _ => Err(Error::InvalidParameters("only compound commands repeat")),
        }
    }

    fn recompute(&mut self) {
        self.total_delay = match &self.kind {
            CommandKind::Atomic { .. } => Duration::ZERO,
            CommandKind::Delay(d) => *d,
            CommandKind::Compound { children, repeat } => {
                let once: Duration = children.iter().map(Command::total_delay).sum();
                once.saturating_mul(*repeat)
            }
        };
    }

    /// Resolve the arguments for one execution.
    ///
    /// Supplied arguments are only accepted by atomic commands and must
    /// match the declared types exactly; with none supplied the presets
    /// are used.
    pub fn bind(&self, supplied: &[Value]) -> Result<Vec<Value>> {
        match &self.kind {
            CommandKind::Atomic {
                params, defaults, ..
            } => {
                let args = if supplied.is_empty() {
                    defaults.as_slice()
                } else {
                    supplied
                };
                if args.len() != params.len() {
                    return Err(Error::InvalidParameters("wrong number of parameters"));
                }
                if args.iter().zip(params).any(|(a, k)| a.kind() != *k) {
                    return Err(Error::InvalidParameters("parameter type mismatch"));
                }
                Ok(args.to_vec())
            }
            _ if supplied.is_empty() => Ok(Vec::new()),
            _ => Err(Error::InvalidParameters(
                "parameters are only accepted by atomic commands",
            )),
        }
    }

    /// Declared parameter types, empty for delays and compounds.
    pub fn params(&self) -> &[ParamKind] {
        match &self.kind {
            CommandKind::Atomic { params, .. } => params,
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Command registry
// ---------------------------------------------------------------------------

/// Per-device alias → command table. Aliases are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct CommandSet {
    commands: HashMap<String, Command>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `command` under `alias`, replacing any previous entry.
    pub fn add(&mut self, alias: &str, command: Command) {
        self.commands.insert(alias.to_ascii_lowercase(), command);
    }

    pub fn get(&self, alias: &str) -> Option<&Command> {
        self.commands.get(&alias.to_ascii_lowercase())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.get(alias).is_some()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
