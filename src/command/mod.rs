//! Commands: the value tree, per-device registries and string parsing.

pub mod parse;
pub mod tree;

pub use parse::{BoardAction, CommandRequest, Step, parse};
pub use tree::{Command, CommandKind, CommandSet, DeviceCommand, ParamKind, Value};
