//! Command-string surface used by outer service layers.
//!
//! ```text
//! <board>:<device-or-group>:<cmd>[ arg...][,wait[<ms>]][,<cmd>...]
//! <board>:status
//! <board>:ping
//! ```

use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardAction {
    Status,
    Ping,
}

/// One comma-separated element of a device command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Invoke { alias: String, args: Vec<String> },
    Wait(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRequest {
    Board {
        board: String,
        action: BoardAction,
    },
    Device {
        board: String,
        target: String,
        steps: Vec<Step>,
    },
}

impl CommandRequest {
    pub fn board(&self) -> &str {
        match self {
            Self::Board { board, .. } | Self::Device { board, .. } => board,
        }
    }
}

pub fn parse(input: &str) -> Result<CommandRequest> {
    let mut parts = input.trim().splitn(3, ':');
    let board = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(Error::InvalidParameters("missing board id"))?;
    let second = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(Error::InvalidParameters("missing device id or board action"))?;

    let Some(commands) = parts.next() else {
        let action = match second.to_ascii_lowercase().as_str() {
            "status" => BoardAction::Status,
            "ping" => BoardAction::Ping,
            _ => return Err(Error::InvalidParameters("unknown board action")),
        };
        return Ok(CommandRequest::Board {
            board: board.to_owned(),
            action,
        });
    };

    let steps = commands
        .split(',')
        .map(parse_step)
        .collect::<Result<Vec<_>>>()?;
    if !steps.iter().any(|s| matches!(s, Step::Invoke { .. })) {
        return Err(Error::InvalidParameters("no command given"));
    }

    Ok(CommandRequest::Device {
        board: board.to_owned(),
        target: second.to_owned(),
        steps,
    })
}

fn parse_step(text: &str) -> Result<Step> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidParameters("empty command"));
    }

    let lower = text.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("wait") {
        let ms = rest
            .trim()
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .and_then(|r| r.trim().parse::<u64>().ok())
            .ok_or(Error::InvalidParameters("wait needs a duration: wait[<ms>]"))?;
        return Ok(Step::Wait(Duration::from_millis(ms)));
    }

    let mut words = text.split_whitespace();
    let alias = words.next().unwrap_or_default().to_owned();
    Ok(Step::Invoke {
        alias,
        args: words.map(str::to_owned).collect(),
    })
}
