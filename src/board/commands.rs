//! Command strings: `board:status`, `board:ping`,
//! `board:target:cmd [args],wait[ms],cmd`.
//!
//! A single step runs the registered command directly. Several steps,
//! or any `wait`, are assembled into a one-off compound whose atomic
//! children carry their arguments as presets.

use log::debug;

use super::{Board, Target};
use crate::command::{BoardAction, Command, CommandKind, CommandRequest, Step, Value, parse};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::tracking::Request;

pub(super) fn execute_string(
    board: &Board,
    input: &str,
    requester: Option<&str>,
) -> Result<Option<Request>> {
    let request = parse(input)?;
    if request.board() != board.id() {
        return Err(Error::BoardMismatch(request.board().to_owned()));
    }
    debug!("Board[{}]: command string {:?}", board.id(), input);

    match request {
        CommandRequest::Board { action, .. } => match action {
            BoardAction::Status => board.request_status(requester),
            BoardAction::Ping => board.ping(requester),
        },
        CommandRequest::Device { target, steps, .. } => {
            let request = match board.core.target(&target)? {
                Target::Device(device) => {
                    let (command, args) = plan(&device, &steps)?;
                    device.execute_command(command, &args, requester)?
                }
                Target::Group(group) => group.execute_with(requester, |d| plan(d, &steps))?,
            };
            Ok(Some(request))
        }
    }
}

/// Resolve `steps` against one device's command set.
fn plan(device: &Device, steps: &[Step]) -> Result<(Command, Vec<Value>)> {
    if let [Step::Invoke { alias, args }] = steps {
        let params = parse_args(device, alias, args)?;
        return device.resolve(alias, &params);
    }

    let mut children = Vec::with_capacity(steps.len());
    for step in steps {
        match step {
            Step::Wait(duration) => children.push(Command::delay(*duration)),
            Step::Invoke { alias, args } => {
                let params = parse_args(device, alias, args)?;
                let (command, bound) = device.resolve(alias, &params)?;
                let child = match command.kind() {
                    CommandKind::Atomic { command: cmd, .. } => Command::preset(*cmd, bound),
                    _ => command,
                };
                children.push(child);
            }
        }
    }
    Ok((Command::compound(children, 1)?, Vec::new()))
}

fn parse_args(device: &Device, alias: &str, args: &[String]) -> Result<Vec<Value>> {
    if args.is_empty() {
        return Ok(Vec::new());
    }
    let kinds = device
        .command_params(alias)
        .ok_or_else(|| Error::UnknownCommand(alias.to_owned()))?;
    if kinds.len() != args.len() {
        return Err(Error::InvalidParameters("wrong number of parameters"));
    }
    kinds
        .iter()
        .zip(args)
        .map(|(kind, text)| {
            Value::parse(*kind, text).ok_or(Error::InvalidParameters("parameter does not parse"))
        })
        .collect()
}
