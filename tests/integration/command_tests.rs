//! Commands, data and snapshots on a running board.

use std::time::Duration;

use admlink::adapters::{LogEventSink, MemorySnapshotStore};
use admlink::command::{Command, DeviceCommand};
use admlink::events::{Event, Recipient, pump};
use admlink::protocol::{Message, MessageType};
use admlink::snapshot::FieldValue;
use admlink::{AttachmentMode, Board, Device, Error};

use crate::begin_tests::{board_on, config};
use crate::sim_board::{SimBoard, wait_for};

fn running(ids: &[&str]) -> (Board, SimBoard) {
    let sim = SimBoard::new();
    let board = board_on(&sim, config(AttachmentMode::Master), ids);
    board.begin(Duration::from_secs(2)).unwrap();
    board.events().drain();
    (board, sim)
}

fn pin_state(board: &Board, id: &str) -> Option<FieldValue> {
    board.device(id).and_then(|d| d.field("pin_state"))
}

#[test]
fn switch_on_end_to_end() {
    let (board, sim) = running(&["sw1", "sw2"]);

    let request = board.execute("sw1", "on", &[], Some("alice")).unwrap();
    assert!(wait_for(|| pin_state(&board, "sw1") == Some(FieldValue::Bool(true))));
    assert!(wait_for(|| board.outstanding_requests() == 0));

    let commands = sim.received_of(MessageType::Command);
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].target, 1);
    assert_eq!(commands[0].tag, request.tag);
    assert_eq!(commands[0].get_u8(0).unwrap(), DeviceCommand::On as u8);
    assert!(sim.state.lock().pin(1));
    assert_eq!(pin_state(&board, "sw2"), Some(FieldValue::Bool(false)));

    let events = board.events().drain();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Response {
            recipient: Recipient::Owner(owner),
            kind: MessageType::CommandResponse,
            ..
        } if owner == "alice"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Change(c) if c.entity_id == "sw1" && c.field == "pin_state"
    )));
    board.end();
}

#[test]
fn group_command_string_reaches_every_member() {
    let sim = SimBoard::new();
    let board = board_on(&sim, config(AttachmentMode::Master), &["sw1", "sw2", "sw3"]);
    board.add_device_group("porch", &["sw1", "sw3"]).unwrap();
    board.begin(Duration::from_secs(2)).unwrap();

    board
        .execute_command_string("b1:porch:on", Some("bob"))
        .unwrap();
    assert!(wait_for(|| {
        let sim = sim.state.lock();
        sim.pin(1) && sim.pin(3)
    }));
    assert!(!sim.state.lock().pin(2));
    assert!(wait_for(|| board.outstanding_requests() == 0));
    assert_eq!(pin_state(&board, "sw3"), Some(FieldValue::Bool(true)));
    board.end();
}

#[test]
fn command_sequence_keeps_its_order() {
    let (board, sim) = running(&["sw1"]);
    board
        .execute_command_string("b1:sw1:on,wait[30],off,on", None)
        .unwrap();
    assert!(wait_for(|| sim.received_of(MessageType::Command).len() == 3));
    let order: Vec<u8> = sim
        .received_of(MessageType::Command)
        .iter()
        .map(|m| m.get_u8(0).unwrap())
        .collect();
    assert_eq!(
        order,
        vec![
            DeviceCommand::On as u8,
            DeviceCommand::Off as u8,
            DeviceCommand::On as u8
        ]
    );
    assert!(wait_for(|| pin_state(&board, "sw1") == Some(FieldValue::Bool(true))));
    board.end();
}

#[test]
fn registered_compound_command_repeats() {
    let sim = SimBoard::new();
    let board = board_on(&sim, config(AttachmentMode::Master), &["sw1"]);
    let blink = Command::compound(
        vec![
            Command::preset(DeviceCommand::On, vec![]),
            Command::delay(Duration::from_millis(10)),
            Command::preset(DeviceCommand::Off, vec![]),
        ],
        3,
    )
    .unwrap();
    board.device("sw1").unwrap().add_command("blink", blink);
    board.begin(Duration::from_secs(2)).unwrap();

    board.execute("sw1", "blink", &[], None).unwrap();
    assert!(wait_for(|| sim.received_of(MessageType::Command).len() == 6));
    assert!(wait_for(|| board.outstanding_requests() == 0));
    assert!(!sim.state.lock().pin(1));
    board.end();
}

#[test]
fn unknown_targets_and_commands() {
    let (board, _sim) = running(&["sw1"]);
    assert_eq!(
        board.execute("sw9", "on", &[], None).unwrap_err(),
        Error::UnknownDevice("sw9".into())
    );
    assert_eq!(
        board.execute("sw1", "explode", &[], None).unwrap_err(),
        Error::UnknownCommand("explode".into())
    );
    assert_eq!(
        board
            .execute_command_string("b7:sw1:on", None)
            .unwrap_err(),
        Error::BoardMismatch("b7".into())
    );
    board.end();
}

#[test]
fn sensor_data_is_published() {
    let sim = SimBoard::new();
    let board = board_on(&sim, config(AttachmentMode::Master), &[]);
    board
        .add_device(Device::analog_sensor("light", "Porch light level", 14))
        .unwrap();
    board.begin(Duration::from_secs(2)).unwrap();
    board.events().drain();

    let mut data = Message::to_target(MessageType::Data, 1);
    data.add_u16(512);
    sim.push(&data);

    let sensor = board.device("light").unwrap();
    assert!(wait_for(|| sensor.field("value") == Some(FieldValue::Int(512))));
    assert!(board.events().drain().iter().any(|e| matches!(
        e,
        Event::Change(c) if c.entity_id == "light" && c.field == "value"
    )));
    board.end();
}

#[test]
fn status_and_ping_round_trips() {
    let (board, _sim) = running(&["sw1"]);
    let status = board.request_status(Some("carol")).unwrap().unwrap();
    let ping = board.ping(Some("carol")).unwrap().unwrap();
    assert_ne!(status.tag, ping.tag);
    assert!(wait_for(|| board.outstanding_requests() == 0));
    assert!(board.last_ping_at().is_some());
    assert!(board.is_synchronised());

    let sw = board.device("sw1").unwrap();
    sw.ping(None).unwrap();
    assert!(wait_for(|| sw.last_ping_at().is_some()));
    board.end();
}

#[test]
fn snapshots_survive_a_new_board() {
    let (board, _sim) = running(&["sw1", "sw2"]);
    board.execute("sw2", "on", &[], None).unwrap();
    assert!(wait_for(|| pin_state(&board, "sw2") == Some(FieldValue::Bool(true))));
    board.device("sw1").unwrap().set_report_interval(250);

    let mut store = MemorySnapshotStore::new();
    board.save_snapshots(&mut store).unwrap();
    assert_eq!(store.len(), 2);

    let mut sink = LogEventSink::new();
    assert!(pump(board.events(), &mut sink) > 0);
    board.end();

    let fresh = board_on(&SimBoard::new(), config(AttachmentMode::Master), &["sw1", "sw2", "sw3"]);
    assert_eq!(fresh.restore_snapshots(&store), Ok(2));
    assert_eq!(pin_state(&fresh, "sw2"), Some(FieldValue::Bool(true)));
    assert_eq!(fresh.device("sw1").unwrap().report_interval(), 250);
    assert_eq!(pin_state(&fresh, "sw3"), Some(FieldValue::Bool(false)));
}
