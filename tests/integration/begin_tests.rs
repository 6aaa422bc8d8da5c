//! Session bring-up against the simulated board.

use std::time::Duration;

use admlink::protocol::{BOARD_ID, MessageType, Transport};
use admlink::{AttachmentMode, Board, BoardConfig, BoardState, Device, DeviceState, Error};

use crate::sim_board::{SimBoard, wait_for};

pub fn config(mode: AttachmentMode) -> BoardConfig {
    BoardConfig {
        board_id: "b1".into(),
        attachment_mode: mode,
        connect_timeout_ms: 500,
        connect_poll_interval_ms: 10,
        ready_poll_interval_ms: 10,
        begin_timeout_ms: 2_000,
        ..BoardConfig::default()
    }
}

pub fn board_on(sim: &SimBoard, cfg: BoardConfig, ids: &[&str]) -> Board {
    let board = Board::new(cfg, sim.clone()).unwrap();
    for (i, id) in ids.iter().enumerate() {
        board.add_device(Device::switch(id, id, i as u8 + 2)).unwrap();
    }
    board
}

#[test]
fn begin_brings_board_and_devices_ready() {
    let sim = SimBoard::new();
    let board = board_on(&sim, config(AttachmentMode::Master), &["sw1", "sw2", "sw3"]);

    board.begin(Duration::from_secs(2)).unwrap();

    assert_eq!(board.state(), BoardState::DeviceConfigured);
    assert!(board.is_ready());
    assert!(board.is_synchronised());
    assert_eq!(board.capacity(), Some(16));
    for device in board.devices() {
        assert_eq!(device.state(), DeviceState::Configured);
    }

    let inits = sim.received_of(MessageType::Initialise);
    assert_eq!(inits.len(), 4);
    assert_eq!(inits[0].target, BOARD_ID);
    assert_eq!(inits[0].get_u8(1).unwrap(), 3);
    let device_targets: Vec<u8> = inits[1..].iter().map(|m| m.target).collect();
    assert_eq!(device_targets, vec![1, 2, 3]);
    assert_eq!(sim.received_of(MessageType::Configure).len(), 4);
    board.end();
}

#[test]
fn begin_without_devices() {
    let sim = SimBoard::new();
    let board = board_on(&sim, config(AttachmentMode::Master), &[]);
    board.begin(Duration::from_secs(2)).unwrap();
    assert_eq!(board.state(), BoardState::DeviceConfigured);
    assert!(board.is_ready());
    board.end();
}

#[test]
fn observer_reads_state_instead_of_configuring() {
    let sim = SimBoard::new();
    let board = board_on(&sim, config(AttachmentMode::Observer), &["sw1", "sw2"]);
    board.begin(Duration::from_secs(2)).unwrap();

    assert!(board.is_ready());
    assert_eq!(board.state(), BoardState::DeviceConfigured);
    assert!(
        sim.received_of(MessageType::Initialise)
            .iter()
            .all(|m| m.target == BOARD_ID)
    );
    let device_status: Vec<u8> = sim
        .received_of(MessageType::StatusRequest)
        .iter()
        .map(|m| m.target)
        .filter(|t| *t != BOARD_ID)
        .collect();
    assert!(device_status.contains(&1) && device_status.contains(&2));
    board.end();
}

#[test]
fn silent_board_exhausts_begin_attempts() {
    let sim = SimBoard::new();
    sim.state.lock().silent = true;
    let mut cfg = config(AttachmentMode::Master);
    cfg.max_begin_attempts = 2;
    let board = board_on(&sim, cfg, &["sw1"]);

    assert_eq!(
        board.begin(Duration::from_millis(150)),
        Err(Error::ReadyTimeout)
    );
    assert_eq!(sim.state.lock().opens, 2);
    assert!(!board.is_connected());
    assert_eq!(board.state(), BoardState::Created);
}

#[test]
fn refused_link_fails_begin() {
    let sim = SimBoard::new();
    sim.state.lock().refuse_open = true;
    let mut cfg = config(AttachmentMode::Master);
    cfg.max_begin_attempts = 1;
    let board = board_on(&sim, cfg, &[]);

    assert!(matches!(
        board.begin(Duration::from_millis(200)),
        Err(Error::TransportOpen(_))
    ));
}

#[test]
fn device_count_mismatch_fails_begin() {
    let sim = SimBoard::new();
    sim.state.lock().reported_devices = Some(5);
    let mut cfg = config(AttachmentMode::Master);
    cfg.max_begin_attempts = 1;
    let board = board_on(&sim, cfg, &["sw1"]);

    assert_eq!(
        board.begin(Duration::from_secs(2)),
        Err(Error::DeviceCountMismatch {
            local: 1,
            remote: 5
        })
    );
    assert!(wait_for(|| !board.is_connected()));
}

#[test]
fn supervisor_reconnects_after_hang_up() {
    let sim = SimBoard::new();
    let mut cfg = config(AttachmentMode::Master);
    cfg.supervisor_interval_ms = 100;
    cfg.inactivity_timeout_ms = 1_000;
    let board = board_on(&sim, cfg, &["sw1"]);
    board.begin(Duration::from_secs(2)).unwrap();
    assert_eq!(sim.state.lock().opens, 1);

    sim.hang_up();
    assert!(wait_for(|| sim.state.lock().opens >= 2));
    assert!(wait_for(|| board.is_ready()));
    assert_eq!(
        board.device("sw1").map(|d| d.state()),
        Some(DeviceState::Configured)
    );
    board.end();
    assert!(!board.is_connected());
}

#[test]
fn end_is_idempotent() {
    let sim = SimBoard::new();
    let board = board_on(&sim, config(AttachmentMode::Master), &["sw1"]);
    board.begin(Duration::from_secs(2)).unwrap();
    board.end();
    board.end();
    assert!(board.is_stopping());
    assert!(!sim.is_open());
}
