//! The same session over a real socket.

use std::time::Duration;

use admlink::adapters::TcpTransport;
use admlink::protocol::MessageType;
use admlink::snapshot::FieldValue;
use admlink::{AttachmentMode, Board, BoardState, Device};

use crate::begin_tests::config;
use crate::sim_board::{spawn_tcp_board, wait_for};

#[test]
fn board_over_tcp() {
    let (addr, sim) = spawn_tcp_board();
    let transport = TcpTransport::new(addr).with_connect_timeout(Duration::from_secs(1));
    let board = Board::new(config(AttachmentMode::Master), transport).unwrap();
    board.add_device(Device::switch("sw1", "Porch", 2)).unwrap();
    board.add_device(Device::switch("sw2", "Hall", 3)).unwrap();

    board.begin(Duration::from_secs(2)).unwrap();
    assert_eq!(board.state(), BoardState::DeviceConfigured);

    let request = board.execute("sw2", "on", &[], Some("eve")).unwrap();
    let sw2 = board.device("sw2").unwrap();
    assert!(wait_for(|| sw2.field("pin_state") == Some(FieldValue::Bool(true))));
    assert!(wait_for(|| board.outstanding_requests() == 0));
    {
        let sim = sim.lock();
        assert!(sim.pin(2));
        let commands = sim.received_of(MessageType::Command);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].tag, request.tag);
    }

    board.end();
    assert!(!board.is_connected());
}

#[test]
fn unreachable_board_fails_begin() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut cfg = config(AttachmentMode::Master);
    cfg.max_begin_attempts = 1;
    let transport = TcpTransport::new(addr).with_connect_timeout(Duration::from_millis(200));
    let board = Board::new(cfg, transport).unwrap();
    assert!(board.begin(Duration::from_millis(500)).is_err());
    assert!(!board.is_connected());
}
