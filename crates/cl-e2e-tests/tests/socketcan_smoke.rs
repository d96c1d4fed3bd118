//! Smoke test against a real SocketCAN interface.
//!
//! Needs `vcan0`:
//! `sudo modprobe vcan && sudo ip link add dev vcan0 type vcan && sudo ip link set up vcan0`.
//! Run with `cargo test -p cl-e2e-tests -- --ignored`.

#![cfg(target_os = "linux")]

use std::time::Duration;

use cl_canbus::{CanBus, ErrorKind};

/// Two sockets on vcan0 exchange an extended frame.
#[test]
#[ignore = "requires a vcan0 interface"]
fn e2e_vcan_round_trip() {
    let tx = CanBus::init("vcan0").unwrap();
    let rx = CanBus::init("vcan0").unwrap();

    tx.send_data(0x18FF_1234, true, &[0x11, 0x22, 0x33, 0x44]).unwrap();
    let frame = rx.receive_frame(Duration::from_millis(500)).unwrap();

    assert_eq!(frame.id, 0x18FF_1234);
    assert!(frame.extended);
    assert_eq!(frame.payload(), &[0x11, 0x22, 0x33, 0x44]);

    tx.deinit().unwrap();
    rx.deinit().unwrap();
}

/// An unknown interface is reported as not found.
#[test]
#[ignore = "touches the host network stack"]
fn e2e_missing_interface() {
    let err = CanBus::init("nocan7").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::DeviceNotFound);
}
