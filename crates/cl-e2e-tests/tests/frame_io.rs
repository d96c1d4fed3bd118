//! E2E tests for frame transmission and reception through the wire codec.

mod helpers;

use std::time::{Duration, Instant};

use cl_canbus::wire::{CAN_EFF_FLAG, CAN_ERR_FLAG, CAN_RTR_FLAG, err_class};
use cl_canbus::{CanError, CanFrame, ErrorKind, WireFrame};

use helpers::{IFACE, TestHarness, WAIT};

/// Extended data frame survives the round trip with id, flags and payload.
#[test]
fn e2e_extended_frame_round_trip() {
    let h = TestHarness::started();
    h.tx.send_data(0x18FF_1234, true, &[0x11, 0x22, 0x33, 0x44]).unwrap();

    let frame = h.rx.receive_frame(WAIT).unwrap();
    assert_eq!(frame.id, 0x18FF_1234);
    assert!(frame.extended);
    assert!(!frame.remote);
    assert!(!frame.error);
    assert_eq!(frame.dlc, 4);
    assert_eq!(frame.payload(), &[0x11, 0x22, 0x33, 0x44]);

    assert_eq!(h.tx.statistics().unwrap().tx_frames, 1);
    assert_eq!(h.rx.statistics().unwrap().rx_frames, 1);
}

/// Remote frames arrive with no payload.
#[test]
fn e2e_remote_frame() {
    let h = TestHarness::started();
    h.tx.send_remote(0x456, false).unwrap();

    let frame = h.rx.receive_frame(WAIT).unwrap();
    assert_eq!(frame.id, 0x456);
    assert!(frame.remote);
    assert_eq!(frame.dlc, 0);
    assert!(frame.payload().is_empty());
}

/// Boundary ids: the largest standard and extended ids are accepted,
/// one past them is rejected before reaching the wire.
#[test]
fn e2e_id_boundaries() {
    let h = TestHarness::started();
    h.tx.send_data(0x7FF, false, &[]).unwrap();
    h.tx.send_data(0x1FFF_FFFF, true, &[]).unwrap();
    assert_eq!(h.rx.receive_frame(WAIT).unwrap().id, 0x7FF);
    assert_eq!(h.rx.receive_frame(WAIT).unwrap().id, 0x1FFF_FFFF);

    assert_eq!(
        h.tx.send_data(0x800, false, &[]).unwrap_err().kind(),
        ErrorKind::InvalidParam
    );
    assert_eq!(
        h.tx.send_data(0x2000_0000, true, &[]).unwrap_err().kind(),
        ErrorKind::InvalidParam
    );
    assert!(matches!(
        h.rx.receive_frame(Duration::from_millis(20)),
        Err(CanError::Timeout { .. })
    ));
}

/// Nine data bytes are rejected.
#[test]
fn e2e_oversized_payload_rejected() {
    let h = TestHarness::started();
    let frame = CanFrame::new_data(0x10, false, &[0; 9]);
    assert_eq!(h.tx.send_frame(&frame).unwrap_err().code(), -1);
    assert_eq!(h.tx.statistics().unwrap().tx_frames, 0);
}

/// A bounded receive on a quiet bus fails Timeout close to the bound.
#[test]
fn e2e_receive_timeout_is_bounded() {
    let h = TestHarness::started();
    let started = Instant::now();
    let err = h.rx.receive_frame(Duration::from_millis(50)).unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err, CanError::Timeout { timeout_ms: 50 });
    assert!(elapsed >= Duration::from_millis(45), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "blocked too long: {elapsed:?}");
}

/// Raw frames injected by another node decode by their marker bits.
#[test]
fn e2e_injected_raw_frames_decode() {
    let h = TestHarness::started();
    h.bus.inject(IFACE, WireFrame::from_parts(CAN_EFF_FLAG | 0x0ABC_DEF0, 2, &[9, 8]));
    h.bus.inject(IFACE, WireFrame::from_parts(CAN_RTR_FLAG | 0x7DF, 0, &[]));

    let ext = h.rx.receive_frame(WAIT).unwrap();
    assert!(ext.extended);
    assert_eq!(ext.id, 0x0ABC_DEF0);
    assert_eq!(ext.payload(), &[9, 8]);

    let remote = h.rx.receive_frame(WAIT).unwrap();
    assert!(remote.remote);
    assert!(!remote.extended);
    assert_eq!(remote.id, 0x7DF);
}

/// Error frames count separately and set the last error from the protocol
/// class bits.
#[test]
fn e2e_error_frames_update_counters() {
    let h = TestHarness::started();
    h.bus.inject(
        IFACE,
        WireFrame::from_parts(CAN_ERR_FLAG | err_class::NO_ACK, 8, &[]),
    );

    let frame = h.rx.receive_frame(WAIT).unwrap();
    assert!(frame.error);
    assert!(frame.payload().is_empty());

    let stats = h.rx.statistics().unwrap();
    assert_eq!(stats.error_frames, 1);
    assert_eq!(stats.rx_frames, 0);
    assert_eq!(h.rx.error_counters().unwrap().rx_errors, 1);
    assert_eq!(h.rx.last_error().unwrap(), Some(ErrorKind::Ack));
}

/// Statistics serialize for status reporting.
#[test]
fn e2e_statistics_serialize() {
    let h = TestHarness::started();
    h.tx.send_data(0x1, false, &[1]).unwrap();
    let json = serde_json::to_value(h.tx.statistics().unwrap()).unwrap();
    assert_eq!(json["tx_frames"], 1);
    assert_eq!(json["rx_frames"], 0);
}
