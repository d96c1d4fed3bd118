//! Shared test harness for E2E integration tests.
//!
//! Two handles on one in-process virtual interface, so frames sent on one
//! arrive on the other through the real validate → encode → decode path.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cl_canbus::{CanBus, VirtualBus, VirtualTransport};

pub const IFACE: &str = "vcan0";

/// Generous wait for frames that are already queued.
pub const WAIT: Duration = Duration::from_millis(200);

pub type Handle = CanBus<VirtualTransport>;

/// A virtual bus with a sending and a receiving handle.
pub struct TestHarness {
    pub bus: VirtualBus,
    pub tx: Arc<Handle>,
    pub rx: Arc<Handle>,
}

impl TestHarness {
    /// Both handles initialized and started on `vcan0`.
    pub fn started() -> Self {
        let h = Self::initialized();
        h.tx.start().unwrap();
        h.rx.start().unwrap();
        h
    }

    /// Both handles initialized, not yet started.
    pub fn initialized() -> Self {
        let bus = VirtualBus::with_interfaces(&[IFACE]);
        let tx = Arc::new(open(&bus));
        let rx = Arc::new(open(&bus));
        Self { bus, tx, rx }
    }

    /// Open one more handle on the same interface.
    pub fn extra_handle(&self) -> Handle {
        open(&self.bus)
    }
}

fn open(bus: &VirtualBus) -> Handle {
    CanBus::init_with(IFACE, |name| bus.open(name)).unwrap()
}
