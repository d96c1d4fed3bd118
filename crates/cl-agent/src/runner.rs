//! Async driver for the blocking demo and record loops.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use cl_asc_log::AscLogWriter;
use cl_canbus::{CanBus, FrameTransport};

use crate::cli::Mode;
use crate::config::AgentConfig;
use crate::demo::{self, DemoSettings};
use crate::record;

/// Run `mode` on `bus` until it finishes or `shutdown` resolves, then stop
/// and deinitialize the handle.
///
/// Every handle call runs on the blocking pool; `shutdown` only clears the
/// shared running flag, so the loop exits after its current receive.
pub async fn run_mode<T, S>(
    bus: Arc<CanBus<T>>,
    mode: Mode,
    config: AgentConfig,
    shutdown: S,
) -> anyhow::Result<()>
where
    T: FrameTransport + 'static,
    S: Future<Output = ()>,
{
    let running = Arc::new(AtomicBool::new(true));

    let mut worker = {
        let bus = bus.clone();
        let running = running.clone();
        tokio::task::spawn_blocking(move || run_blocking(&bus, &mode, &config, &running))
    };

    let result = tokio::select! {
        res = &mut worker => res,
        () = shutdown => {
            tracing::info!("shutdown signal received");
            running.store(false, Ordering::Relaxed);
            worker.await
        }
    };
    let outcome = result.context("worker task panicked").and_then(|r| r);

    let teardown = tokio::task::spawn_blocking(move || {
        if let Err(e) = bus.stop() {
            tracing::warn!(device = %bus.device_name(), error = %e, "stop failed");
        }
        bus.deinit()
    })
    .await
    .context("teardown task panicked")?;
    teardown.context("deinit failed")?;

    outcome
}

fn run_blocking<T: FrameTransport>(
    bus: &CanBus<T>,
    mode: &Mode,
    config: &AgentConfig,
    running: &AtomicBool,
) -> anyhow::Result<()> {
    match mode {
        Mode::Demo => {
            bus.configure(&config.can)?;
            bus.start()?;
            tracing::info!(
                device = %bus.device_name(),
                bitrate = config.can.bitrate,
                "demo started"
            );
            demo::run(bus, &DemoSettings::from(config), running);
            Ok(())
        }
        Mode::Record { .. } => {
            bus.configure(&config.can)?;
            bus.start()?;
            let mut writer = AscLogWriter::create(config.log.settings.clone())?;
            tracing::info!(
                device = %bus.device_name(),
                path = %writer.current_path().display(),
                "recording started"
            );
            record::run(
                bus,
                &mut writer,
                config.log.channel,
                config.receive_timeout(),
                running,
            )?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use cl_canbus::wire::WireFrame;
    use cl_canbus::{BusState, CanResult, LinkState, VirtualBus, VirtualTransport};

    use super::*;

    fn fast_config(dir: &std::path::Path) -> AgentConfig {
        let mut config = AgentConfig {
            tick_ms: 2,
            receive_timeout_ms: 5,
            ..AgentConfig::default()
        };
        config.log.settings.directory = dir.to_path_buf();
        config
    }

    fn handle(bus: &VirtualBus) -> Arc<CanBus<VirtualTransport>> {
        Arc::new(CanBus::init_with("vcan0", |name| bus.open(name)).unwrap())
    }

    #[tokio::test]
    async fn demo_runs_until_shutdown_then_deinits() {
        let dir = tempfile::tempdir().unwrap();
        let vbus = VirtualBus::with_interfaces(&["vcan0"]);
        let bus = handle(&vbus);

        run_mode(
            bus.clone(),
            Mode::Demo,
            fast_config(dir.path()),
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        assert!(!bus.is_initialized());
        assert_eq!(bus.state(), BusState::Stopped);
        assert_eq!(vbus.endpoint_count("vcan0"), 0);
    }

    #[tokio::test]
    async fn record_writes_received_frames() {
        let dir = tempfile::tempdir().unwrap();
        let vbus = VirtualBus::with_interfaces(&["vcan0"]);
        let bus = handle(&vbus);
        let peer = CanBus::init_with("vcan0", |name| vbus.open(name)).unwrap();

        let sender = tokio::task::spawn_blocking(move || {
            std::thread::sleep(Duration::from_millis(30));
            peer.send_data(0x321, false, &[0xCA, 0xFE]).unwrap();
        });

        run_mode(
            bus,
            Mode::Record { out_dir: None },
            fast_config(dir.path()),
            tokio::time::sleep(Duration::from_millis(150)),
        )
        .await
        .unwrap();
        sender.await.unwrap();

        let log = std::fs::read_to_string(dir.path().join("canlog_000.asc")).unwrap();
        assert!(log.lines().any(|line| line.ends_with(" 1 321 Rx d 2 CA FE")));
    }

    #[tokio::test]
    async fn start_failure_is_returned_after_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let vbus = VirtualBus::with_interfaces(&["vcan0"]);
        let bus = handle(&vbus);
        vbus.restrict("vcan0");

        let err = run_mode(
            bus.clone(),
            Mode::Demo,
            fast_config(dir.path()),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert!(err.downcast_ref::<cl_canbus::CanError>().is_some());
        assert!(!bus.is_initialized());
    }

    #[tokio::test]
    async fn zero_receive_timeout_still_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let vbus = VirtualBus::with_interfaces(&["vcan0"]);
        let bus = handle(&vbus);
        let config = AgentConfig {
            receive_timeout_ms: 0,
            ..fast_config(dir.path())
        };

        let finished = tokio::time::timeout(
            Duration::from_secs(2),
            run_mode(
                bus.clone(),
                Mode::Record { out_dir: None },
                config,
                tokio::time::sleep(Duration::from_millis(50)),
            ),
        )
        .await;

        assert!(finished.is_ok(), "run_mode did not return after shutdown");
        finished.unwrap().unwrap();
        assert!(!bus.is_initialized());
    }

    struct RecordingTransport {
        inner: VirtualTransport,
        applied: Arc<Mutex<Vec<u32>>>,
    }

    impl FrameTransport for RecordingTransport {
        fn set_interface_state(&mut self, state: LinkState) -> CanResult<()> {
            self.inner.set_interface_state(state)
        }
        fn write(&mut self, frame: &WireFrame) -> std::io::Result<()> {
            self.inner.write(frame)
        }
        fn read(&mut self) -> std::io::Result<WireFrame> {
            self.inner.read()
        }
        fn poll_readable(&mut self, timeout: Duration) -> std::io::Result<bool> {
            self.inner.poll_readable(timeout)
        }
        fn apply_bitrate(&mut self, bitrate: u32) -> CanResult<()> {
            self.applied.lock().unwrap().push(bitrate);
            Ok(())
        }
    }

    #[tokio::test]
    async fn record_applies_configured_bitrate() {
        let dir = tempfile::tempdir().unwrap();
        let vbus = VirtualBus::with_interfaces(&["vcan0"]);
        let applied = Arc::new(Mutex::new(Vec::new()));
        let bus = Arc::new(
            CanBus::init_with("vcan0", |name| {
                Ok(RecordingTransport {
                    inner: vbus.open(name)?,
                    applied: applied.clone(),
                })
            })
            .unwrap(),
        );
        let mut config = fast_config(dir.path());
        config.can.bitrate = 250_000;

        run_mode(
            bus,
            Mode::Record { out_dir: None },
            config,
            tokio::time::sleep(Duration::from_millis(30)),
        )
        .await
        .unwrap();

        assert_eq!(*applied.lock().unwrap(), vec![250_000]);
    }
}
