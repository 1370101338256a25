//! Continuous scan loop emitting device detection events
//!
//! [`Scanner`] owns a radio in its configured state and drives it from a
//! dedicated background thread: enable the receiver, wait for a frame,
//! decode the source address, estimate the distance, hand a [`DeviceInfo`]
//! to the registered sink. Transport errors inside a cycle are logged and
//! the cycle retries; the loop never terminates on its own.
//!
//! Lifecycle is start/stop from the controlling thread. `stop` waits a
//! bounded time for the worker to exit and detaches it if the bound is
//! exceeded, so the caller is never blocked indefinitely.

use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use core::fmt;

use log::{debug, error, info, warn};

use crate::{
    configs::{PulseRepetitionFrequency, UwbChannel},
    frame::{self, FrameControl},
    hl::ScanRadio,
    ranging,
};

/// Advisory receive timeout passed to the radio each cycle
pub const RX_ENABLE_TIMEOUT_MS: u32 = 100;

/// Settle window between enabling the receiver and checking for a frame
pub const SETTLE_WAIT: Duration = Duration::from_millis(50);

/// Pause between scan cycles
pub const CYCLE_WAIT: Duration = Duration::from_millis(10);

/// Backoff after a failed receive-enable
pub const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Bounded wait for the worker to exit after a stop request
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

const STATE_STOPPED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPING: u8 = 2;

/// A detected device, as delivered to the registered sink
///
/// Constructed only for frames from which a nonzero source address was
/// recovered. Channel and PRF mirror the radio configuration, not the
/// received frame. Consumed once by the sink and never stored by the
/// scanner.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// Source device address (16-bit short or 64-bit extended), never 0
    pub device_addr: u64,
    /// Milliseconds since the scanner was created
    pub timestamp_ms: u64,
    /// Estimated distance in centimeters, from the RSSI path-loss model
    pub distance_cm: f32,
    /// Received signal strength in dBm
    pub rssi_dbm: f32,
    /// First path power index
    pub fpp_index: u16,
    /// First path power level
    pub fpp_level: f32,
    /// Configured UWB channel
    pub channel: UwbChannel,
    /// Configured pulse repetition frequency
    pub prf: PulseRepetitionFrequency,
    /// Frame quality indicator reported by the chip
    pub frame_quality: u8,
}

/// Receives detection events on the scan worker thread
///
/// Invoked synchronously from the worker, so implementations must not
/// block for long or they delay the scan cadence. Any `FnMut(DeviceInfo)`
/// closure is a sink.
pub trait DeviceSink: Send {
    /// Handle one detection event
    fn handle(&mut self, info: DeviceInfo);
}

impl<F> DeviceSink for F
where
    F: FnMut(DeviceInfo) + Send,
{
    fn handle(&mut self, info: DeviceInfo) {
        self(info)
    }
}

/// Scanner lifecycle error
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanError {
    /// `start` was called while the scanner was already running
    AlreadyActive,
    /// `stop` was called while the scanner was not running
    NotActive,
    /// The radio is not available, a previous worker still holds it
    DeviceNotReady,
    /// The worker did not exit within the stop timeout and was detached
    StopTimeout,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScanError::AlreadyActive => write!(f, "scanner is already active"),
            ScanError::NotActive => write!(f, "scanner is not active"),
            ScanError::DeviceNotReady => write!(f, "radio is not available"),
            ScanError::StopTimeout => {
                write!(f, "scan worker did not stop within the timeout")
            }
        }
    }
}

impl std::error::Error for ScanError {}

struct Shared<R, S> {
    state: AtomicU8,
    epoch: Instant,
    // Parking slots: the worker takes radio and sink while running and
    // stows them back on exit so the scanner can be restarted.
    radio: Mutex<Option<R>>,
    sink: Mutex<Option<S>>,
}

/// Drives a configured radio from a background thread
///
/// Owns the radio and the event sink; a stopped scanner can be started
/// again. Start and stop are expected to be issued from a single
/// controlling thread.
pub struct Scanner<R, S> {
    shared: Arc<Shared<R, S>>,
    worker: Option<JoinHandle<()>>,
}

impl<R, S> Scanner<R, S>
where
    R: ScanRadio + Send + 'static,
    S: DeviceSink + 'static,
{
    /// Creates a stopped scanner owning `radio` and `sink`
    pub fn new(radio: R, sink: S) -> Self {
        Scanner {
            shared: Arc::new(Shared {
                state: AtomicU8::new(STATE_STOPPED),
                epoch: Instant::now(),
                radio: Mutex::new(Some(radio)),
                sink: Mutex::new(Some(sink)),
            }),
            worker: None,
        }
    }

    /// Starts the scan worker
    ///
    /// Idempotent in the destructive sense: a second `start` without an
    /// intervening `stop` fails with [`ScanError::AlreadyActive`] and
    /// leaves the running worker untouched.
    pub fn start(&mut self) -> Result<(), ScanError> {
        if self
            .shared
            .state
            .compare_exchange(
                STATE_STOPPED,
                STATE_RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            warn!("scanner already active");
            return Err(ScanError::AlreadyActive);
        }

        let radio = lock(&self.shared.radio).take();
        let sink = lock(&self.shared.sink).take();
        let (radio, sink) = match (radio, sink) {
            (Some(radio), Some(sink)) => (radio, sink),
            // A detached worker still holds the hardware.
            _ => {
                self.shared.state.store(STATE_STOPPED, Ordering::Release);
                return Err(ScanError::DeviceNotReady);
            }
        };

        info!("starting scanner");

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("uwb-scanner".into())
            .spawn(move || run(shared, radio, sink));
        match handle {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(error) => {
                error!("failed to spawn scan worker: {}", error);
                self.shared.state.store(STATE_STOPPED, Ordering::Release);
                Err(ScanError::DeviceNotReady)
            }
        }
    }

    /// Stops the scan worker
    ///
    /// Cooperative: the worker observes the stop request between cycle
    /// iterations and may take one full cycle to honor it. Waits up to
    /// [`STOP_TIMEOUT`] for the worker to exit; on expiry the worker is
    /// detached, the error is logged and [`ScanError::StopTimeout`] is
    /// returned.
    pub fn stop(&mut self) -> Result<(), ScanError> {
        if self
            .shared
            .state
            .compare_exchange(
                STATE_RUNNING,
                STATE_STOPPING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            warn!("scanner not active");
            return Err(ScanError::NotActive);
        }

        info!("stopping scanner");

        let handle = match self.worker.take() {
            Some(handle) => handle,
            None => {
                self.shared.state.store(STATE_STOPPED, Ordering::Release);
                return Ok(());
            }
        };

        let deadline = Instant::now() + STOP_TIMEOUT;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                error!("scan worker did not exit in time, detaching it");
                self.shared.state.store(STATE_STOPPED, Ordering::Release);
                return Err(ScanError::StopTimeout);
            }
            thread::sleep(CYCLE_WAIT);
        }

        // Finished, so this join does not block.
        let _ = handle.join();
        self.shared.state.store(STATE_STOPPED, Ordering::Release);

        Ok(())
    }

    /// Whether the scan worker is currently running
    pub fn is_active(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == STATE_RUNNING
    }
}

/// The worker cycle
///
/// Runs until a stop is requested. Every failure inside the cycle is
/// non-fatal: enable and read errors are logged and the cycle retries
/// after a short delay. On exit the radio and sink are stowed back into
/// the scanner for a later restart.
fn run<R, S>(shared: Arc<Shared<R, S>>, mut radio: R, mut sink: S)
where
    R: ScanRadio,
    S: DeviceSink,
{
    info!("scan worker started");

    let config = radio.config();

    while shared.state.load(Ordering::Acquire) == STATE_RUNNING {
        if let Err(error) = radio.rx_enable(RX_ENABLE_TIMEOUT_MS) {
            error!("failed to enable RX: {:?}", error);
            thread::sleep(ERROR_BACKOFF);
            continue;
        }

        thread::sleep(SETTLE_WAIT);

        if radio.frame_ready() {
            let frame = match radio.read_frame() {
                Ok(frame) => frame,
                Err(error) => {
                    error!("failed to read frame: {:?}", error);
                    continue;
                }
            };

            debug!(
                "frame received: length={}, rssi={:.2} dBm",
                frame.length, frame.rssi_dbm
            );

            if frame.length >= frame::MIN_HEADER_LEN {
                if let Some(fcf) = FrameControl::from_frame(frame.bytes()) {
                    let device_addr = frame::source_address(frame.bytes(), &fcf);

                    // Address 0 means no valid source address was
                    // recovered; such frames are dropped.
                    if device_addr != 0 {
                        let event = DeviceInfo {
                            device_addr,
                            timestamp_ms: shared.epoch.elapsed().as_millis() as u64,
                            distance_cm: ranging::distance_cm(frame.rssi_dbm),
                            rssi_dbm: frame.rssi_dbm,
                            fpp_index: frame.fpp_index,
                            fpp_level: frame.fpp_level,
                            channel: config.channel,
                            prf: config.pulse_repetition_frequency,
                            frame_quality: frame.quality,
                        };

                        info!(
                            "device detected: addr={:#018x}, rssi={:.2} dBm, dist={:.2} cm",
                            event.device_addr, event.rssi_dbm, event.distance_cm
                        );

                        sink.handle(event);
                    }
                }
            }
        }

        thread::sleep(CYCLE_WAIT);
    }

    *lock(&shared.radio) = Some(radio);
    *lock(&shared.sink) = Some(sink);

    info!("scan worker stopped");
}

// A panicked sink must not wedge the scanner on a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{collections::VecDeque, convert::Infallible, sync::mpsc};

    use crate::{
        configs::{Config, PreambleLength},
        hl::{RawFrame, RX_BUFFER_LEN},
        time::Instant as RadioInstant,
    };

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    struct SimRadio {
        config: Config,
        frames: VecDeque<RawFrame>,
    }

    impl SimRadio {
        fn new(config: Config, frames: Vec<RawFrame>) -> Self {
            SimRadio {
                config,
                frames: frames.into(),
            }
        }
    }

    impl ScanRadio for SimRadio {
        type Error = Infallible;

        fn rx_enable(&mut self, _timeout_ms: u32) -> Result<(), Infallible> {
            Ok(())
        }

        fn frame_ready(&mut self) -> bool {
            !self.frames.is_empty()
        }

        fn read_frame(&mut self) -> Result<RawFrame, Infallible> {
            Ok(self.frames.pop_front().expect("no frame queued"))
        }

        fn config(&self) -> Config {
            self.config
        }
    }

    fn sim_frame(bytes: &[u8], rssi_dbm: f32) -> RawFrame {
        let mut buffer = [0; RX_BUFFER_LEN];
        buffer[..bytes.len()].copy_from_slice(bytes);

        RawFrame {
            buffer,
            length: bytes.len(),
            rx_time: RadioInstant::new(0).unwrap(),
            rssi_dbm,
            fpp_index: 0x1234,
            fpp_level: 30.0,
            quality: 0x55,
        }
    }

    /// A 20-byte frame with source mode extended, destination mode none
    /// and a compressed PAN ID, putting the address at bytes 3..11.
    fn extended_frame(addr: u64) -> RawFrame {
        let fcf: u16 = (0b11 << 14) | 0x40;

        let mut bytes = [0u8; 20];
        bytes[..2].copy_from_slice(&fcf.to_le_bytes());
        bytes[2] = 0x42; // sequence number
        bytes[3..11].copy_from_slice(&addr.to_le_bytes());

        sim_frame(&bytes, -65.0)
    }

    /// A radio whose transport fails a configured number of times before
    /// recovering, as a transient bus glitch would.
    struct FlakyRadio {
        config: Config,
        enable_failures: u32,
        read_failures: u32,
        frames: VecDeque<RawFrame>,
    }

    impl ScanRadio for FlakyRadio {
        type Error = &'static str;

        fn rx_enable(&mut self, _timeout_ms: u32) -> Result<(), &'static str> {
            if self.enable_failures > 0 {
                self.enable_failures -= 1;
                return Err("bus glitch");
            }
            Ok(())
        }

        fn frame_ready(&mut self) -> bool {
            !self.frames.is_empty()
        }

        fn read_frame(&mut self) -> Result<RawFrame, &'static str> {
            if self.read_failures > 0 {
                self.read_failures -= 1;
                return Err("bus glitch");
            }
            Ok(self.frames.pop_front().expect("no frame queued"))
        }

        fn config(&self) -> Config {
            self.config
        }
    }

    /// A radio that never returns from `rx_enable` within the stop bound.
    struct StuckRadio {
        config: Config,
    }

    impl ScanRadio for StuckRadio {
        type Error = Infallible;

        fn rx_enable(&mut self, _timeout_ms: u32) -> Result<(), Infallible> {
            thread::sleep(STOP_TIMEOUT + Duration::from_secs(1));
            Ok(())
        }

        fn frame_ready(&mut self) -> bool {
            false
        }

        fn read_frame(&mut self) -> Result<RawFrame, Infallible> {
            unreachable!("no frame is ever ready")
        }

        fn config(&self) -> Config {
            self.config
        }
    }

    fn channel_sink() -> (impl FnMut(DeviceInfo) + Send, mpsc::Receiver<DeviceInfo>) {
        let (tx, rx) = mpsc::channel();
        (
            move |info| {
                let _ = tx.send(info);
            },
            rx,
        )
    }

    #[test]
    fn start_twice_is_rejected_with_one_worker_running() {
        init_logs();

        let radio = SimRadio::new(Config::default(), Vec::new());
        let (sink, _rx) = channel_sink();

        let mut scanner = Scanner::new(radio, sink);
        assert!(!scanner.is_active());

        scanner.start().unwrap();
        assert!(scanner.is_active());
        assert_eq!(scanner.start(), Err(ScanError::AlreadyActive));
        assert!(scanner.is_active());

        scanner.stop().unwrap();
        assert!(!scanner.is_active());
    }

    #[test]
    fn stop_without_start_is_rejected() {
        init_logs();

        let radio = SimRadio::new(Config::default(), Vec::new());
        let (sink, _rx) = channel_sink();

        let mut scanner = Scanner::new(radio, sink);
        assert_eq!(scanner.stop(), Err(ScanError::NotActive));
    }

    #[test]
    fn a_stopped_scanner_can_be_restarted() {
        init_logs();

        let radio = SimRadio::new(Config::default(), Vec::new());
        let (sink, _rx) = channel_sink();

        let mut scanner = Scanner::new(radio, sink);
        scanner.start().unwrap();
        scanner.stop().unwrap();
        scanner.start().unwrap();
        scanner.stop().unwrap();
    }

    #[test]
    fn emits_an_event_for_an_extended_source_address() {
        init_logs();

        let addr = 0x0102030405060708;
        let radio = SimRadio::new(Config::default(), vec![extended_frame(addr)]);
        let (sink, rx) = channel_sink();

        let mut scanner = Scanner::new(radio, sink);
        scanner.start().unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.device_addr, addr);
        assert!((event.rssi_dbm - (-65.0)).abs() < f32::EPSILON);
        assert!(event.distance_cm > 0.0);
        assert_eq!(event.fpp_index, 0x1234);
        assert_eq!(event.frame_quality, 0x55);

        scanner.stop().unwrap();
    }

    #[test]
    fn extracts_the_address_after_an_uncompressed_source_pan() {
        init_logs();

        // Same frame shape, but without PAN ID compression the source PAN
        // shifts the address to bytes 5..13.
        let addr: u64 = 0x1122334455667788;
        let fcf: u16 = 0b11 << 14;

        let mut bytes = [0u8; 20];
        bytes[..2].copy_from_slice(&fcf.to_le_bytes());
        bytes[2] = 0x42;
        bytes[5..13].copy_from_slice(&addr.to_le_bytes());

        let radio = SimRadio::new(Config::default(), vec![sim_frame(&bytes, -60.0)]);
        let (sink, rx) = channel_sink();

        let mut scanner = Scanner::new(radio, sink);
        scanner.start().unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.device_addr, addr);

        scanner.stop().unwrap();
    }

    #[test]
    fn short_and_invalid_frames_produce_no_event() {
        init_logs();

        let frames = vec![
            // Below the minimum decodable length
            sim_frame(&[0xAB, 0xCD], -50.0),
            // Long enough, but no source address present (source mode none)
            sim_frame(&[0x00, 0x00, 0x01, 0x02, 0x03], -50.0),
        ];

        let radio = SimRadio::new(Config::default(), frames);
        let (sink, rx) = channel_sink();

        let mut scanner = Scanner::new(radio, sink);
        scanner.start().unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());

        scanner.stop().unwrap();
    }

    #[test]
    fn survives_transport_errors_and_keeps_scanning() {
        init_logs();

        // Three failed receive-enables and one failed frame read, then a
        // good frame: the cycle must retry through all of it.
        let addr = 0x0102030405060708;
        let radio = FlakyRadio {
            config: Config::default(),
            enable_failures: 3,
            read_failures: 1,
            frames: vec![extended_frame(addr)].into(),
        };
        let (sink, rx) = channel_sink();

        let mut scanner = Scanner::new(radio, sink);
        scanner.start().unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.device_addr, addr);
        assert!(scanner.is_active());

        scanner.stop().unwrap();
    }

    #[test]
    fn stop_timeout_detaches_the_worker_and_blocks_restart() {
        init_logs();

        let radio = StuckRadio {
            config: Config::default(),
        };
        let (sink, _rx) = channel_sink();

        let mut scanner = Scanner::new(radio, sink);
        scanner.start().unwrap();

        // Let the worker enter the blocking rx_enable before stopping.
        thread::sleep(Duration::from_millis(100));

        assert_eq!(scanner.stop(), Err(ScanError::StopTimeout));
        assert!(!scanner.is_active());

        // The detached worker still holds the radio and sink.
        assert_eq!(scanner.start(), Err(ScanError::DeviceNotReady));
        assert!(!scanner.is_active());
    }

    #[test]
    fn events_mirror_the_radio_configuration() {
        init_logs();

        let config = Config {
            channel: UwbChannel::Channel9,
            pulse_repetition_frequency: PulseRepetitionFrequency::Mhz16,
            preamble_length: PreambleLength::Symbols256,
            ..Config::default()
        };

        let radio = SimRadio::new(config, vec![extended_frame(0xDEADBEEF00C0FFEE)]);
        let (sink, rx) = channel_sink();

        let mut scanner = Scanner::new(radio, sink);
        scanner.start().unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.channel, UwbChannel::Channel9);
        assert_eq!(event.prf, PulseRepetitionFrequency::Mhz16);

        scanner.stop().unwrap();
    }
}
