//! Driver and passive scanner for the DW3000 UWB transceiver
//!
//! This crate drives a DW3000 ultra-wideband radio over SPI to passively
//! detect nearby transmitting devices, estimate their distance from signal
//! strength and deliver structured detection events.
//!
//! The driver is built on [`embedded-hal`], so it is portable to any
//! platform providing an SPI device, two output pins (reset and wake) and
//! a delay implementation. The driver layers are usable on their own in a
//! `no_std` environment; the [`scanner`] module adds a background scan
//! worker and requires the `std` feature (enabled by default).
//!
//! # Layers
//!
//! - [`ll`]: register-level transport, addressed byte transfers.
//! - [`hl`]: the [`DW3000`] driver, tracking bring-up through type state.
//! - [`frame`]: pure decoder recovering a source address from a received
//!   frame header.
//! - [`ranging`]: RSSI path-loss distance estimation.
//! - [`scanner`]: the continuous scan loop emitting [`DeviceInfo`] events.
//!
//! # Usage
//!
//! Bring the chip up, configure it and hand it to a scanner:
//!
//! ```no_run
//! # fn run<SPI, RST, WAKE, DELAY>(
//! #     spi: SPI,
//! #     reset: RST,
//! #     wake: WAKE,
//! #     delay: DELAY,
//! # ) -> Result<(), Box<dyn std::error::Error>>
//! # where
//! #     SPI: uwb_scanner::ll::ClockControl
//! #         + embedded_hal::spi::SpiDevice<u8>
//! #         + Send
//! #         + 'static,
//! #     SPI::Error: core::fmt::Debug + Send,
//! #     RST: embedded_hal::digital::OutputPin + Send + 'static,
//! #     WAKE: embedded_hal::digital::OutputPin + Send + 'static,
//! #     DELAY: embedded_hal::delay::DelayNs + Send + 'static,
//! # {
//! use uwb_scanner::{Config, DeviceInfo, Scanner, DW3000};
//!
//! let dw3000 = DW3000::new(spi, reset, wake, delay)
//!     .init()
//!     .map_err(|(_, error)| error)?;
//! let dw3000 = dw3000
//!     .configure(Config::default())
//!     .map_err(|(_, error)| error)?;
//!
//! let mut scanner = Scanner::new(dw3000, |info: DeviceInfo| {
//!     println!("detected {:#018x} at {:.0} cm", info.device_addr, info.distance_cm);
//! });
//! scanner.start()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod configs;
pub mod frame;
pub mod hl;
pub mod ll;
pub mod ranging;
#[cfg(feature = "std")]
pub mod scanner;
pub mod time;

pub use crate::configs::{Config, PreambleLength, PulseRepetitionFrequency, UwbChannel};
pub use crate::hl::{
    Configured, Error, RawFrame, Ready, ScanRadio, Uninitialized, DW3000,
};
#[cfg(feature = "std")]
pub use crate::scanner::{DeviceInfo, DeviceSink, ScanError, Scanner};
