//! High-level interface to the DW3000
//!
//! The entry point to this API is the [`DW3000`] struct. It uses the type
//! system to track the chip's bring-up: a driver starts [`Uninitialized`],
//! becomes [`Ready`] after the wake/reset/identity sequence of
//! [`DW3000::init`], and [`Configured`] once the radio parameters have been
//! applied. A failed transition hands the driver back together with the
//! error, so the caller can retry the whole bring-up; a failure never
//! yields a partially-initialized driver.
//!
//! Listening is not a separate type state. The scan loop re-enables the
//! receiver and drains frames many times per second and must recover from
//! transport errors in place, so the receiver state is a runtime flag
//! inside [`Configured`].

use core::fmt;

pub use error::*;
pub use scanning::*;
pub use uninitialized::*;

use embedded_hal::{delay::DelayNs, spi::SpiDevice};

use crate::{configs::Config, ll};

mod error;
mod ready;
mod scanning;
mod uninitialized;

/// Entry point to the DW3000 driver API
pub struct DW3000<SPI, RST, WAKE, DELAY, State> {
    ll: ll::Registers<SPI>,
    reset: RST,
    wake: WAKE,
    delay: DELAY,
    state: State,
}

/// Indicates the driver has not yet brought the chip up
#[derive(Debug)]
pub struct Uninitialized;

/// Indicates the chip is awake and its identity has been verified
#[derive(Debug)]
pub struct Ready;

/// Indicates the radio parameters have been applied
///
/// Carries the applied [`Config`] (read-only from here on) and whether the
/// receiver is currently enabled.
#[derive(Debug)]
pub struct Configured {
    config: Config,
    listening: bool,
}

/// Marker for states in which the chip is awake and can be addressed
pub trait Awake {}

impl Awake for Ready {}
impl Awake for Configured {}

impl<SPI, RST, WAKE, DELAY, State> DW3000<SPI, RST, WAKE, DELAY, State> {
    /// Provides direct access to the register-level API
    ///
    /// Be aware that by using the register-level API, you can invalidate
    /// assumptions the high-level API makes about the state of the chip.
    pub fn ll(&mut self) -> &mut ll::Registers<SPI> {
        &mut self.ll
    }

    /// Releases the bus and GPIO resources owned by the driver
    pub fn free(self) -> (SPI, RST, WAKE, DELAY) {
        (self.ll.free(), self.reset, self.wake, self.delay)
    }
}

impl<SPI, RST, WAKE, DELAY, State> DW3000<SPI, RST, WAKE, DELAY, State>
where
    SPI: SpiDevice<u8>,
    DELAY: DelayNs,
    State: Awake,
{
    /// Commands a soft reset of the chip and waits for it to settle
    ///
    /// The driver's type state is unchanged; the caller is responsible for
    /// re-applying configuration if the chip needed it.
    pub fn soft_reset(&mut self) -> Result<(), Error<SPI>> {
        self.ll
            .write(ll::reg::SOFT_RESET, &[ll::SOFT_RESET_CMD])?;
        self.delay.delay_ms(RESET_SETTLE_MS);

        Ok(())
    }
}

// Can't be derived without putting requirements on the bus and pin types.
impl<SPI, RST, WAKE, DELAY, State> fmt::Debug for DW3000<SPI, RST, WAKE, DELAY, State>
where
    State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DW3000 {{ state: ")?;
        self.state.fmt(f)?;
        write!(f, ", .. }}")
    }
}
