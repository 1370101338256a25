use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiDevice};
use log::{debug, info};

use crate::ll::{self, ClockControl};

use super::{Error, Ready, Uninitialized, DW3000};

/// Conservative SPI clock rate used until the chip identity is verified
pub const SPI_CLOCK_SLOW_HZ: u32 = 2_000_000;

/// Full SPI clock rate for normal operation
pub const SPI_CLOCK_FAST_HZ: u32 = 8_000_000;

/// Width of the low pulse on the wake line
pub const WAKEUP_PULSE_US: u32 = 500;

/// Time the chip needs to leave low-power sleep after the wake pulse
pub const WAKEUP_LATENCY_MS: u32 = 4;

/// Minimum hold time of the reset line
pub const RESET_HOLD_MS: u32 = 2;

/// Settle time after releasing the reset line; must exceed the hold time
pub const RESET_SETTLE_MS: u32 = 10;

/// Bounded number of device-identity read attempts during bring-up
pub const DEV_ID_ATTEMPTS: u32 = 5;

/// Delay between device-identity read attempts
pub const DEV_ID_RETRY_DELAY_MS: u32 = 2;

impl<SPI, RST, WAKE, DELAY> DW3000<SPI, RST, WAKE, DELAY, Uninitialized> {
    /// Create a new instance of `DW3000`
    ///
    /// Requires the SPI device, the reset and wake pins and a delay
    /// implementation. The driver owns all four exclusively; sharing the
    /// bus with another consumer requires an external mutual-exclusion
    /// layer.
    pub fn new(spi: SPI, reset: RST, wake: WAKE, delay: DELAY) -> Self {
        DW3000 {
            ll: ll::Registers::new(spi),
            reset,
            wake,
            delay,
            state: Uninitialized,
        }
    }
}

impl<SPI, RST, WAKE, DELAY> DW3000<SPI, RST, WAKE, DELAY, Uninitialized>
where
    SPI: SpiDevice<u8> + ClockControl,
    RST: OutputPin,
    WAKE: OutputPin,
    DELAY: DelayNs,
{
    /// Initialize the DW3000
    ///
    /// Runs the full bring-up: wake pulse, hard reset, identity
    /// verification at a conservative bus clock, then the ramp to the full
    /// clock rate. On failure the driver is handed back unchanged together
    /// with the error, so the whole sequence can be retried; the chip is
    /// never left in a partially initialized but usable state.
    #[allow(clippy::type_complexity)]
    pub fn init(mut self) -> Result<DW3000<SPI, RST, WAKE, DELAY, Ready>, (Self, Error<SPI>)> {
        match self.bring_up() {
            Ok(()) => Ok(DW3000 {
                ll: self.ll,
                reset: self.reset,
                wake: self.wake,
                delay: self.delay,
                state: Ready,
            }),
            Err(error) => Err((self, error)),
        }
    }

    fn bring_up(&mut self) -> Result<(), Error<SPI>> {
        self.ll.bus().set_clock_hz(SPI_CLOCK_SLOW_HZ);

        // Wake pulse. Holding the line high afterwards keeps the chip from
        // re-entering low-power sleep.
        self.wake.set_low().map_err(|_| Error::Gpio)?;
        self.delay.delay_us(WAKEUP_PULSE_US);
        self.wake.set_high().map_err(|_| Error::Gpio)?;
        self.delay.delay_ms(WAKEUP_LATENCY_MS);

        // Hard reset, active low.
        self.reset.set_low().map_err(|_| Error::Gpio)?;
        self.delay.delay_ms(RESET_HOLD_MS);
        self.reset.set_high().map_err(|_| Error::Gpio)?;
        self.delay.delay_ms(RESET_SETTLE_MS);

        let mut last_id = 0;
        for attempt in 0..DEV_ID_ATTEMPTS {
            if attempt > 0 {
                self.delay.delay_ms(DEV_ID_RETRY_DELAY_MS);
            }

            let mut id = [0; 4];
            self.ll.read(ll::reg::DEV_ID, &mut id)?;
            let id = u32::from_le_bytes(id);
            last_id = id;

            // All-zero and all-one reads are bus fault patterns (line stuck
            // low or floating), not identities; retry.
            if id == 0 || id == u32::MAX {
                debug!("device identity read {}: bus fault pattern {:#010x}", attempt, id);
                continue;
            }

            if id & ll::DEVICE_ID_MASK != ll::DEVICE_ID & ll::DEVICE_ID_MASK {
                return Err(Error::InvalidDeviceId { found: id });
            }

            info!("DW3000 identity verified: {:#010x}", id);
            self.ll.bus().set_clock_hz(SPI_CLOCK_FAST_HZ);
            return Ok(());
        }

        if last_id == 0 {
            Err(Error::DeviceNotReady)
        } else {
            Err(Error::Timeout)
        }
    }
}
