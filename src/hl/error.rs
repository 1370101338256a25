use core::fmt;

use embedded_hal::spi;

use crate::ll;

/// An error that can occur while driving the DW3000
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// Error occurred while using the SPI bus
    Spi(ll::Error<SPI>),

    /// Error occurred while driving the reset or wake line
    Gpio,

    /// The chip did not respond on the bus (reads stuck at all-zero)
    DeviceNotReady,

    /// The chip answered, but not with the expected identity
    InvalidDeviceId {
        /// The identity that was read back
        found: u32,
    },

    /// A bounded retry was exhausted without a usable response
    Timeout,
}

impl<SPI> From<ll::Error<SPI>> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ll::Error<SPI>) -> Self {
        Error::Spi(error)
    }
}

// We can't derive this implementation, as `Debug` is only implemented
// conditionally for `ll::Error`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
            Error::Gpio => write!(f, "Gpio"),
            Error::DeviceNotReady => write!(f, "DeviceNotReady"),
            Error::InvalidDeviceId { found } => {
                write!(f, "InvalidDeviceId {{ found: {:#010x} }}", found)
            }
            Error::Timeout => write!(f, "Timeout"),
        }
    }
}

impl<SPI> fmt::Display for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl<SPI> std::error::Error for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
}

#[cfg(feature = "defmt")]
impl<SPI> defmt::Format for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi(error) => defmt::write!(f, "Spi({:?})", error),
            Error::Gpio => defmt::write!(f, "Gpio"),
            Error::DeviceNotReady => defmt::write!(f, "DeviceNotReady"),
            Error::InvalidDeviceId { found } => {
                defmt::write!(f, "InvalidDeviceId {{ found: {:#010x} }}", found)
            }
            Error::Timeout => defmt::write!(f, "Timeout"),
        }
    }
}
