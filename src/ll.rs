//! Low-level interface to the DW3000
//!
//! This module implements the register-level transport to the DW3000. Users
//! of this crate should typically not need it and can stay on the
//! [high-level interface] instead.
//!
//! Register accesses are addressed byte transfers: a short (1-byte) SPI
//! header for register addresses below [`SHORT_ADDR_LIMIT`], an extended
//! (3-byte) header for the rest of the 15-bit address space. Header and
//! payload travel in a single bus transaction, so the whole access happens
//! under one chip-select assertion.
//!
//! [high-level interface]: ../hl/index.html

use core::fmt;

use embedded_hal::spi::{self, Operation, SpiDevice};

/// Opcode bit for a register write
pub const SPI_WRITE: u8 = 0x80;

/// Opcode for a register read
pub const SPI_READ: u8 = 0x00;

/// First register address that requires the extended 3-byte header
pub const SHORT_ADDR_LIMIT: u16 = 0x80;

/// Register addresses used by this driver
///
/// The DW3000 register file is much larger; only the subset the scanner
/// depends on is named here.
pub mod reg {
    /// Device identifier (4 bytes, read-only)
    pub const DEV_ID: u16 = 0x00;
    /// Extended Unique Identifier (8 bytes)
    pub const EUI: u16 = 0x03;
    /// System configuration; also the receive-enable command target
    pub const SYS_CFG: u16 = 0x04;
    /// Preamble configuration
    pub const PREAMBLE_CFG: u16 = 0x06;
    /// Receive frame information (length field in the low 11 bits)
    pub const RX_FINFO: u16 = 0x10;
    /// Receive frame buffer
    pub const RX_BUFFER: u16 = 0x11;
    /// Receive frame quality block (CIR power, first path, quality byte)
    pub const RX_FQUAL: u16 = 0x12;
    /// Receive timestamp (40 bits over 5 bytes, little-endian)
    pub const RX_TIME: u16 = 0x15;
    /// Soft reset command register
    pub const SOFT_RESET: u16 = 0x36;
    /// System event status (write all-ones to clear)
    pub const SYS_STATUS: u16 = 0x44;
}

/// Expected device identity
///
/// Only the high-order 24 bits are significant; the low byte carries the
/// silicon revision.
pub const DEVICE_ID: u32 = 0xDECA0302;

/// Mask selecting the significant bits of [`DEVICE_ID`]
pub const DEVICE_ID_MASK: u32 = 0xFFFFFF00;

/// Frame-ready bit of the system status register (receiver FCS good)
pub const STATUS_RXFCG: u32 = 1 << 13;

/// Command byte that triggers a soft reset when written to
/// [`reg::SOFT_RESET`]
pub const SOFT_RESET_CMD: u8 = 0xE0;

/// Command byte that enables the receiver when written to [`reg::SYS_CFG`]
pub const RX_ENABLE_CMD: u8 = 0x01;

/// Builds the SPI header for a register access
///
/// Returns the header buffer and the number of valid bytes in it: 1 for
/// short addresses, 3 for extended ones. Short headers carry the address in
/// their low 6 bits; extended headers split the 15-bit address across the
/// second and third byte.
pub fn spi_header(reg: u16, write: bool) -> ([u8; 3], usize) {
    let opcode = if write { SPI_WRITE } else { SPI_READ };

    if reg < SHORT_ADDR_LIMIT {
        ([opcode | (reg as u8 & 0x3F), 0, 0], 1)
    } else {
        (
            [
                opcode | 0x40,
                (reg & 0x7F) as u8,
                ((reg >> 7) & 0xFF) as u8,
            ],
            3,
        )
    }
}

/// Register-level access to the DW3000
///
/// Owns the SPI device exclusively; nothing else may drive the bus while a
/// transaction is in flight. No retry happens at this layer — any bus fault
/// surfaces as [`Error::Spi`].
pub struct Registers<SPI> {
    spi: SPI,
}

impl<SPI> Registers<SPI> {
    /// Create a new register-level interface
    pub fn new(spi: SPI) -> Self {
        Registers { spi }
    }

    /// Allow access to the SPI device
    pub fn bus(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Release the SPI device
    pub fn free(self) -> SPI {
        self.spi
    }
}

impl<SPI> Registers<SPI>
where
    SPI: SpiDevice<u8>,
{
    /// Read `buf.len()` bytes starting at register `reg`
    pub fn read(&mut self, reg: u16, buf: &mut [u8]) -> Result<(), Error<SPI>> {
        let (header, header_len) = spi_header(reg, false);

        self.spi
            .transaction(&mut [
                Operation::Write(&header[..header_len]),
                Operation::Read(buf),
            ])
            .map_err(Error::Spi)
    }

    /// Write `data` starting at register `reg`
    pub fn write(&mut self, reg: u16, data: &[u8]) -> Result<(), Error<SPI>> {
        let (header, header_len) = spi_header(reg, true);

        self.spi
            .transaction(&mut [
                Operation::Write(&header[..header_len]),
                Operation::Write(data),
            ])
            .map_err(Error::Spi)
    }
}

/// Control of the SPI clock rate
///
/// The DW3000 must be addressed at a conservative clock rate until its PLL
/// has locked; once the device identity has been verified the rate can be
/// raised to full speed. `embedded-hal` has no notion of bus clock control,
/// so platform integrations provide it through this trait (on Linux spidev
/// this maps to the per-transfer `speed_hz`, on MCU HALs to reconfiguring
/// the SPI peripheral).
pub trait ClockControl {
    /// Request a new bus clock rate in Hz
    fn set_clock_hz(&mut self, hz: u32);
}

/// An SPI error that occurred while communicating with the DW3000
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// SPI error occurred during a bus transaction
    Spi(SPI::Error),
}

// We can't derive this implementation, as the compiler will complain that
// the associated error type doesn't implement `Debug`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> defmt::Format for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi(_) => defmt::write!(f, "Spi()"),
        }
    }
}
