use core::fmt;

use embedded_hal::spi::SpiDevice;
use log::debug;
use num_traits::Float;

use crate::{configs::Config, ll, time::Instant};

use super::{Configured, Error, DW3000};

/// Capacity of the chip's receive frame buffer
pub const RX_BUFFER_LEN: usize = 127;

/// Empirical offset between raw CIR power and RSSI in dBm
pub const RSSI_OFFSET_DB: f32 = 115.0;

/// A frame lifted out of the chip's receive buffer
///
/// Transient: the scan loop overwrites it every iteration and it is never
/// persisted. `length` never exceeds [`RX_BUFFER_LEN`]; the chip's length
/// report is clamped on the way in.
#[derive(Clone, Debug)]
pub struct RawFrame {
    /// The frame bytes; only the first `length` are valid
    pub buffer: [u8; RX_BUFFER_LEN],
    /// Number of valid bytes in `buffer`
    pub length: usize,
    /// The chip's 40-bit receive timestamp
    pub rx_time: Instant,
    /// Received signal strength, in dBm
    pub rssi_dbm: f32,
    /// First path power index
    pub fpp_index: u16,
    /// First path power level
    pub fpp_level: f32,
    /// Frame quality indicator
    pub quality: u8,
}

impl RawFrame {
    /// The valid frame bytes
    pub fn bytes(&self) -> &[u8] {
        &self.buffer[..self.length]
    }
}

impl<SPI, RST, WAKE, DELAY> DW3000<SPI, RST, WAKE, DELAY, Configured>
where
    SPI: SpiDevice<u8>,
{
    /// The radio configuration this driver was configured with
    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Enables the receiver
    ///
    /// Non-blocking: the chip starts listening and this call returns
    /// immediately. `timeout_ms` is advisory only — it is not enforced by
    /// this layer, the caller decides when to poll and when to give up.
    pub fn rx_enable(&mut self, timeout_ms: u32) -> Result<(), Error<SPI>> {
        let _ = timeout_ms;

        self.ll.write(ll::reg::SYS_CFG, &[ll::RX_ENABLE_CMD])?;
        self.state.listening = true;

        Ok(())
    }

    /// Whether the receiver is currently enabled
    ///
    /// Set by [`rx_enable`](Self::rx_enable), cleared when
    /// [`read_frame`](Self::read_frame) consumes the receive buffer.
    pub fn is_listening(&self) -> bool {
        self.state.listening
    }

    /// Whether a good frame is waiting in the receive buffer
    ///
    /// Always `false` while the receiver is not enabled; no bus traffic
    /// happens in that case. A transport failure also reads as "not
    /// ready" — the scan loop polls this continuously and a transient bus
    /// glitch must not abort a cycle.
    pub fn frame_ready(&mut self) -> bool {
        if !self.state.listening {
            return false;
        }

        let mut status = [0; 5];
        if self.ll.read(ll::reg::SYS_STATUS, &mut status).is_err() {
            return false;
        }

        let status = u32::from_le_bytes([status[0], status[1], status[2], status[3]]);
        status & ll::STATUS_RXFCG != 0
    }

    /// Reads the waiting frame and its signal metrics
    ///
    /// Consumes the receive buffer: all status bits are cleared at the end
    /// to acknowledge the frame, and the receiver has to be re-enabled for
    /// the next one.
    pub fn read_frame(&mut self) -> Result<RawFrame, Error<SPI>> {
        self.state.listening = false;

        // Frame length is an 11-bit field; the chip can report more than
        // the buffer holds (oversize PHY payloads), so clamp.
        let mut finfo = [0; 4];
        self.ll.read(ll::reg::RX_FINFO, &mut finfo)?;
        let length =
            usize::min(finfo[0] as usize | ((finfo[1] & 0x07) as usize) << 8, RX_BUFFER_LEN);

        let mut buffer = [0; RX_BUFFER_LEN];
        self.ll.read(ll::reg::RX_BUFFER, &mut buffer[..length])?;

        let mut timestamp = [0; 5];
        self.ll.read(ll::reg::RX_TIME, &mut timestamp)?;
        let rx_time = Instant::from_register_bytes(timestamp);

        let mut fqual = [0; 8];
        self.ll.read(ll::reg::RX_FQUAL, &mut fqual)?;

        let cir_power = u16::from_le_bytes([fqual[0], fqual[1]]);
        let rssi_dbm = 10.0 * Float::log10(cir_power as f32) - RSSI_OFFSET_DB;

        let fpp_index = u16::from_le_bytes([fqual[2], fqual[3]]);
        let fp_ampl = u16::from_le_bytes([fqual[4], fqual[5]]);
        let fpp_level = 10.0 * Float::log10(fp_ampl as f32);

        let quality = fqual[6];

        // Acknowledge consumption by clearing every status bit.
        self.ll.write(ll::reg::SYS_STATUS, &[0xFF; 5])?;

        debug!("frame received: length={}, rssi={} dBm", length, rssi_dbm);

        Ok(RawFrame {
            buffer,
            length,
            rx_time,
            rssi_dbm,
            fpp_index,
            fpp_level,
            quality,
        })
    }
}

/// The seam between the chip driver and the scan loop
///
/// Implemented by [`DW3000`] in the [`Configured`] state, and by simulated
/// radios in tests. Everything the scan loop needs from the hardware goes
/// through this trait.
pub trait ScanRadio {
    /// The radio's transport error
    type Error: fmt::Debug;

    /// Enable the receiver; the timeout is advisory
    fn rx_enable(&mut self, timeout_ms: u32) -> Result<(), Self::Error>;

    /// Whether a frame is waiting; transport failures read as `false`
    fn frame_ready(&mut self) -> bool;

    /// Read the waiting frame
    fn read_frame(&mut self) -> Result<RawFrame, Self::Error>;

    /// The applied radio configuration
    fn config(&self) -> Config;
}

impl<SPI, RST, WAKE, DELAY> ScanRadio for DW3000<SPI, RST, WAKE, DELAY, Configured>
where
    SPI: SpiDevice<u8>,
    SPI::Error: fmt::Debug,
{
    type Error = Error<SPI>;

    fn rx_enable(&mut self, timeout_ms: u32) -> Result<(), Self::Error> {
        DW3000::rx_enable(self, timeout_ms)
    }

    fn frame_ready(&mut self) -> bool {
        DW3000::frame_ready(self)
    }

    fn read_frame(&mut self) -> Result<RawFrame, Self::Error> {
        DW3000::read_frame(self)
    }

    fn config(&self) -> Config {
        *DW3000::config(self)
    }
}
