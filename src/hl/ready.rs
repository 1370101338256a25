use embedded_hal::spi::SpiDevice;
use log::info;

use crate::{configs::Config, ll};

use super::{Configured, Error, Ready, DW3000};

impl<SPI, RST, WAKE, DELAY> DW3000<SPI, RST, WAKE, DELAY, Ready>
where
    SPI: SpiDevice<u8>,
{
    /// Applies the radio configuration
    ///
    /// Writes channel and PRF into the system configuration register and
    /// the preamble length code into the preamble register. `config` is
    /// stored in the new state and treated as read-only from here on; it is
    /// what every subsequently emitted detection event reports as channel
    /// and PRF. A transport failure hands the `Ready` driver back without
    /// advancing the state.
    #[allow(clippy::type_complexity)]
    pub fn configure(
        mut self,
        config: Config,
    ) -> Result<DW3000<SPI, RST, WAKE, DELAY, Configured>, (Self, Error<SPI>)> {
        match self.apply(&config) {
            Ok(()) => Ok(DW3000 {
                ll: self.ll,
                reset: self.reset,
                wake: self.wake,
                delay: self.delay,
                state: Configured {
                    config,
                    listening: false,
                },
            }),
            Err(error) => Err((self, error)),
        }
    }

    fn apply(&mut self, config: &Config) -> Result<(), Error<SPI>> {
        info!(
            "configuring: channel={:?}, prf={:?}, preamble={:?}",
            config.channel, config.pulse_repetition_frequency, config.preamble_length
        );

        let chan_cfg = [
            config.channel as u8,
            config.pulse_repetition_frequency as u8,
            0,
            0,
        ];
        self.ll.write(ll::reg::SYS_CFG, &chan_cfg)?;

        let preamble_cfg = [config.preamble_length as u8, 0];
        self.ll.write(ll::reg::PREAMBLE_CFG, &preamble_cfg)?;

        Ok(())
    }

    /// Sets the chip's own EUI-64 device address
    pub fn set_address(&mut self, addr: u64) -> Result<(), Error<SPI>> {
        self.ll.write(ll::reg::EUI, &addr.to_le_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    use crate::configs::{PreambleLength, PulseRepetitionFrequency, UwbChannel};
    use crate::hl::tests::{ready_dw3000, DoneAll as _};

    #[test]
    fn configure_writes_channel_prf_and_preamble() {
        let spi = SpiMock::new(&[
            // SYS_CFG: channel 9, PRF 16 MHz
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x80 | 0x04]),
            SpiTransaction::write_vec(vec![9, 1, 0, 0]),
            SpiTransaction::transaction_end(),
            // PREAMBLE_CFG: 256 symbols
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x80 | 0x06]),
            SpiTransaction::write_vec(vec![0x09, 0]),
            SpiTransaction::transaction_end(),
        ]);

        let dw3000 = ready_dw3000(spi);

        let config = Config {
            channel: UwbChannel::Channel9,
            pulse_repetition_frequency: PulseRepetitionFrequency::Mhz16,
            preamble_length: PreambleLength::Symbols256,
            ..Config::default()
        };

        let configured = dw3000.configure(config).unwrap();
        assert_eq!(*configured.config(), config);

        configured.free().done_all();
    }

    #[test]
    fn set_address_writes_eui_little_endian() {
        let spi = SpiMock::new(&[
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x80 | 0x03]),
            SpiTransaction::write_vec(vec![0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]),
            SpiTransaction::transaction_end(),
        ]);

        let mut dw3000 = ready_dw3000(spi);
        dw3000.set_address(0x0102030405060708).unwrap();

        dw3000.free().done_all();
    }
}
