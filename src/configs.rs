//! Radio configuration for the scanner
//!
//! [`Config`] captures the radio parameters the scanner operates with. It is
//! created once, applied exactly once through
//! [`DW3000::configure`](crate::hl::DW3000::configure), and read-only
//! afterwards: every detection event mirrors the channel and PRF it was
//! scanned with from here, not from the received frame.

/// Chip configuration, applied once at scanner bring-up
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// The UWB channel to listen on
    pub channel: UwbChannel,
    /// The pulse repetition frequency selector
    pub pulse_repetition_frequency: PulseRepetitionFrequency,
    /// The expected preamble length
    pub preamble_length: PreambleLength,
    /// Preamble acquisition chunk size
    pub pac_size: u8,
    /// The preamble code used by the transmitter
    pub tx_preamble_code: u8,
    /// The preamble code expected by the receiver
    pub rx_preamble_code: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            channel: Default::default(),
            pulse_repetition_frequency: Default::default(),
            preamble_length: Default::default(),
            pac_size: PreambleLength::default().recommended_pac_size(),
            tx_preamble_code: 9,
            rx_preamble_code: 9,
        }
    }
}

/// All the available UWB channels
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UwbChannel {
    /// Channel 5, centered at 6489.6 MHz
    Channel5 = 5,
    /// Channel 9, centered at 7987.2 MHz
    Channel9 = 9,
}

impl Default for UwbChannel {
    fn default() -> Self {
        UwbChannel::Channel5
    }
}

/// The PRF value
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PulseRepetitionFrequency {
    /// 16 megahertz
    Mhz16 = 1,
    /// 64 megahertz
    Mhz64 = 2,
}

impl Default for PulseRepetitionFrequency {
    fn default() -> Self {
        PulseRepetitionFrequency::Mhz64
    }
}

/// The length of the preamble
///
/// Longer preambles improve reception quality and thus range, at the cost
/// of longer air time. The discriminants are the chip's preamble length
/// codes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PreambleLength {
    /// 64 symbols of preamble
    Symbols64 = 0x01,
    /// 128 symbols of preamble
    Symbols128 = 0x05,
    /// 256 symbols of preamble
    Symbols256 = 0x09,
}

impl Default for PreambleLength {
    fn default() -> Self {
        PreambleLength::Symbols128
    }
}

impl PreambleLength {
    /// Gets the recommended preamble acquisition chunk size
    pub fn recommended_pac_size(&self) -> u8 {
        match self {
            PreambleLength::Symbols64 => 8,
            PreambleLength::Symbols128 => 8,
            PreambleLength::Symbols256 => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_the_scanning_operating_point() {
        let config = Config::default();

        assert_eq!(config.channel, UwbChannel::Channel5);
        assert_eq!(
            config.pulse_repetition_frequency,
            PulseRepetitionFrequency::Mhz64
        );
        assert_eq!(config.preamble_length, PreambleLength::Symbols128);
        assert_eq!(config.pac_size, 8);
        assert_eq!(config.rx_preamble_code, 9);
    }

    #[test]
    fn discriminants_match_the_chip_codes() {
        assert_eq!(UwbChannel::Channel5 as u8, 5);
        assert_eq!(UwbChannel::Channel9 as u8, 9);
        assert_eq!(PulseRepetitionFrequency::Mhz16 as u8, 1);
        assert_eq!(PulseRepetitionFrequency::Mhz64 as u8, 2);
        assert_eq!(PreambleLength::Symbols128 as u8, 0x05);
    }
}
