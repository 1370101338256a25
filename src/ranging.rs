//! Single-ended distance estimation from signal strength
//!
//! The scanner observes one direction of a transmission, so true two-way
//! time-of-flight ranging is not available. Instead the distance is
//! approximated from the received signal strength with a log-distance path
//! loss model:
//!
//! ```text
//! PL(d) = PL(d0) + 10 * n * log10(d / d0)
//! ```
//!
//! solved for `d` with a 1 m reference. The constants below describe a
//! generic indoor environment and have not been calibrated against a
//! specific deployment.
//!
//! Known limitation: the chip also reports first-path power metrics
//! ([`RawFrame::fpp_index`](crate::hl::RawFrame) and `fpp_level`), which a
//! better model would fold in to discount multipath. They are carried
//! through to the detection event untouched but do not enter this estimate.

use num_traits::Float;

/// Assumed transmit power of the observed device, in dBm
pub const TX_POWER_DBM: f32 = 0.0;

/// Path loss at the 1 m reference distance, in dB
pub const PATH_LOSS_AT_1M_DB: f32 = 40.0;

/// Path loss exponent for an indoor environment
pub const PATH_LOSS_EXPONENT: f32 = 2.5;

/// Estimates the distance to a transmitter from its RSSI
///
/// Pure and deterministic; the result is in centimeters. Monotonically
/// decreasing in `rssi_dbm`: a stronger signal means a closer device.
pub fn distance_cm(rssi_dbm: f32) -> f32 {
    let path_loss = TX_POWER_DBM - rssi_dbm;
    let distance_m = Float::powf(10.0, (path_loss - PATH_LOSS_AT_1M_DB) / (10.0 * PATH_LOSS_EXPONENT));

    distance_m * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_path_loss_maps_to_one_meter() {
        // At -40 dBm the path loss equals the 1 m reference loss.
        let distance = distance_cm(-40.0);
        assert!((distance - 100.0).abs() < 1e-3);
    }

    #[test]
    fn monotonically_decreasing_in_rssi() {
        let mut previous = f32::INFINITY;
        let mut rssi = -100.0;
        while rssi <= -20.0 {
            let distance = distance_cm(rssi);
            assert!(
                distance < previous,
                "distance must shrink as RSSI grows: {} dBm -> {} cm",
                rssi,
                distance
            );
            previous = distance;
            rssi += 0.5;
        }
    }

    #[test]
    fn deterministic() {
        assert_eq!(distance_cm(-67.25), distance_cm(-67.25));
    }

    #[test]
    fn plausible_indoor_values() {
        // 10 m should land at a path loss of 40 + 25 = 65 dB.
        let distance = distance_cm(-65.0);
        assert!((distance - 1000.0).abs() < 1.0);
    }
}
