//! Signal strength classification

use serde::{Deserialize, Serialize};

/// Coarse signal strength, as shown on the broadband LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    /// No usable signal, or none reported
    #[default]
    NoSignal,
    /// Marginal; expect drops
    Weak,
    /// Usable
    Fair,
    /// Strong
    Good,
}

/// BER index meaning "not known or not detectable"
pub const BER_UNKNOWN: u8 = 99;

/// Map an `AT+CSQ` (rssi, ber) pair to a [`SignalStrength`].
///
/// rssi 2..=30 spans -109..-53 dBm in 2 dBm steps. Weak ends around -100 dBm
/// (5), fair around -86 dBm (12). An unknown BER leaves the rssi to decide;
/// a known but out-of-range BER caps the result at weak.
pub fn translate_signal(rssi: u8, ber: u8) -> SignalStrength {
    if ber != BER_UNKNOWN && ber > 7 {
        return SignalStrength::Weak;
    }

    match rssi {
        0 => SignalStrength::NoSignal,
        1..=5 => SignalStrength::Weak,
        6..=12 => SignalStrength::Fair,
        13..=98 => SignalStrength::Good,
        _ => SignalStrength::NoSignal,
    }
}
