use serde::{Deserialize, Serialize};

use super::SignalStrength;

/// Radio access generation the modem is registered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkType {
    /// Not registered
    #[default]
    #[serde(rename = "none")]
    NoNetwork,
    /// GPRS / EDGE
    #[serde(rename = "2g")]
    TwoG,
    /// WCDMA, HSPA and anything newer
    #[serde(rename = "3g+")]
    ThreeGOrBetter,
}

impl NetworkType {
    /// Map the `<stat>` field of `+CNSMOD: <n>,<stat>`
    pub fn from_cnsmod(stat: i32) -> Self {
        match stat {
            1..=3 => NetworkType::TwoG,
            s if s > 3 => NetworkType::ThreeGOrBetter,
            _ => NetworkType::NoNetwork,
        }
    }
}

/// Modem status published once per session tick
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModemStatusMessage {
    /// A dial-up configuration for the modem exists
    pub config_available: bool,
    /// The modem answers `AT`
    pub modem_available: bool,
    /// `AT+CPIN?` reports the SIM ready
    pub sim_ready: bool,
    /// ICCID of the inserted SIM; empty when unknown
    pub sim_id: String,
    /// Classified `AT+CSQ` reading
    pub signal: SignalStrength,
    /// Registered network generation
    pub network: NetworkType,
}

impl ModemStatusMessage {
    /// Record reported when the modem could not be reached
    pub fn unavailable() -> Self {
        Self {
            config_available: true,
            ..Self::default()
        }
    }

    /// Record reported when there is no modem configuration at all
    pub fn unconfigured() -> Self {
        Self::default()
    }
}
