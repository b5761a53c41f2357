//! Shared types and OpenAPI schemas.
//!
//! The access point configuration record and its field enums live here
//! because every other module (engine, presets, channel, storage) speaks in
//! terms of them.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::HotspotError;

static MAC_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$").expect("MAC address pattern is valid")
});

/// Check that a string is a colon-separated MAC address.
#[must_use]
pub fn is_valid_mac_address(address: &str) -> bool {
    MAC_ADDRESS_RE.is_match(address)
}

/// A hardware address, normalized to upper case.
///
/// Bluetooth stacks report addresses in either case, so two addresses are
/// equal whenever their normalized forms are.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "AA:BB:CC:DD:EE:FF")]
pub struct MacAddress(String);

impl MacAddress {
    /// Borrow the normalized textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MacAddress {
    type Err = HotspotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if is_valid_mac_address(trimmed) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(HotspotError::InvalidMacAddress(s.to_string()))
        }
    }
}

impl TryFrom<String> for MacAddress {
    type Error = HotspotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(value: MacAddress) -> Self {
        value.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Security mode of the access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityType {
    /// No authentication.
    Open,
    /// WPA2 personal.
    Wpa2Psk,
    /// WPA3 personal (SAE).
    Wpa3Sae,
    /// Mixed WPA2/WPA3 personal.
    Wpa3SaeTransition,
    /// Enhanced open with an open fallback network.
    Wpa3OweTransition,
    /// Enhanced open (OWE).
    Wpa3Owe,
}

impl SecurityType {
    /// All security types, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::Wpa2Psk,
        Self::Wpa3Sae,
        Self::Wpa3SaeTransition,
        Self::Wpa3OweTransition,
        Self::Wpa3Owe,
    ];

    /// Whether this mode authenticates clients with a passphrase.
    #[must_use]
    pub const fn uses_passphrase(self) -> bool {
        matches!(self, Self::Wpa2Psk | Self::Wpa3Sae | Self::Wpa3SaeTransition)
    }
}

/// Radio band the access point broadcasts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Band {
    /// 2.4 GHz.
    #[serde(rename = "BAND_2GHZ")]
    Band2Ghz,
    /// 5 GHz.
    #[serde(rename = "BAND_5GHZ")]
    Band5Ghz,
    /// 6 GHz, WPA3-SAE only.
    #[serde(rename = "BAND_6GHZ")]
    Band6Ghz,
    /// Let the driver choose.
    #[serde(rename = "ANY")]
    Any,
}

impl Band {
    /// All bands, in declaration order.
    pub const ALL: [Self; 4] = [Self::Band2Ghz, Self::Band5Ghz, Self::Band6Ghz, Self::Any];
}

/// BSSID randomization policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MacRandomization {
    /// Use the factory MAC.
    None,
    /// Random MAC that survives restarts.
    #[default]
    Persistent,
    /// New random MAC on every start.
    NonPersistent,
}

/// Runtime configuration of the access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "ssid": "pi-hotspot",
    "passphrase": "correct horse",
    "security_type": "WPA2_PSK",
    "band": "BAND_5GHZ",
    "is_hidden": false,
    "mac_randomization": "PERSISTENT",
    "max_client_limit": 8,
    "blocked_devices": [],
    "allowed_clients": [],
    "auto_shutdown_enabled": true,
    "auto_shutdown_timeout_ms": 600_000
}))]
pub struct AccessPointConfiguration {
    /// Network name.
    pub ssid: String,

    /// Pre-shared key; ignored for open and OWE security.
    pub passphrase: String,

    /// Security mode.
    pub security_type: SecurityType,

    /// Radio band.
    pub band: Band,

    /// Whether the SSID is broadcast.
    pub is_hidden: bool,

    /// BSSID randomization policy.
    pub mac_randomization: MacRandomization,

    /// Maximum number of associated clients.
    pub max_client_limit: u32,

    /// Clients that may never associate.
    pub blocked_devices: BTreeSet<MacAddress>,

    /// Clients that are always allowed.
    pub allowed_clients: BTreeSet<MacAddress>,

    /// Whether the access point stops itself when idle.
    pub auto_shutdown_enabled: bool,

    /// Idle time before auto shutdown, in milliseconds.
    pub auto_shutdown_timeout_ms: u64,
}

impl Default for AccessPointConfiguration {
    fn default() -> Self {
        Self {
            ssid: "hotspot".to_string(),
            passphrase: String::new(),
            security_type: SecurityType::Wpa2Psk,
            band: Band::Band2Ghz,
            is_hidden: false,
            mac_randomization: MacRandomization::default(),
            max_client_limit: Capabilities::default().max_supported_clients,
            blocked_devices: BTreeSet::new(),
            allowed_clients: BTreeSet::new(),
            auto_shutdown_enabled: true,
            auto_shutdown_timeout_ms: 600_000,
        }
    }
}

/// What the radio driver reports it can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Capabilities {
    /// Upper bound on `max_client_limit`.
    #[schema(example = 10)]
    pub max_supported_clients: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            max_supported_clients: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_address_normalizes_case() {
        let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(mac.as_str(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(mac, "AA:BB:CC:DD:EE:FF".parse::<MacAddress>().unwrap());
    }

    #[test]
    fn test_mac_address_rejects_garbage() {
        assert!("AA:BB:CC:DD:EE".parse::<MacAddress>().is_err());
        assert!("AA-BB-CC-DD-EE-FF".parse::<MacAddress>().is_err());
        assert!("GG:BB:CC:DD:EE:FF".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_mac_address_serde_validates() {
        let ok: MacAddress = serde_json::from_str("\"01:23:45:67:89:ab\"").unwrap();
        assert_eq!(ok.to_string(), "01:23:45:67:89:AB");
        assert!(serde_json::from_str::<MacAddress>("\"nope\"").is_err());
    }

    #[test]
    fn test_band_wire_names() {
        assert_eq!(
            serde_json::to_string(&Band::Band6Ghz).unwrap(),
            "\"BAND_6GHZ\""
        );
        assert_eq!(
            serde_json::to_string(&SecurityType::Wpa3SaeTransition).unwrap(),
            "\"WPA3_SAE_TRANSITION\""
        );
    }

    #[test]
    fn test_uses_passphrase() {
        assert!(SecurityType::Wpa2Psk.uses_passphrase());
        assert!(SecurityType::Wpa3Sae.uses_passphrase());
        assert!(!SecurityType::Open.uses_passphrase());
        assert!(!SecurityType::Wpa3Owe.uses_passphrase());
    }
}
