//! SSID and passphrase validation.
//!
//! Both validators are pure and return a result value rather than an error:
//! an invalid field is a normal state of a draft being edited.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::SecurityType;

/// Longest SSID the 802.11 standard allows, in bytes.
pub const MAX_SSID_BYTES: usize = 32;

/// Shortest passphrase accepted for passphrase-based security.
pub const MIN_PASSPHRASE_CHARS: usize = 8;

/// Longest WPA2 pre-shared key passphrase.
pub const MAX_PSK_PASSPHRASE_CHARS: usize = 63;

/// Outcome of [`validate_ssid`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SsidResult {
    /// The SSID is usable.
    #[default]
    Success,
    /// The SSID is empty.
    Empty,
    /// The SSID is longer than 32 bytes once UTF-8 encoded.
    TooLong,
}

impl SsidResult {
    /// Whether the SSID passed validation.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Outcome of [`validate_passphrase`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PassphraseResult {
    /// The passphrase is usable with the selected security type.
    #[default]
    Success,
    /// Fewer than 8 characters.
    TooShort,
    /// More than 63 characters for a PSK-based mode.
    TooLong,
    /// Contains a character outside printable ASCII.
    InvalidCharacters,
}

impl PassphraseResult {
    /// Whether the passphrase passed validation.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Validate an SSID.
#[must_use]
pub fn validate_ssid(ssid: &str) -> SsidResult {
    if ssid.is_empty() {
        SsidResult::Empty
    } else if ssid.len() > MAX_SSID_BYTES {
        SsidResult::TooLong
    } else {
        SsidResult::Success
    }
}

/// Validate a passphrase for the given security type.
///
/// Open and OWE networks carry no passphrase, so anything (including the
/// empty string) is accepted. WPA3-SAE has no upper length bound; the PSK
/// based modes cap at 63 characters.
#[must_use]
pub fn validate_passphrase(passphrase: &str, security_type: SecurityType) -> PassphraseResult {
    if !security_type.uses_passphrase() {
        return PassphraseResult::Success;
    }

    let len = passphrase.chars().count();
    if len < MIN_PASSPHRASE_CHARS {
        return PassphraseResult::TooShort;
    }

    let capped = matches!(
        security_type,
        SecurityType::Wpa2Psk | SecurityType::Wpa3SaeTransition
    );
    if capped && len > MAX_PSK_PASSPHRASE_CHARS {
        return PassphraseResult::TooLong;
    }

    if !passphrase.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        return PassphraseResult::InvalidCharacters;
    }

    PassphraseResult::Success
}
