//! Unified error types for the hotspot core library.
//!
//! [`HotspotError`] covers every failure mode that can leave the core. Field
//! validation is deliberately *not* part of this type: SSID and passphrase
//! checks produce result values (see [`crate::validators`]) that callers
//! inspect, because an invalid draft is an ordinary editing state.
//!
//! # Example
//!
//! ```rust
//! use hotspot_core::error::{HotspotError, Result};
//!
//! fn require_channel(connected: bool) -> Result<()> {
//!     if !connected {
//!         return Err(HotspotError::ChannelUnavailable("not connected".into()));
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// The unified error type for all hotspot operations.
#[derive(Debug, Error)]
pub enum HotspotError {
    // =========================================================================
    // ACTUATION CHANNEL ERRORS
    // =========================================================================
    /// The privileged actuation channel is not connected or refused the call.
    #[error("Privileged channel unavailable: {0}. Ensure the actuation broker is running.")]
    ChannelUnavailable(String),

    /// The channel accepted the call but rejected the configuration.
    #[error("The access point rejected the configuration")]
    ConfigurationRejected,

    // =========================================================================
    // PERIPHERAL ERRORS
    // =========================================================================
    /// A MAC address did not match `XX:XX:XX:XX:XX:XX`.
    #[error("Invalid MAC address: '{0}'. Expected format XX:XX:XX:XX:XX:XX.")]
    InvalidMacAddress(String),

    /// A connectivity listener was unregistered without being registered.
    #[error("Connectivity listener {0} is not registered")]
    NotRegistered(u64),

    /// The Bluetooth stack could not be reached.
    #[error("Bluetooth unavailable: {0}")]
    BluetoothUnavailable(String),

    // =========================================================================
    // PRESET & BACKUP ERRORS
    // =========================================================================
    /// No preset exists with the given id.
    #[error("Preset not found: {0}")]
    PresetNotFound(Uuid),

    /// An export or import is already running.
    #[error("A backup transfer is already in progress")]
    TransferInProgress,

    /// A backup path does not resolve to a file inside the backup directory.
    #[error("Backup path not allowed: {}. Use a file name inside the backup directory.", .0.display())]
    BackupPathRejected(PathBuf),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// Flag, preset or backup persistence failed.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for hotspot operations.
pub type Result<T> = std::result::Result<T, HotspotError>;

impl HotspotError {
    /// Returns `true` if the privileged channel caused this error.
    #[inline]
    #[must_use]
    pub const fn is_channel_error(&self) -> bool {
        matches!(
            self,
            Self::ChannelUnavailable(_) | Self::ConfigurationRejected
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_persistence_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns `true` if this error represents an expected operational state
    /// rather than a failure.
    ///
    /// Unregistering a listener that never registered is a normal shutdown
    /// race, and a busy backup slot only means "try again later".
    #[inline]
    #[must_use]
    pub const fn is_expected_state(&self) -> bool {
        matches!(self, Self::NotRegistered(_) | Self::TransferInProgress)
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidMacAddress(_) | Self::BackupPathRejected(_) => 400,

            Self::PresetNotFound(_) | Self::ConfigNotFound(_) => 404,

            Self::TransferInProgress | Self::NotRegistered(_) => 409,

            Self::ConfigurationRejected
            | Self::ConfigParseError(_)
            | Self::ConfigValidationError(_) => 422,

            Self::PersistenceError(_) | Self::IoError(_) => 500,

            Self::ChannelUnavailable(_) | Self::BluetoothUnavailable(_) => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ChannelUnavailable(_) => "CHANNEL_UNAVAILABLE",
            Self::ConfigurationRejected => "CONFIGURATION_REJECTED",
            Self::InvalidMacAddress(_) => "INVALID_MAC_ADDRESS",
            Self::NotRegistered(_) => "NOT_REGISTERED",
            Self::BluetoothUnavailable(_) => "BLUETOOTH_UNAVAILABLE",
            Self::PresetNotFound(_) => "PRESET_NOT_FOUND",
            Self::TransferInProgress => "TRANSFER_IN_PROGRESS",
            Self::BackupPathRejected(_) => "BACKUP_PATH_REJECTED",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

impl From<serde_json::Error> for HotspotError {
    fn from(err: serde_json::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl From<config::ConfigError> for HotspotError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for HotspotError {
    fn from(err: toml::ser::Error) -> Self {
        Self::ConfigParseError(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
