//! Daemon configuration.
//!
//! Layered with the `config` crate, later layers winning:
//! - built-in defaults
//! - a TOML file (`/etc/hotspot/config.toml` on Linux, the user config
//!   directory elsewhere)
//! - `HOTSPOT__SECTION__KEY` environment variables

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HotspotError, Result};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "HOTSPOT";

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP server.
    pub server: ServerSettings,
    /// Where state is kept.
    pub storage: StorageSettings,
    /// How the access point is driven.
    pub channel: ChannelSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address.
    pub bind: String,
    /// JSON file logging instead of pretty console output.
    pub production: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            production: false,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding `state.json`.
    pub data_dir: PathBuf,
    /// Directory backups are written to and read from. Defaults to
    /// `backups` inside `data_dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_dir: None,
        }
    }
}

impl StorageSettings {
    /// The effective backup directory.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("backups"))
    }
}

/// Commands used by the command-backed actuation channel.
///
/// Each command is a program followed by its arguments; no shell is
/// involved.
///
/// Forced start/stop (used by the Bluetooth automation) runs
/// `force_start_command`/`force_stop_command` when set. Without them the
/// plain commands are used; `systemctl start`/`stop` already act
/// regardless of who changed the unit state last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Starts the access point.
    pub start_command: Vec<String>,
    /// Stops the access point.
    pub stop_command: Vec<String>,
    /// Starts the access point overriding other owners.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_start_command: Option<Vec<String>>,
    /// Stops the access point overriding other owners.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_stop_command: Option<Vec<String>>,
    /// Exits 0 when the privileged broker is usable.
    pub status_command: Vec<String>,
    /// Run after a new configuration has been written.
    pub apply_command: Vec<String>,
    /// Where the committed configuration is written as JSON.
    pub configuration_path: PathBuf,
    /// Client limit the radio supports.
    pub max_supported_clients: u32,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        let systemctl = |verb: &str| {
            vec!["systemctl".to_string(), verb.to_string(), "hostapd".to_string()]
        };
        Self {
            start_command: systemctl("start"),
            stop_command: systemctl("stop"),
            force_start_command: None,
            force_stop_command: None,
            status_command: vec!["systemctl".into(), "is-system-running".into()],
            apply_command: systemctl("reload-or-restart"),
            configuration_path: default_data_dir().join("access-point.json"),
            max_supported_clients: 10,
        }
    }
}

impl DaemonConfig {
    /// Load from the default location. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer cannot be parsed or the result is invalid.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::build(Some(&path), false, Environment::with_prefix(ENV_PREFIX).separator("__"))
    }

    /// Load from an explicit file, which must exist.
    ///
    /// # Errors
    ///
    /// [`HotspotError::ConfigNotFound`] if `path` does not exist, otherwise
    /// as [`Self::load`].
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HotspotError::ConfigNotFound(path.to_path_buf()));
        }
        Self::build(Some(path), true, Environment::with_prefix(ENV_PREFIX).separator("__"))
    }

    fn build(path: Option<&Path>, required: bool, env: Environment) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            debug!(path = %path.display(), "Reading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(required));
        }
        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot work.
    ///
    /// # Errors
    ///
    /// [`HotspotError::ConfigValidationError`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        let commands = [
            ("channel.start_command", &self.channel.start_command),
            ("channel.stop_command", &self.channel.stop_command),
            ("channel.status_command", &self.channel.status_command),
            ("channel.apply_command", &self.channel.apply_command),
        ];
        let forced = [
            ("channel.force_start_command", &self.channel.force_start_command),
            ("channel.force_stop_command", &self.channel.force_stop_command),
        ];
        let forced = forced
            .into_iter()
            .filter_map(|(name, command)| command.as_ref().map(|c| (name, c)));
        for (name, command) in commands.into_iter().chain(forced) {
            if command.first().map_or(true, String::is_empty) {
                return Err(HotspotError::ConfigValidationError(format!(
                    "{name} must name a program"
                )));
            }
        }
        if self.channel.max_supported_clients == 0 {
            return Err(HotspotError::ConfigValidationError(
                "channel.max_supported_clients must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The parsed listen address.
    ///
    /// # Errors
    ///
    /// [`HotspotError::ConfigValidationError`] if `server.bind` is malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind.parse().map_err(|e| {
            HotspotError::ConfigValidationError(format!(
                "server.bind '{}' is not a socket address: {e}",
                self.server.bind
            ))
        })
    }

    /// Write to `path` as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if no config directory can be determined.
    pub fn config_path() -> Result<PathBuf> {
        // On the device: /etc/hotspot/config.toml
        // For development: ~/.config/hotspot/config.toml
        #[cfg(target_os = "linux")]
        {
            Ok(PathBuf::from("/etc/hotspot/config.toml"))
        }
        #[cfg(not(target_os = "linux"))]
        {
            let dirs = directories::ProjectDirs::from("", "", "hotspot").ok_or_else(|| {
                HotspotError::ConfigParseError("Cannot determine config directory".into())
            })?;
            Ok(dirs.config_dir().join("config.toml"))
        }
    }
}

/// Default state directory.
///
/// On the device: `/var/lib/hotspot/`
/// For development: `~/.local/share/hotspot/`
#[must_use]
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/lib/hotspot")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "hotspot")
            .map_or_else(|| PathBuf::from("hotspot-data"), |d| d.data_dir().to_path_buf())
    }
}
