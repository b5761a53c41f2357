//! Actuation channel backed by external commands.
//!
//! The daemon runs unprivileged; starting, stopping and reconfiguring the
//! access point is delegated to configured programs (typically `systemctl`
//! through a polkit rule or sudoers entry). The committed configuration is
//! kept as JSON at `channel.configuration_path`. Forced starts and stops run
//! `force_start_command`/`force_stop_command` when those are configured.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use hotspot_core::{
    AccessPointConfiguration, ActuationChannel, Capabilities, ChannelSettings, ChannelState,
    HotspotError, Result,
};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Runs the configured commands.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    settings: ChannelSettings,
}

impl CommandChannel {
    /// Create a channel from settings.
    pub const fn new(settings: ChannelSettings) -> Self {
        Self { settings }
    }

    /// Run `argv`, returning whether it exited successfully.
    async fn run(argv: &[String]) -> Result<bool> {
        let Some((program, args)) = argv.split_first() else {
            return Err(HotspotError::ChannelUnavailable("empty command".into()));
        };
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| HotspotError::ChannelUnavailable(format!("{program}: {e}")))?;

        if !output.status.success() {
            debug!(
                program,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Command failed"
            );
        }
        Ok(output.status.success())
    }

    async fn require_connected(&self) -> Result<()> {
        match self.connection_state().await {
            ChannelState::Connected => Ok(()),
            state => Err(HotspotError::ChannelUnavailable(format!(
                "broker is {state:?}"
            ))),
        }
    }

    /// The command for a start or stop, preferring the forced variant.
    fn pick<'a>(plain: &'a [String], forced: Option<&'a [String]>, force: bool) -> &'a [String] {
        match forced {
            Some(argv) if force => argv,
            _ => plain,
        }
    }

    async fn run_required(argv: &[String], what: &str) -> Result<()> {
        if Self::run(argv).await? {
            Ok(())
        } else {
            Err(HotspotError::ChannelUnavailable(format!("{what} command failed")))
        }
    }
}

async fn write_configuration(path: &Path, configuration: &AccessPointConfiguration) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(configuration)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl ActuationChannel for CommandChannel {
    async fn connection_state(&self) -> ChannelState {
        match Self::run(&self.settings.status_command).await {
            Ok(true) => ChannelState::Connected,
            Ok(false) => ChannelState::Disconnected,
            Err(err) => {
                warn!(error = %err, "Status command could not be run");
                ChannelState::Disconnected
            }
        }
    }

    async fn capabilities(&self) -> Result<Capabilities> {
        Ok(Capabilities {
            max_supported_clients: self.settings.max_supported_clients,
        })
    }

    async fn current_configuration(&self) -> Result<AccessPointConfiguration> {
        let path = &self.settings.configuration_path;
        if !tokio::fs::try_exists(path).await? {
            debug!(path = %path.display(), "No committed configuration yet, using defaults");
            return Ok(AccessPointConfiguration::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    #[instrument(skip(self))]
    async fn start_access_point(&self, force: bool) -> Result<()> {
        self.require_connected().await?;
        let argv = Self::pick(
            &self.settings.start_command,
            self.settings.force_start_command.as_deref(),
            force,
        );
        Self::run_required(argv, "start").await?;
        info!("Access point started");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop_access_point(&self, force: bool) -> Result<()> {
        self.require_connected().await?;
        let argv = Self::pick(
            &self.settings.stop_command,
            self.settings.force_stop_command.as_deref(),
            force,
        );
        Self::run_required(argv, "stop").await?;
        info!("Access point stopped");
        Ok(())
    }

    #[instrument(skip_all, fields(ssid = %configuration.ssid))]
    async fn apply_configuration(&self, configuration: &AccessPointConfiguration) -> Result<bool> {
        self.require_connected().await?;
        let previous = self.current_configuration().await?;
        let path = &self.settings.configuration_path;

        write_configuration(path, configuration).await?;
        if Self::run(&self.settings.apply_command).await? {
            info!("Configuration applied");
            return Ok(true);
        }

        warn!("Apply command failed, restoring previous configuration");
        write_configuration(path, &previous).await?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(argv: &[&str]) -> Vec<String> {
        argv.iter().map(ToString::to_string).collect()
    }

    fn settings(dir: &Path) -> ChannelSettings {
        ChannelSettings {
            start_command: command(&["true"]),
            stop_command: command(&["true"]),
            force_start_command: None,
            force_stop_command: None,
            status_command: command(&["true"]),
            apply_command: command(&["true"]),
            configuration_path: dir.join("ap.json"),
            max_supported_clients: 16,
        }
    }

    #[tokio::test]
    async fn test_status_follows_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        assert_eq!(
            CommandChannel::new(s.clone()).connection_state().await,
            ChannelState::Connected
        );

        s.status_command = command(&["false"]);
        assert_eq!(
            CommandChannel::new(s.clone()).connection_state().await,
            ChannelState::Disconnected
        );

        s.status_command = command(&["/nonexistent/broker"]);
        assert_eq!(
            CommandChannel::new(s).connection_state().await,
            ChannelState::Disconnected
        );
    }

    #[tokio::test]
    async fn test_actuation_requires_connected_broker() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.status_command = command(&["false"]);
        let channel = CommandChannel::new(s);

        let err = channel.start_access_point(true).await.unwrap_err();
        assert!(err.is_channel_error());
        let err = channel
            .apply_configuration(&AccessPointConfiguration::default())
            .await
            .unwrap_err();
        assert!(err.is_channel_error());
        assert!(!dir.path().join("ap.json").exists());
    }

    #[tokio::test]
    async fn test_failed_start_is_channel_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.start_command = command(&["false"]);
        let channel = CommandChannel::new(s);
        assert!(channel.start_access_point(false).await.is_err());
        assert!(channel.stop_access_point(false).await.is_ok());
    }

    #[tokio::test]
    async fn test_force_selects_forced_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.force_start_command = Some(command(&["false"]));
        s.force_stop_command = Some(command(&["false"]));
        let channel = CommandChannel::new(s);

        assert!(channel.start_access_point(false).await.is_ok());
        assert!(channel.start_access_point(true).await.is_err());
        assert!(channel.stop_access_point(false).await.is_ok());
        assert!(channel.stop_access_point(true).await.is_err());
    }

    #[tokio::test]
    async fn test_force_without_forced_commands_uses_plain() {
        let dir = tempfile::tempdir().unwrap();
        let channel = CommandChannel::new(settings(dir.path()));
        assert!(channel.start_access_point(true).await.is_ok());
        assert!(channel.stop_access_point(true).await.is_ok());
    }

    #[tokio::test]
    async fn test_apply_persists_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let channel = CommandChannel::new(settings(dir.path()));
        assert_eq!(
            channel.current_configuration().await.unwrap(),
            AccessPointConfiguration::default()
        );

        let cfg = AccessPointConfiguration {
            ssid: "garage".into(),
            passphrase: "correct horse".into(),
            ..AccessPointConfiguration::default()
        };
        assert!(channel.apply_configuration(&cfg).await.unwrap());
        assert_eq!(channel.current_configuration().await.unwrap(), cfg);
        assert_eq!(
            channel.capabilities().await.unwrap().max_supported_clients,
            16
        );
    }

    #[tokio::test]
    async fn test_rejected_apply_restores_previous() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.apply_command = command(&["false"]);
        let channel = CommandChannel::new(s);

        let cfg = AccessPointConfiguration {
            ssid: "rejected".into(),
            ..AccessPointConfiguration::default()
        };
        assert!(!channel.apply_configuration(&cfg).await.unwrap());
        assert_eq!(
            channel.current_configuration().await.unwrap().ssid,
            AccessPointConfiguration::default().ssid
        );
    }
}
