//! Bluetooth-driven access point automation.
//!
//! [`AutomationController::handle_event`] runs one connectivity event
//! through three guards (feature flag, peripheral identity, channel health)
//! and, if all pass, starts or stops the access point. Every decision can
//! also be surfaced as a short diagnostic notice when the debug flag is on.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::channel::{ActuationChannel, ChannelState};
use crate::error::Result;
use crate::flags::FlagsRepository;
use crate::peripheral::{PeripheralEvent, PeripheralStore};

/// Receives diagnostic notices.
pub trait NoticeSink: Send + Sync {
    /// Show `message` to whoever is watching.
    fn notice(&self, message: &str);
}

/// Notice sink that writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotices;

impl NoticeSink for TracingNotices {
    fn notice(&self, message: &str) {
        info!(target: "hotspot::notice", "{message}");
    }
}

/// Why an event did not lead to actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Automation is switched off, or the flag could not be read.
    FeatureDisabled,
    /// No peripheral has been selected.
    NoPeripheralSelected,
    /// The event is about some other device.
    WrongDevice,
    /// The privileged channel is not connected.
    ChannelNotConnected,
}

/// What the controller did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum AutomationOutcome {
    /// A guard stopped processing.
    Ignored(IgnoreReason),
    /// The access point was asked to start.
    Started,
    /// The access point was asked to stop.
    Stopped,
}

impl fmt::Display for AutomationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignored(reason) => write!(f, "ignored ({reason:?})"),
            Self::Started => f.write_str("started"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Event-driven start/stop of the access point.
///
/// Keeps no state of its own between events: whether the access point is
/// already up is the channel's business, and start/stop are idempotent
/// there.
#[derive(Clone)]
pub struct AutomationController {
    flags: FlagsRepository,
    peripherals: Arc<dyn PeripheralStore>,
    channel: Arc<dyn ActuationChannel>,
    notices: Arc<dyn NoticeSink>,
}

impl fmt::Debug for AutomationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomationController").finish_non_exhaustive()
    }
}

impl AutomationController {
    /// Create a controller.
    pub fn new(
        flags: FlagsRepository,
        peripherals: Arc<dyn PeripheralStore>,
        channel: Arc<dyn ActuationChannel>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            flags,
            peripherals,
            channel,
            notices,
        }
    }

    /// The flags the controller reads.
    #[must_use]
    pub const fn flags(&self) -> &FlagsRepository {
        &self.flags
    }

    /// Forward `message` if debug notices are on. A failed flag read means
    /// no notice.
    async fn notify(&self, message: impl AsRef<str>) {
        match self.flags.is_auto_enable_on_bt_debug_toasts_enabled().await {
            Ok(true) => self.notices.notice(message.as_ref()),
            Ok(false) => {}
            Err(err) => debug!(error = %err, "Could not read debug notice flag"),
        }
    }

    /// Process one connectivity event.
    ///
    /// # Errors
    ///
    /// Fails if the peripheral store cannot be read or the channel refuses
    /// the start/stop request. Guard rejections are not errors.
    #[instrument(skip_all, fields(event = %event))]
    pub async fn handle_event(&self, event: &PeripheralEvent) -> Result<AutomationOutcome> {
        self.notify(format!("BT event: {event}")).await;

        let enabled = match self.flags.is_auto_enable_on_bt_enabled().await {
            Ok(enabled) => enabled,
            Err(err) => {
                warn!(error = %err, "Could not read automation flag, treating as disabled");
                false
            }
        };
        if !enabled {
            debug!("Automation disabled, ignoring event");
            self.notify("Auto BT: feature disabled").await;
            return Ok(AutomationOutcome::Ignored(IgnoreReason::FeatureDisabled));
        }

        let Some(selected) = self.peripherals.selected().await? else {
            debug!("No peripheral selected, ignoring event");
            self.notify("Auto BT: no device selected").await;
            return Ok(AutomationOutcome::Ignored(IgnoreReason::NoPeripheralSelected));
        };

        if &selected.mac_address != event.device() {
            debug!(selected = %selected.mac_address, "Event is for another device");
            self.notify(format!("Auto BT: wrong device ({})", event.device()))
                .await;
            return Ok(AutomationOutcome::Ignored(IgnoreReason::WrongDevice));
        }

        let state = self.channel.connection_state().await;
        if state != ChannelState::Connected {
            warn!(?state, "Privileged channel not connected, cannot actuate");
            self.notify("Auto BT: privileged channel not connected!")
                .await;
            return Ok(AutomationOutcome::Ignored(IgnoreReason::ChannelNotConnected));
        }

        match event {
            PeripheralEvent::Connected(_) => {
                info!(device = %selected.display_name, "Peripheral connected, starting access point");
                self.notify(format!(
                    "Auto BT: enabling hotspot for {}",
                    selected.display_name
                ))
                .await;
                self.channel.start_access_point(true).await?;
                Ok(AutomationOutcome::Started)
            }
            PeripheralEvent::Disconnected(_) => {
                info!(device = %selected.display_name, "Peripheral disconnected, stopping access point");
                self.notify("Auto BT: disabling hotspot").await;
                self.channel.stop_access_point(true).await?;
                Ok(AutomationOutcome::Stopped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::{PeripheralAction, SelectedPeripheral};
    use crate::testing::{
        ChannelCall, MemoryFlagStore, MemoryPeripheralStore, MockChannel, RecordingNotices,
    };
    use crate::types::MacAddress;

    const SELECTED: &str = "AA:BB:CC:DD:EE:FF";
    const OTHER: &str = "11:22:33:44:55:66";

    struct Harness {
        controller: AutomationController,
        flags: FlagsRepository,
        flag_store: Arc<MemoryFlagStore>,
        channel: Arc<MockChannel>,
        notices: Arc<RecordingNotices>,
    }

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    fn harness(selected: Option<&str>, state: ChannelState) -> Harness {
        let flag_store = Arc::new(MemoryFlagStore::default());
        let flags = FlagsRepository::new(flag_store.clone());
        let peripherals = Arc::new(match selected {
            Some(m) => MemoryPeripheralStore::with_selected(SelectedPeripheral {
                mac_address: mac(m),
                display_name: "Car".into(),
            }),
            None => MemoryPeripheralStore::default(),
        });
        let channel = Arc::new(MockChannel::new(state));
        let notices = Arc::new(RecordingNotices::default());
        let controller = AutomationController::new(
            flags.clone(),
            peripherals,
            channel.clone(),
            notices.clone(),
        );
        Harness {
            controller,
            flags,
            flag_store,
            channel,
            notices,
        }
    }

    fn all_events() -> Vec<PeripheralEvent> {
        let mut events = Vec::new();
        for device in [SELECTED, OTHER, "aa:bb:cc:dd:ee:ff"] {
            for action in [PeripheralAction::Connected, PeripheralAction::Disconnected] {
                events.push(PeripheralEvent::new(action, mac(device)));
            }
        }
        events
    }

    #[tokio::test]
    async fn test_disabled_flag_never_actuates() {
        for state in [
            ChannelState::Connected,
            ChannelState::Connecting,
            ChannelState::Disconnected,
        ] {
            let h = harness(Some(SELECTED), state);
            for event in all_events() {
                let outcome = h.controller.handle_event(&event).await.unwrap();
                assert_eq!(
                    outcome,
                    AutomationOutcome::Ignored(IgnoreReason::FeatureDisabled)
                );
            }
            assert!(h.channel.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_no_selection_never_actuates() {
        let h = harness(None, ChannelState::Connected);
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        for event in all_events() {
            let outcome = h.controller.handle_event(&event).await.unwrap();
            assert_eq!(
                outcome,
                AutomationOutcome::Ignored(IgnoreReason::NoPeripheralSelected)
            );
        }
        assert!(h.channel.calls().is_empty());
    }

    #[tokio::test]
    async fn test_other_device_is_ignored() {
        let h = harness(Some(SELECTED), ChannelState::Connected);
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        let outcome = h
            .controller
            .handle_event(&PeripheralEvent::Connected(mac(OTHER)))
            .await
            .unwrap();
        assert_eq!(outcome, AutomationOutcome::Ignored(IgnoreReason::WrongDevice));
        assert!(h.channel.calls().is_empty());
    }

    #[tokio::test]
    async fn test_channel_not_connected_is_ignored() {
        for state in [ChannelState::Connecting, ChannelState::Disconnected] {
            let h = harness(Some(SELECTED), state);
            h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
            let outcome = h
                .controller
                .handle_event(&PeripheralEvent::Connected(mac(SELECTED)))
                .await
                .unwrap();
            assert_eq!(
                outcome,
                AutomationOutcome::Ignored(IgnoreReason::ChannelNotConnected)
            );
            assert!(h.channel.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_connected_starts_with_force() {
        let h = harness(Some(SELECTED), ChannelState::Connected);
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        let outcome = h
            .controller
            .handle_event(&PeripheralEvent::Connected(mac(SELECTED)))
            .await
            .unwrap();
        assert_eq!(outcome, AutomationOutcome::Started);
        assert_eq!(h.channel.calls(), vec![ChannelCall::Start { force: true }]);
    }

    #[tokio::test]
    async fn test_disconnected_stops_with_force() {
        let h = harness(Some(SELECTED), ChannelState::Connected);
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        let outcome = h
            .controller
            .handle_event(&PeripheralEvent::Disconnected(mac(SELECTED)))
            .await
            .unwrap();
        assert_eq!(outcome, AutomationOutcome::Stopped);
        assert_eq!(h.channel.calls(), vec![ChannelCall::Stop { force: true }]);
    }

    #[tokio::test]
    async fn test_mac_comparison_ignores_case() {
        let h = harness(Some(SELECTED), ChannelState::Connected);
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        let outcome = h
            .controller
            .handle_event(&PeripheralEvent::Connected(mac("aa:bb:cc:dd:ee:ff")))
            .await
            .unwrap();
        assert_eq!(outcome, AutomationOutcome::Started);
    }

    #[tokio::test]
    async fn test_repeated_connected_events_do_not_error() {
        let h = harness(Some(SELECTED), ChannelState::Connected);
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        let event = PeripheralEvent::Connected(mac(SELECTED));
        for _ in 0..3 {
            assert_eq!(
                h.controller.handle_event(&event).await.unwrap(),
                AutomationOutcome::Started
            );
        }
        assert_eq!(h.channel.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unreadable_flag_treated_as_disabled() {
        let h = harness(Some(SELECTED), ChannelState::Connected);
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        h.flags
            .set_auto_enable_on_bt_debug_toasts_status(true)
            .await
            .unwrap();
        h.flag_store.set_failing(true);

        let outcome = h
            .controller
            .handle_event(&PeripheralEvent::Connected(mac(SELECTED)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AutomationOutcome::Ignored(IgnoreReason::FeatureDisabled)
        );
        // Debug flag unreadable too, so no notices.
        assert!(h.notices.messages().is_empty());
        assert!(h.channel.calls().is_empty());
    }

    #[tokio::test]
    async fn test_notices_only_when_debug_flag_set() {
        let h = harness(Some(SELECTED), ChannelState::Connected);
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        let event = PeripheralEvent::Connected(mac(SELECTED));

        h.controller.handle_event(&event).await.unwrap();
        assert!(h.notices.messages().is_empty());

        h.flags
            .set_auto_enable_on_bt_debug_toasts_status(true)
            .await
            .unwrap();
        h.controller.handle_event(&event).await.unwrap();
        assert_eq!(
            h.notices.messages(),
            vec![
                "BT event: connected AA:BB:CC:DD:EE:FF".to_string(),
                "Auto BT: enabling hotspot for Car".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_notices_do_not_change_outcome() {
        let quiet = harness(Some(SELECTED), ChannelState::Disconnected);
        let loud = harness(Some(SELECTED), ChannelState::Disconnected);
        for h in [&quiet, &loud] {
            h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        }
        loud.flags
            .set_auto_enable_on_bt_debug_toasts_status(true)
            .await
            .unwrap();

        for event in all_events() {
            assert_eq!(
                quiet.controller.handle_event(&event).await.unwrap(),
                loud.controller.handle_event(&event).await.unwrap()
            );
        }
        assert!(!loud.notices.messages().is_empty());
    }

    #[tokio::test]
    async fn test_actuation_failure_is_returned() {
        let h = harness(Some(SELECTED), ChannelState::Connected);
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        // Reported state says connected, but the call itself fails.
        let flaky = Arc::new(FlakyChannel);
        let controller = AutomationController::new(
            h.flags.clone(),
            Arc::new(MemoryPeripheralStore::with_selected(SelectedPeripheral {
                mac_address: mac(SELECTED),
                display_name: "Car".into(),
            })),
            flaky,
            h.notices.clone(),
        );
        let err = controller
            .handle_event(&PeripheralEvent::Disconnected(mac(SELECTED)))
            .await
            .unwrap_err();
        assert!(err.is_channel_error());
    }

    struct FlakyChannel;

    #[async_trait::async_trait]
    impl ActuationChannel for FlakyChannel {
        async fn connection_state(&self) -> ChannelState {
            ChannelState::Connected
        }
        async fn capabilities(&self) -> Result<crate::types::Capabilities> {
            Ok(crate::types::Capabilities::default())
        }
        async fn current_configuration(&self) -> Result<crate::types::AccessPointConfiguration> {
            Ok(crate::types::AccessPointConfiguration::default())
        }
        async fn start_access_point(&self, _force: bool) -> Result<()> {
            Err(crate::HotspotError::ChannelUnavailable("broker died".into()))
        }
        async fn stop_access_point(&self, _force: bool) -> Result<()> {
            Err(crate::HotspotError::ChannelUnavailable("broker died".into()))
        }
        async fn apply_configuration(
            &self,
            _configuration: &crate::types::AccessPointConfiguration,
        ) -> Result<bool> {
            Ok(false)
        }
    }
}
