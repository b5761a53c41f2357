//! Hosting of the automation service inside the daemon.
//!
//! [`DaemonHost`] plays the role of the service host: it records readiness,
//! honours `stop_self`, and lets the HTTP layer request a (re)start. Each
//! service lifetime gets a fresh [`AutomationService`], so the listener is
//! registered at most once per lifetime and closed when the lifetime ends.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use hotspot_core::{
    AutomationController, AutomationService, ConnectivitySource, ServiceHost, ServiceStart,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use utoipa::ToSchema;

/// Lifecycle state of the automation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AutomationState {
    /// Not running; waiting for a start request.
    #[default]
    Stopped,
    /// Checking whether automation is enabled.
    Starting,
    /// Receiving connectivity events.
    Monitoring,
}

/// Host side of the automation service.
#[derive(Debug, Default)]
pub struct DaemonHost {
    state: watch::Sender<AutomationState>,
    run_token: Mutex<CancellationToken>,
    stopping: AtomicBool,
    start_requested: Notify,
    ready_signals: AtomicU64,
}

impl DaemonHost {
    /// Create a host in the stopped state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AutomationState {
        *self.state.borrow()
    }

    /// Watch lifecycle changes.
    pub fn subscribe(&self) -> watch::Receiver<AutomationState> {
        self.state.subscribe()
    }

    /// How many times the service has signalled readiness.
    pub fn ready_signals(&self) -> u64 {
        self.ready_signals.load(Ordering::SeqCst)
    }

    /// Start the service, or restart it if it is already monitoring.
    pub fn request_start(&self) {
        if self.state() == AutomationState::Monitoring {
            debug!("Restart requested");
            self.current_token().cancel();
        } else {
            self.start_requested.notify_one();
        }
    }

    /// Start the service unless it is already monitoring.
    pub fn ensure_running(&self) {
        if self.state() != AutomationState::Monitoring {
            self.start_requested.notify_one();
        }
    }

    fn current_token(&self) -> CancellationToken {
        self.run_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn begin_start(&self, token: CancellationToken) {
        *self.run_token.lock().unwrap_or_else(PoisonError::into_inner) = token;
        self.stopping.store(false, Ordering::SeqCst);
        self.state.send_replace(AutomationState::Starting);
    }

    fn set_state(&self, state: AutomationState) {
        self.state.send_replace(state);
    }
}

impl ServiceHost for DaemonHost {
    fn signal_ready(&self) {
        self.ready_signals.fetch_add(1, Ordering::SeqCst);
        debug!("Automation service ready");
    }

    fn stop_self(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.current_token().cancel();
    }
}

/// Run automation lifetimes until `shutdown` fires.
///
/// The first lifetime starts immediately, later ones on
/// [`DaemonHost::request_start`].
pub async fn supervise(
    controller: AutomationController,
    source: Arc<dyn ConnectivitySource>,
    host: Arc<DaemonHost>,
    shutdown: CancellationToken,
) {
    loop {
        let mut service = AutomationService::new(controller.clone(), source.clone(), host.clone());

        loop {
            let run_token = shutdown.child_token();
            host.begin_start(run_token.clone());
            match service.on_start().await {
                ServiceStart::Disabled => break,
                ServiceStart::Monitoring => {
                    host.set_state(AutomationState::Monitoring);
                    service.run(run_token).await;
                }
            }
            if shutdown.is_cancelled() || host.stopping.load(Ordering::SeqCst) {
                break;
            }
        }

        service.on_stop();
        host.set_state(AutomationState::Stopped);

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = host.start_requested.notified() => info!("Starting automation service"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hotspot_core::testing::{
        ChannelCall, MemoryFlagStore, MemoryPeripheralStore, MockChannel, RecordingNotices,
    };
    use hotspot_core::{EventHub, FlagsRepository, PeripheralEvent, SelectedPeripheral};

    use super::*;

    struct Harness {
        flags: FlagsRepository,
        hub: Arc<EventHub>,
        host: Arc<DaemonHost>,
        channel: Arc<MockChannel>,
        shutdown: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    async fn start(enabled: bool) -> Harness {
        let flags = FlagsRepository::new(Arc::new(MemoryFlagStore::default()));
        flags.set_auto_enable_on_bt_status(enabled).await.unwrap();
        let channel = Arc::new(MockChannel::default());
        let controller = AutomationController::new(
            flags.clone(),
            Arc::new(MemoryPeripheralStore::with_selected(SelectedPeripheral {
                mac_address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
                display_name: "Car".into(),
            })),
            channel.clone(),
            Arc::new(RecordingNotices::default()),
        );
        let hub = Arc::new(EventHub::new());
        let host = Arc::new(DaemonHost::new());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(supervise(
            controller,
            hub.clone(),
            host.clone(),
            shutdown.clone(),
        ));
        Harness {
            flags,
            hub,
            host,
            channel,
            shutdown,
            task,
        }
    }

    async fn wait_for(host: &DaemonHost, wanted: AutomationState) {
        let mut rx = host.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == wanted))
            .await
            .expect("state reached in time")
            .unwrap();
    }

    #[tokio::test]
    async fn test_disabled_service_stops_and_restarts_on_request() {
        let h = start(false).await;
        wait_for(&h.host, AutomationState::Stopped).await;
        assert_eq!(h.hub.listener_count(), 0);

        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        h.host.request_start();
        wait_for(&h.host, AutomationState::Monitoring).await;
        assert_eq!(h.hub.listener_count(), 1);

        h.shutdown.cancel();
        h.task.await.unwrap();
        assert_eq!(h.hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_events_reach_the_channel() {
        let h = start(true).await;
        wait_for(&h.host, AutomationState::Monitoring).await;

        h.hub
            .publish(&PeripheralEvent::Connected("AA:BB:CC:DD:EE:FF".parse().unwrap()));
        tokio::time::timeout(Duration::from_secs(2), async {
            while h.channel.calls().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(h.channel.calls(), vec![ChannelCall::Start { force: true }]);

        h.shutdown.cancel();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_keeps_single_listener() {
        let h = start(true).await;
        wait_for(&h.host, AutomationState::Monitoring).await;
        let ready = h.host.ready_signals();

        h.host.request_start();
        tokio::time::timeout(Duration::from_secs(2), async {
            while h.host.ready_signals() == ready {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        wait_for(&h.host, AutomationState::Monitoring).await;
        assert_eq!(h.hub.listener_count(), 1);

        h.shutdown.cancel();
        h.task.await.unwrap();
    }
}
