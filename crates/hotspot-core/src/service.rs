//! Long-running supervision of the automation controller.
//!
//! The host may start the service any number of times. Each start signals
//! readiness first, then checks whether automation is on at all; if it is
//! off the service asks the host to stop it instead of idling. The
//! connectivity listener is registered at most once per service.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::automation::AutomationController;
use crate::peripheral::{ConnectivitySource, Subscription};

/// How long [`AutomationService::run`] waits for in-flight events after
/// shutdown before abandoning them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The environment the service runs in.
pub trait ServiceHost: Send + Sync {
    /// Tell the host the service is up. Called before anything is awaited.
    fn signal_ready(&self);

    /// Ask the host to stop this service.
    fn stop_self(&self);
}

/// Result of [`AutomationService::on_start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStart {
    /// Automation is off; the host has been asked to stop the service.
    Disabled,
    /// Listening for connectivity events.
    Monitoring,
}

/// Hosts an [`AutomationController`] and feeds it connectivity events.
pub struct AutomationService {
    controller: AutomationController,
    source: Arc<dyn ConnectivitySource>,
    host: Arc<dyn ServiceHost>,
    subscription: Option<Subscription>,
    registered: bool,
    tasks: TaskTracker,
    grace: Duration,
}

impl std::fmt::Debug for AutomationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationService")
            .field("subscription", &self.subscription)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

impl AutomationService {
    /// Create a stopped service.
    pub fn new(
        controller: AutomationController,
        source: Arc<dyn ConnectivitySource>,
        host: Arc<dyn ServiceHost>,
    ) -> Self {
        Self {
            controller,
            source,
            host,
            subscription: None,
            registered: false,
            tasks: TaskTracker::new(),
            grace: SHUTDOWN_GRACE,
        }
    }

    /// Override how long shutdown waits for in-flight events.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Whether the listener has been registered during this service's life.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Whether events are currently being received.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.subscription.as_ref().is_some_and(|s| !s.is_closed())
    }

    /// Start (or restart) the service.
    pub async fn on_start(&mut self) -> ServiceStart {
        self.host.signal_ready();

        let enabled = match self.controller.flags().is_auto_enable_on_bt_enabled().await {
            Ok(enabled) => enabled,
            Err(err) => {
                warn!(error = %err, "Could not read automation flag, treating as disabled");
                false
            }
        };
        if !enabled {
            info!("Bluetooth automation disabled, stopping service");
            self.host.stop_self();
            return ServiceStart::Disabled;
        }

        if self.registered {
            debug!("Connectivity listener already registered");
        } else {
            self.subscription = Some(Subscription::open(self.source.clone()));
            self.registered = true;
            info!("Bluetooth automation monitoring");
        }
        ServiceStart::Monitoring
    }

    /// Receive events until `shutdown` fires or the source goes away.
    ///
    /// Each event is handled in its own task, so a stalled channel blocks
    /// only that event. In-flight events get the shutdown grace period to
    /// finish; whatever is still running after that is dropped.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        let Some(subscription) = self.subscription.as_mut() else {
            debug!("Not monitoring, nothing to run");
            return;
        };
        let in_flight = shutdown.child_token();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                event = subscription.recv() => {
                    let Some(event) = event else { break };
                    let controller = self.controller.clone();
                    let abandon = in_flight.clone();
                    self.tasks.spawn(async move {
                        tokio::select! {
                            () = abandon.cancelled() => {
                                warn!(%event, "Event abandoned at shutdown");
                            }
                            result = controller.handle_event(&event) => match result {
                                Ok(outcome) => debug!(%event, %outcome, "Event handled"),
                                Err(err) => error!(%event, error = %err, "Automation failed"),
                            },
                        }
                    });
                }
            }
        }

        self.tasks.close();
        if tokio::time::timeout(self.grace, self.tasks.wait()).await.is_err() {
            warn!(
                pending = self.tasks.len(),
                grace_ms = self.grace.as_millis(),
                "In-flight events did not finish, abandoning them"
            );
            in_flight.cancel();
            self.tasks.wait().await;
        }
        self.tasks.reopen();
    }

    /// Stop listening. Safe to call whether or not a listener exists.
    pub fn on_stop(&mut self) {
        if let Some(subscription) = self.subscription.as_mut() {
            subscription.close();
        }
        info!("Bluetooth automation stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::automation::AutomationController;
    use crate::channel::{ActuationChannel, ChannelState};
    use crate::types::{AccessPointConfiguration, Capabilities};
    use crate::flags::FlagsRepository;
    use crate::peripheral::{EventHub, PeripheralEvent, SelectedPeripheral};
    use crate::testing::{
        ChannelCall, MemoryFlagStore, MemoryPeripheralStore, MockChannel, RecordingNotices,
    };

    #[derive(Default)]
    struct CountingHost {
        ready: AtomicUsize,
        stopped: AtomicUsize,
    }

    impl ServiceHost for CountingHost {
        fn signal_ready(&self) {
            self.ready.fetch_add(1, Ordering::SeqCst);
        }

        fn stop_self(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        service: AutomationService,
        flags: FlagsRepository,
        hub: Arc<EventHub>,
        host: Arc<CountingHost>,
        channel: Arc<MockChannel>,
    }

    fn harness() -> Harness {
        let flags = FlagsRepository::new(Arc::new(MemoryFlagStore::default()));
        let peripherals = Arc::new(MemoryPeripheralStore::with_selected(SelectedPeripheral {
            mac_address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
            display_name: "Car".into(),
        }));
        let channel = Arc::new(MockChannel::new(ChannelState::Connected));
        let controller = AutomationController::new(
            flags.clone(),
            peripherals,
            channel.clone(),
            Arc::new(RecordingNotices::default()),
        );
        let hub = Arc::new(EventHub::new());
        let host = Arc::new(CountingHost::default());
        let service = AutomationService::new(controller, hub.clone(), host.clone());
        Harness {
            service,
            flags,
            hub,
            host,
            channel,
        }
    }

    #[tokio::test]
    async fn test_disabled_at_start_stops_self() {
        let mut h = harness();
        assert_eq!(h.service.on_start().await, ServiceStart::Disabled);
        assert_eq!(h.host.ready.load(Ordering::SeqCst), 1);
        assert_eq!(h.host.stopped.load(Ordering::SeqCst), 1);
        assert!(!h.service.is_registered());
        assert_eq!(h.hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_restart_registers_once() {
        let mut h = harness();
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();

        assert_eq!(h.service.on_start().await, ServiceStart::Monitoring);
        assert_eq!(h.service.on_start().await, ServiceStart::Monitoring);

        assert_eq!(h.host.ready.load(Ordering::SeqCst), 2);
        assert_eq!(h.host.stopped.load(Ordering::SeqCst), 0);
        assert_eq!(h.hub.listener_count(), 1);
        assert!(h.service.is_monitoring());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_harmless() {
        let mut h = harness();
        h.service.on_stop();
        h.service.on_stop();
        assert!(!h.service.is_monitoring());
    }

    #[tokio::test]
    async fn test_stop_twice_unregisters_once() {
        let mut h = harness();
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        h.service.on_start().await;

        h.service.on_stop();
        h.service.on_stop();
        assert_eq!(h.hub.listener_count(), 0);
        assert!(!h.service.is_monitoring());
    }

    #[tokio::test]
    async fn test_run_dispatches_events_until_shutdown() {
        let mut h = harness();
        h.flags.set_auto_enable_on_bt_status(true).await.unwrap();
        h.service.on_start().await;

        let shutdown = CancellationToken::new();
        let hub = h.hub.clone();
        let trigger = shutdown.clone();
        let feeder = tokio::spawn(async move {
            hub.publish(&PeripheralEvent::Connected("AA:BB:CC:DD:EE:FF".parse().unwrap()));
            hub.publish(&PeripheralEvent::Disconnected("AA:BB:CC:DD:EE:FF".parse().unwrap()));
            // Let the service receive both before stopping it.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        h.service.run(shutdown).await;
        feeder.await.unwrap();

        let mut calls = h.channel.calls();
        calls.sort_by_key(|c| matches!(c, ChannelCall::Stop { .. }));
        assert_eq!(
            calls,
            vec![
                ChannelCall::Start { force: true },
                ChannelCall::Stop { force: true }
            ]
        );
    }

    /// A channel whose broker never answers.
    struct StalledChannel;

    #[async_trait::async_trait]
    impl ActuationChannel for StalledChannel {
        async fn connection_state(&self) -> ChannelState {
            std::future::pending().await
        }

        async fn capabilities(&self) -> crate::Result<Capabilities> {
            std::future::pending().await
        }

        async fn current_configuration(&self) -> crate::Result<AccessPointConfiguration> {
            std::future::pending().await
        }

        async fn start_access_point(&self, _force: bool) -> crate::Result<()> {
            std::future::pending().await
        }

        async fn stop_access_point(&self, _force: bool) -> crate::Result<()> {
            std::future::pending().await
        }

        async fn apply_configuration(
            &self,
            _configuration: &AccessPointConfiguration,
        ) -> crate::Result<bool> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_shutdown_abandons_stalled_event() {
        let flags = FlagsRepository::new(Arc::new(MemoryFlagStore::default()));
        flags.set_auto_enable_on_bt_status(true).await.unwrap();
        let peripherals = Arc::new(MemoryPeripheralStore::with_selected(SelectedPeripheral {
            mac_address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
            display_name: "Car".into(),
        }));
        let controller = AutomationController::new(
            flags,
            peripherals,
            Arc::new(StalledChannel),
            Arc::new(RecordingNotices::default()),
        );
        let hub = Arc::new(EventHub::new());
        let mut service =
            AutomationService::new(controller, hub.clone(), Arc::new(CountingHost::default()))
                .with_shutdown_grace(Duration::from_millis(100));
        assert_eq!(service.on_start().await, ServiceStart::Monitoring);

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        let feeder = tokio::spawn(async move {
            hub.publish(&PeripheralEvent::Connected("AA:BB:CC:DD:EE:FF".parse().unwrap()));
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        tokio::time::timeout(Duration::from_secs(2), service.run(shutdown))
            .await
            .expect("run must return after the grace period");
        feeder.await.unwrap();
        assert!(service.is_monitoring());
    }

    #[tokio::test]
    async fn test_run_without_monitoring_returns() {
        let mut h = harness();
        h.service.run(CancellationToken::new()).await;
        assert!(h.channel.calls().is_empty());
    }
}
