use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::call_state::{payload, CallState, PublishDecision, PublishReason};
use super::config::{ConfigError, MqttSettings};

const CLIENT_ID: &str = "meet2mqtt";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A requested change to the published meeting state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateUpdate {
    pub active: bool,
    pub reason: PublishReason,
}

/// Connection lifecycle notifications from the transport task.
#[derive(Debug)]
enum ConnectionEvent {
    Connected,
    Refused(ConnectReturnCode),
    Lost(String),
}

/// Handle for the meeting-state MQTT publisher.
///
/// Owns the broker connection for its lifetime: `spawn` starts a connection
/// driver (the rumqttc event loop with bounded reconnect backoff) and a state
/// actor (the single writer over [`CallState`]). A handle built from a failed
/// configuration is permanently disabled and swallows every publish.
pub struct PublisherHandle {
    inner: Option<PublisherInner>,
}

struct PublisherInner {
    updates: mpsc::Sender<StateUpdate>,
    shutdown: CancellationToken,
    actor: JoinHandle<()>,
    driver: JoinHandle<()>,
}

impl PublisherHandle {
    /// Reads connection settings from the environment and spawns the
    /// publisher. Configuration problems disable publishing for the process
    /// lifetime instead of failing the host: `MQTT_URL` unset is expected on
    /// machines without a broker, anything else is a real misconfiguration.
    pub fn from_env() -> Self {
        match MqttSettings::from_env() {
            Ok(settings) => Self::spawn(settings),
            Err(err @ ConfigError::UrlUnset) => {
                warn!("{err}; meeting state MQTT disabled");
                Self::disabled()
            }
            Err(err) => {
                error!("{err}; meeting state MQTT disabled");
                Self::disabled()
            }
        }
    }

    /// A handle whose `publish` is a no-op and which never opens a connection.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Spawns the connection driver and state actor for the given settings.
    /// The connection attempt starts immediately in the background.
    pub fn spawn(settings: MqttSettings) -> Self {
        let mut options =
            MqttOptions::new(CLIENT_ID, settings.broker.host.clone(), settings.broker.port);
        options.set_keep_alive(settings.keep_alive);
        if settings.has_credentials() {
            options.set_credentials(settings.user.clone(), settings.password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, 16);
        let (update_tx, update_rx) = mpsc::channel(16);
        let (connection_tx, connection_rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();

        info!(
            "Meeting state MQTT enabled (broker={}:{}, topic={})",
            settings.broker.host, settings.broker.port, settings.topic
        );

        let driver = tokio::spawn(drive_connection(
            eventloop,
            connection_tx,
            settings.reconnect_min_delay,
            settings.reconnect_max_delay,
            shutdown.clone(),
        ));

        let publisher = StatePublisher {
            client,
            topic: settings.topic,
            state: CallState::new(),
            updates: update_rx,
            connection: connection_rx,
        };
        let actor = tokio::spawn(publisher.run());

        Self {
            inner: Some(PublisherInner {
                updates: update_tx,
                shutdown,
                actor,
                driver,
            }),
        }
    }

    /// Requests a publish of the given state. Fire-and-forget: never blocks
    /// the event source, and only the latest value matters if the actor is
    /// momentarily behind.
    pub fn publish(&self, active: bool, reason: PublishReason) {
        let Some(inner) = &self.inner else { return };
        if let Err(err) = inner.updates.try_send(StateUpdate { active, reason }) {
            warn!("Dropping meeting state update: {err}");
        }
    }

    /// Drains pending updates, disconnects from the broker, and stops both
    /// background tasks. Deferred values that never saw a reconnect are lost,
    /// matching the no-persistence model.
    pub async fn shutdown(self) {
        let Some(inner) = self.inner else { return };
        let PublisherInner {
            updates,
            shutdown,
            mut actor,
            driver,
        } = inner;

        drop(updates);
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut actor).await.is_err() {
            warn!("MQTT publisher did not drain in time; aborting");
            actor.abort();
        }
        shutdown.cancel();
        let _ = driver.await;
    }
}

/// The single logical writer over the publisher state. Bridge events and
/// transport notifications both funnel through this task's channels, so
/// `CallState` needs no lock.
struct StatePublisher {
    client: AsyncClient,
    topic: String,
    state: CallState,
    updates: mpsc::Receiver<StateUpdate>,
    connection: mpsc::Receiver<ConnectionEvent>,
}

impl StatePublisher {
    async fn run(mut self) {
        loop {
            tokio::select! {
                update = self.updates.recv() => match update {
                    Some(update) => self.apply(update).await,
                    None => break,
                },
                event = self.connection.recv() => match event {
                    Some(event) => self.handle_connection(event).await,
                    None => break,
                },
            }
        }

        // Updates that raced with shutdown still move the retained state.
        while let Ok(update) = self.updates.try_recv() {
            self.apply(update).await;
        }
        if let Err(err) = self.client.disconnect().await {
            debug!("MQTT disconnect during shutdown failed: {err}");
        }
    }

    async fn apply(&mut self, update: StateUpdate) {
        match self.state.request(update.active) {
            PublishDecision::Unchanged => {
                debug!(
                    active = update.active,
                    "Meeting state unchanged; skipping publish"
                );
            }
            PublishDecision::Deferred => {
                debug!("MQTT not connected; deferring publish");
            }
            PublishDecision::Publish => self.send(update.active, update.reason).await,
        }
    }

    async fn handle_connection(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                info!("MQTT connected");
                if let Some(active) = self.state.connection_up() {
                    self.send(active, PublishReason::Reconnect).await;
                }
            }
            ConnectionEvent::Refused(code) => {
                warn!("MQTT connect failed with code {code:?}");
            }
            ConnectionEvent::Lost(err) => {
                self.state.connection_down();
                warn!("MQTT disconnected unexpectedly; will retry: {err}");
            }
        }
    }

    async fn send(&mut self, active: bool, reason: PublishReason) {
        let payload = payload(active);
        match self
            .client
            .publish(self.topic.as_str(), QoS::AtMostOnce, true, payload)
            .await
        {
            Ok(()) => info!("Meeting state -> {} {} ({})", self.topic, payload, reason),
            Err(err) => error!("Failed to publish meeting state: {err}"),
        }
    }
}

/// Drives the rumqttc event loop: keeps the connection alive, reports
/// lifecycle transitions to the state actor, and backs off between failed
/// attempts from `min_delay` doubling up to `max_delay`, resetting once a
/// connect succeeds.
async fn drive_connection(
    mut eventloop: EventLoop,
    events: mpsc::Sender<ConnectionEvent>,
    min_delay: Duration,
    max_delay: Duration,
    shutdown: CancellationToken,
) {
    let mut retry_delay = min_delay;
    loop {
        let polled = tokio::select! {
            _ = shutdown.cancelled() => break,
            polled = eventloop.poll() => polled,
        };

        match polled {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    retry_delay = min_delay;
                    if events.send(ConnectionEvent::Connected).await.is_err() {
                        break;
                    }
                }
                // Refused codes surface again as ConnectionError below.
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => break,
            Err(err) => {
                let event = match &err {
                    ConnectionError::ConnectionRefused(code) => ConnectionEvent::Refused(*code),
                    _ => ConnectionEvent::Lost(err.to_string()),
                };
                if events.send(event).await.is_err() {
                    break;
                }
                debug!("Retrying MQTT connection in {retry_delay:?}");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(retry_delay) => {}
                }
                retry_delay = (retry_delay * 2).min(max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::config::BrokerAddr;

    fn unreachable_settings() -> MqttSettings {
        MqttSettings {
            broker: BrokerAddr {
                host: "127.0.0.1".to_string(),
                port: 1,
            },
            user: String::new(),
            password: String::new(),
            topic: "meet/call_active".to_string(),
            keep_alive: Duration::from_secs(30),
            reconnect_min_delay: Duration::from_secs(2),
            reconnect_max_delay: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn disabled_handle_swallows_publishes() {
        let handle = PublisherHandle::disabled();
        assert!(!handle.is_enabled());
        handle.publish(true, PublishReason::Browser);
        handle.publish(false, PublishReason::NoBrowsers);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn spawned_handle_defers_while_unreachable_and_shuts_down() {
        let handle = PublisherHandle::spawn(unreachable_settings());
        assert!(handle.is_enabled());
        // The broker never answers; the update is recorded and deferred.
        handle.publish(true, PublishReason::Browser);
        handle.shutdown().await;
    }
}
