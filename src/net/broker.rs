//! Broker session (MQTT).
//!
//! ## State machine
//!
//! ```text
//! DISCONNECTED ──network CONNECTED + delay elapsed──▶ CONNECTING ──▶ CONNECTED
//!       ▲                                                               │
//!       └──────────────network drop / session drop──────────────────────┘
//! ```
//!
//! Connection attempts are skipped entirely while the network is down and
//! the failure counter is held at 0 — retrying into a dead radio is wasted
//! work. While the network is up, attempts retry on a fixed delay; a
//! failure counter past a threshold escalates the log line as an
//! operational signal, never as an error path.
//!
//! On every successful connection the session (re-)subscribes to the
//! command namespace exactly once (tracked by a `subscribed` flag cleared
//! on disconnect) and bumps a session epoch so consumers can resynchronise.
//!
//! Inbound messages are queued from the client callback and drained by the
//! coordinator on the next tick — the receive path never publishes (see
//! the deferred-status pattern in the device modules).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

use crate::config::SystemConfig;
use crate::app::ports::MessageBus;
use crate::error::CommsError;
use crate::net::topics;

/// One message received from the broker, staged for the next tick.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: heapless::String<128>,
    pub payload: heapless::Vec<u8, 256>,
}

type InboundQueue = Arc<Mutex<VecDeque<InboundMessage>>>;

pub struct BrokerSession {
    client_id: heapless::String<48>,
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    broker_url: &'static str,
    topic_prefix: &'static str,
    retry_delay_ms: u64,
    failure_log_threshold: u32,

    /// `None` until the very first attempt, which fires immediately.
    last_attempt_ms: Option<u64>,
    consecutive_failures: u32,
    subscribed: bool,
    /// Bumped on every successful (re)connection.
    epoch: u32,
    /// Connection flag, written from the client event callback.
    connected: Arc<AtomicBool>,
    inbound: InboundQueue,

    #[cfg(target_os = "espidf")]
    client: Option<esp_idf_svc::mqtt::client::EspMqttClient<'static>>,

    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimBroker {
    accept_connect: bool,
    publish_ok: bool,
    connect_attempts: u32,
    subscribe_count: u32,
    published: Vec<(String, Vec<u8>)>,
}

impl BrokerSession {
    pub fn new(
        client_id: &str,
        broker_url: &'static str,
        topic_prefix: &'static str,
        config: &SystemConfig,
    ) -> Self {
        Self {
            client_id: heapless::String::try_from(client_id).unwrap_or_default(),
            broker_url,
            topic_prefix,
            retry_delay_ms: config.broker_retry_delay_ms,
            failure_log_threshold: config.broker_failure_log_threshold,
            last_attempt_ms: None,
            consecutive_failures: 0,
            subscribed: false,
            epoch: 0,
            connected: Arc::new(AtomicBool::new(false)),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker {
                accept_connect: true,
                publish_ok: true,
                ..SimBroker::default()
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Session generation — changes exactly when a (re)connect completes.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Advance the session state machine. `network_up` is the WiFi link
    /// state from the same tick; nothing here blocks.
    pub fn poll(&mut self, now_ms: u64, network_up: bool) {
        if !network_up {
            // No point retrying into a dead radio. Also makes the failure
            // counter read 0 for the whole outage.
            if self.is_connected() || self.subscribed {
                info!("broker: network down, dropping session");
                self.platform_disconnect();
            }
            self.connected.store(false, Ordering::Release);
            self.subscribed = false;
            self.consecutive_failures = 0;
            return;
        }

        if self.is_connected() {
            if !self.subscribed {
                // Exactly once per connection lifetime.
                let filter = topics::command_wildcard(self.topic_prefix);
                match self.platform_subscribe(filter.as_str()) {
                    Ok(()) => {
                        self.subscribed = true;
                        self.consecutive_failures = 0;
                        self.epoch = self.epoch.wrapping_add(1);
                        info!(
                            "broker: session up as '{}' (epoch {}), subscribed '{}'",
                            self.client_id, self.epoch, filter
                        );
                    }
                    Err(e) => {
                        warn!("broker: subscribe failed — {}", e);
                        self.platform_disconnect();
                        self.connected.store(false, Ordering::Release);
                    }
                }
            }
            return;
        }

        // Disconnected with the network up: fixed-delay retry.
        self.subscribed = false;
        if !self.attempt_due(now_ms) {
            return;
        }
        self.last_attempt_ms = Some(now_ms);
        match self.platform_connect() {
            Ok(()) => {
                debug!("broker: connect attempt started");
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= self.failure_log_threshold {
                    error!(
                        "broker: connect failed {} times in a row — {}",
                        self.consecutive_failures, e
                    );
                } else {
                    warn!("broker: connect failed — {}", e);
                }
            }
        }
    }

    /// Pop the next staged inbound message, if any.
    pub fn take_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.lock().ok()?.pop_front()
    }

    fn attempt_due(&self, now_ms: u64) -> bool {
        match self.last_attempt_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.retry_delay_ms,
        }
    }

    fn stage_inbound(queue: &InboundQueue, topic: &str, payload: &[u8]) {
        let Ok(mut q) = queue.lock() else { return };
        let Ok(topic) = heapless::String::try_from(topic) else {
            warn!("broker: inbound topic too long, dropped");
            return;
        };
        let Ok(payload) = heapless::Vec::from_slice(payload) else {
            warn!("broker: inbound payload too large, dropped");
            return;
        };
        q.push_back(InboundMessage { topic, payload });
    }

    // ── Platform: ESP-IDF ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration};

        if self.client.is_some() {
            // A previous client exists but the session is down; tear it
            // down so the fresh attempt starts from clean state.
            self.client = None;
        }

        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            ..Default::default()
        };

        let connected = Arc::clone(&self.connected);
        let inbound = Arc::clone(&self.inbound);
        let client = EspMqttClient::new_cb(self.broker_url, &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    connected.store(true, Ordering::Release);
                }
                EventPayload::Disconnected => {
                    connected.store(false, Ordering::Release);
                }
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    ..
                } => {
                    // Receive path: stage only, never publish from here.
                    Self::stage_inbound(&inbound, topic, data);
                }
                _ => {}
            }
        })
        .map_err(|_| CommsError::BrokerConnectFailed)?;

        self.client = Some(client);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        self.client = None;
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, filter: &str) -> Result<(), CommsError> {
        use esp_idf_svc::mqtt::client::QoS;
        match self.client.as_mut() {
            Some(client) => client
                .subscribe(filter, QoS::AtMostOnce)
                .map(|_| ())
                .map_err(|_| CommsError::SubscribeFailed),
            None => Err(CommsError::SubscribeFailed),
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        use esp_idf_svc::mqtt::client::QoS;
        match self.client.as_mut() {
            Some(client) => client
                .publish(topic, QoS::AtMostOnce, false, payload)
                .is_ok(),
            None => false,
        }
    }

    // ── Platform: simulation ──────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        self.sim.connect_attempts += 1;
        if self.sim.accept_connect {
            self.connected.store(true, Ordering::Release);
            Ok(())
        } else {
            Err(CommsError::BrokerConnectFailed)
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.connected.store(false, Ordering::Release);
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, _filter: &str) -> Result<(), CommsError> {
        self.sim.subscribe_count += 1;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.sim.publish_ok {
            return false;
        }
        self.sim.published.push((topic.into(), payload.to_vec()));
        true
    }

    // ── Sim controls (host tests) ─────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_accept_connect(&mut self, ok: bool) {
        self.sim.accept_connect = ok;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_publish_ok(&mut self, ok: bool) {
        self.sim.publish_ok = ok;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_session(&mut self) {
        self.connected.store(false, Ordering::Release);
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect_attempts(&self) -> u32 {
        self.sim.connect_attempts
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_subscribe_count(&self) -> u32 {
        self.sim.subscribe_count
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_published(&self) -> &[(String, Vec<u8>)] {
        &self.sim.published
    }

    /// Inject a broker-delivered message, as the event callback would.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject(&mut self, topic: &str, payload: &[u8]) {
        Self::stage_inbound(&self.inbound, topic, payload);
    }
}

impl MessageBus for BrokerSession {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.is_connected() {
            debug!("broker: publish '{}' skipped, session down", topic);
            return false;
        }
        let ok = self.platform_publish(topic, payload);
        if !ok {
            warn!("broker: publish '{}' failed", topic);
        }
        ok
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    fn session() -> BrokerSession {
        BrokerSession::new("campernode-test", "mqtt://192.168.8.1:1883", "camper", &SystemConfig::default())
    }

    #[test]
    fn no_attempts_while_network_down() {
        let mut b = session();
        for t in (0..60_000).step_by(1_000) {
            b.poll(t, false);
        }
        assert_eq!(b.sim_connect_attempts(), 0);
        assert_eq!(b.consecutive_failures(), 0);
    }

    #[test]
    fn failure_counter_reads_zero_throughout_outage() {
        let mut b = session();
        b.sim_set_accept_connect(false);
        // Network up: failures accumulate.
        b.poll(0, true);
        b.poll(5_000, true);
        assert_eq!(b.consecutive_failures(), 2);
        // Network drops: counter resets and stays 0.
        for t in (6_000..30_000).step_by(1_000) {
            b.poll(t, false);
            assert_eq!(b.consecutive_failures(), 0);
        }
    }

    #[test]
    fn connects_and_subscribes_once() {
        let mut b = session();
        b.poll(0, true); // connect
        b.poll(50, true); // subscribe
        assert!(b.is_connected());
        assert_eq!(b.sim_subscribe_count(), 1);
        assert_eq!(b.epoch(), 1);
        // Steady state: no further subscriptions.
        for t in (100..10_000).step_by(50) {
            b.poll(t, true);
        }
        assert_eq!(b.sim_subscribe_count(), 1);
        assert_eq!(b.epoch(), 1);
    }

    #[test]
    fn resubscribes_after_session_drop() {
        let mut b = session();
        b.poll(0, true);
        b.poll(50, true);
        assert_eq!(b.sim_subscribe_count(), 1);

        b.sim_drop_session();
        b.poll(5_000, true); // reconnect attempt (delay satisfied)
        b.poll(5_050, true); // resubscribe
        assert_eq!(b.sim_subscribe_count(), 2);
        assert_eq!(b.epoch(), 2);
    }

    #[test]
    fn retry_respects_fixed_delay() {
        let mut b = session();
        b.sim_set_accept_connect(false);
        b.poll(0, true);
        b.poll(1_000, true);
        b.poll(4_999, true);
        assert_eq!(b.sim_connect_attempts(), 1);
        b.poll(5_000, true);
        assert_eq!(b.sim_connect_attempts(), 2);
    }

    #[test]
    fn publish_when_disconnected_returns_false() {
        let mut b = session();
        assert!(!b.publish("camper/sensors/water/level", b"3"));
        assert!(b.sim_published().is_empty());
    }

    #[test]
    fn publish_failure_is_reported_not_retried() {
        let mut b = session();
        b.poll(0, true);
        b.poll(50, true);
        b.sim_set_publish_ok(false);
        assert!(!b.publish("camper/sensors/water/level", b"3"));
        b.sim_set_publish_ok(true);
        assert!(b.publish("camper/sensors/water/level", b"3"));
        assert_eq!(b.sim_published().len(), 1);
    }

    #[test]
    fn inbound_messages_drain_in_order() {
        let mut b = session();
        b.sim_inject("camper/commands/lights/level", br#"{"value":10}"#);
        b.sim_inject("camper/commands/lights/level", br#"{"value":20}"#);
        let first = b.take_inbound().unwrap();
        let second = b.take_inbound().unwrap();
        assert!(b.take_inbound().is_none());
        assert_eq!(first.payload.as_slice(), br#"{"value":10}"#);
        assert_eq!(second.payload.as_slice(), br#"{"value":20}"#);
    }
}
