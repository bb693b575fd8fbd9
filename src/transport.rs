//! Publish/subscribe transport used to reach the actuator and dashboard.
//!
//! The frame loop only needs `publish` plus a way to learn that the broker
//! connection came up. [`MqttTransport`] drives the `rumqttc` event loop on a
//! background thread and hands publishes to it through the client's bounded
//! request queue, so the frame loop never waits on the network.

use crate::codec::Channel;
use crate::config::BrokerConfig;
use crate::{Error, Result};
use log::{debug, info, warn};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pause before polling again after a connection error
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Requests buffered between the frame loop and the network thread
const REQUEST_CAPACITY: usize = 32;

/// Connection lifecycle notifications delivered to the frame loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Broker accepted the connection
    Connected,
    /// Connection dropped; the transport keeps retrying
    Disconnected(String),
}

/// Topic names for the node's two channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub movement: String,
    pub heartbeat: String,
}

impl Topics {
    /// Topics under `vision/{team_id}/...`
    #[must_use]
    pub fn for_team(team_id: &str) -> Self {
        Self {
            movement: format!("vision/{team_id}/movement"),
            heartbeat: format!("vision/{team_id}/heartbeat"),
        }
    }

    #[must_use]
    pub fn topic(&self, channel: Channel) -> &str {
        match channel {
            Channel::Movement => &self.movement,
            Channel::Heartbeat => &self.heartbeat,
        }
    }
}

/// Outgoing message sink
pub trait Transport {
    /// Hand a payload to the transport without waiting for delivery
    ///
    /// # Errors
    ///
    /// Returns an error if the transport refused the payload.
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Connection events observed since the last call
    fn drain_events(&mut self) -> Vec<TransportEvent>;

    /// Stop background activity
    ///
    /// # Errors
    ///
    /// Returns an error if the background loop could not be shut down cleanly.
    fn stop(&mut self) -> Result<()>;
}

/// MQTT transport backed by `rumqttc`
pub struct MqttTransport {
    client: Client,
    events: Receiver<TransportEvent>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MqttTransport {
    /// Connect to the broker and start the background network loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker settings are unusable or the network
    /// thread cannot be spawned.
    pub fn connect(config: &BrokerConfig) -> Result<Self> {
        if config.address.trim().is_empty() {
            return Err(Error::Transport("Broker address is empty".to_string()));
        }
        if config.port == 0 {
            return Err(Error::Transport("Broker port must be non-zero".to_string()));
        }

        let (client, connection) = Client::new(mqtt_options(config), REQUEST_CAPACITY);
        let (sender, events) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));

        info!("Connecting to MQTT broker at {}:{}", config.address, config.port);
        let worker = thread::Builder::new()
            .name("mqtt-event-loop".to_string())
            .spawn({
                let running = Arc::clone(&running);
                move || run_event_loop(connection, &sender, &running)
            })?;

        Ok(Self {
            client,
            events,
            running,
            worker: Some(worker),
        })
    }
}

/// Client options for `config`
#[must_use]
pub fn mqtt_options(config: &BrokerConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id(), config.address.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    options.set_max_packet_size(config.max_packet_size, config.max_packet_size);
    options
}

fn run_event_loop(mut connection: Connection, sender: &Sender<TransportEvent>, running: &AtomicBool) {
    for notification in connection.iter() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Connected to MQTT broker ({:?})", ack.code);
                // Receiver gone means the node is shutting down
                let _ = sender.send(TransportEvent::Connected);
            }
            Ok(event) => debug!("MQTT event: {event:?}"),
            Err(e) => {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                warn!("MQTT connection error: {e}");
                let _ = sender.send(TransportEvent::Disconnected(e.to_string()));
                thread::sleep(RECONNECT_BACKOFF);
            }
        }
    }
    debug!("MQTT event loop finished");
}

impl Transport for MqttTransport {
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client.try_publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<TransportEvent> {
        self.events.try_iter().collect()
    }

    fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT disconnect request not queued: {e}");
        }
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| Error::Transport("MQTT event loop panicked".to_string()))?;
        }
        info!("MQTT transport stopped");
        Ok(())
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        // Let a detached loop exit on its next notification
        self.running.store(false, Ordering::SeqCst);
    }
}
