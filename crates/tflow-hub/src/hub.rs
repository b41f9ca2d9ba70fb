//! Topic registry and fan-out.

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use tflow_core::Topic;
use tflow_telemetry::Metrics;

use crate::error::{HubError, HubResult};
use crate::message::HubMessage;

/// Identifier of one connected subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    /// Topic the message was published on.
    pub topic: Topic,
    /// True for the latest-known message replayed on subscribe.
    pub snapshot: bool,
    pub message: HubMessage,
}

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

struct ClientSlot {
    tx: mpsc::Sender<Delivery>,
    topics: HashSet<Topic>,
}

#[derive(Default)]
struct Registry {
    clients: HashMap<ClientId, ClientSlot>,
    subscribers: HashMap<Topic, HashSet<ClientId>>,
    latest: HashMap<Topic, HubMessage>,
}

impl Registry {
    fn detach(&mut self, client_id: ClientId) -> bool {
        let Some(slot) = self.clients.remove(&client_id) else {
            return false;
        };
        for topic in slot.topics {
            if let Some(members) = self.subscribers.get_mut(&topic) {
                members.remove(&client_id);
                if members.is_empty() {
                    self.subscribers.remove(&topic);
                }
            }
        }
        true
    }
}

/// Publish/subscribe hub with snapshot-on-subscribe.
///
/// The registry sits behind one mutex that is held for the whole of a
/// publish. Sends are `try_send` so the critical section never waits on a
/// client, and holding it keeps per-topic delivery order identical for
/// every subscriber.
pub struct BroadcastHub {
    registry: Mutex<Registry>,
    client_buffer: usize,
}

impl BroadcastHub {
    pub fn new(client_buffer: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            client_buffer: client_buffer.max(1),
        }
    }

    /// Register a client and return its delivery stream.
    ///
    /// Re-registering an id replaces the previous stream and drops its
    /// subscriptions.
    pub fn register_client(&self, client_id: ClientId) -> mpsc::Receiver<Delivery> {
        let (tx, rx) = mpsc::channel(self.client_buffer);
        let count = {
            let mut registry = self.registry.lock();
            registry.detach(client_id);
            registry.clients.insert(
                client_id,
                ClientSlot {
                    tx,
                    topics: HashSet::new(),
                },
            );
            registry.clients.len()
        };
        Metrics::hub_clients(count);
        debug!(client_id = %client_id, clients = count, "Client registered");
        rx
    }

    /// Join a topic. The latest message on that topic, if any, is
    /// delivered immediately as a snapshot.
    pub fn subscribe(&self, client_id: ClientId, topic: Topic) -> HubResult<()> {
        let mut registry = self.registry.lock();
        let snapshot = registry.latest.get(&topic).cloned();

        let slot = registry
            .clients
            .get_mut(&client_id)
            .ok_or(HubError::UnknownClient(client_id))?;
        let newly_added = slot.topics.insert(topic);
        let tx = slot.tx.clone();

        registry
            .subscribers
            .entry(topic)
            .or_default()
            .insert(client_id);

        debug!(client_id = %client_id, topic = %topic, newly_added, "Subscribed");

        if let Some(message) = snapshot {
            let delivery = Delivery {
                topic,
                snapshot: true,
                message,
            };
            match tx.try_send(delivery) {
                Ok(()) => Metrics::hub_delivered(1),
                Err(_) => {
                    Metrics::hub_dropped(1);
                    warn!(client_id = %client_id, topic = %topic, "Snapshot dropped, client buffer full");
                }
            }
        }
        Ok(())
    }

    /// Leave a topic. Returns whether the client was subscribed.
    pub fn unsubscribe(&self, client_id: ClientId, topic: Topic) -> HubResult<bool> {
        let mut registry = self.registry.lock();
        let slot = registry
            .clients
            .get_mut(&client_id)
            .ok_or(HubError::UnknownClient(client_id))?;
        let removed = slot.topics.remove(&topic);

        if let Some(members) = registry.subscribers.get_mut(&topic) {
            members.remove(&client_id);
            if members.is_empty() {
                registry.subscribers.remove(&topic);
            }
        }
        debug!(client_id = %client_id, topic = %topic, removed, "Unsubscribed");
        Ok(removed)
    }

    /// Forget a client and all its subscriptions.
    pub fn remove_client(&self, client_id: ClientId) -> bool {
        let (removed, count) = {
            let mut registry = self.registry.lock();
            let removed = registry.detach(client_id);
            (removed, registry.clients.len())
        };
        if removed {
            Metrics::hub_clients(count);
            debug!(client_id = %client_id, clients = count, "Client removed");
        }
        removed
    }

    /// Fan a message out to `topic` and global subscribers.
    ///
    /// No deduplication across publishes: the same message published twice
    /// is delivered twice. Within one publish a client gets one copy even
    /// when subscribed to both the topic and global.
    pub fn publish(&self, topic: Topic, message: HubMessage) -> PublishReport {
        let mut report = PublishReport::default();
        let mut closed = Vec::new();

        let mut registry = self.registry.lock();
        registry.latest.insert(topic, message.clone());

        let mut recipients: Vec<ClientId> = Vec::new();
        let mut seen = HashSet::new();
        let global = if topic.is_global() {
            None
        } else {
            registry.subscribers.get(&Topic::Global)
        };
        for members in registry.subscribers.get(&topic).into_iter().chain(global) {
            for client_id in members {
                if seen.insert(*client_id) {
                    recipients.push(*client_id);
                }
            }
        }

        for client_id in recipients {
            let Some(slot) = registry.clients.get(&client_id) else {
                continue;
            };
            let delivery = Delivery {
                topic,
                snapshot: false,
                message: message.clone(),
            };
            match slot.tx.try_send(delivery) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    trace!(client_id = %client_id, topic = %topic, "Client buffer full, delivery dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    report.dropped += 1;
                    closed.push(client_id);
                }
            }
        }

        for client_id in &closed {
            registry.detach(*client_id);
        }
        let client_count = registry.clients.len();
        drop(registry);

        Metrics::hub_delivered(report.delivered as u64);
        Metrics::hub_dropped(report.dropped as u64);
        if !closed.is_empty() {
            Metrics::hub_clients(client_count);
            debug!(closed = closed.len(), "Pruned disconnected clients");
        }
        if report.dropped > 0 {
            warn!(
                topic = %topic,
                kind = message.type_name(),
                delivered = report.delivered,
                dropped = report.dropped,
                "Some deliveries dropped"
            );
        }
        report
    }

    /// Publish on the message's natural topic.
    pub fn publish_message(&self, message: HubMessage) -> PublishReport {
        self.publish(message.topic(), message)
    }

    /// Latest message published on a topic.
    pub fn latest(&self, topic: Topic) -> Option<HubMessage> {
        self.registry.lock().latest.get(&topic).cloned()
    }

    /// Latest message for every topic, ordered by topic.
    pub fn snapshot(&self) -> Vec<(Topic, HubMessage)> {
        let mut rows: Vec<_> = self
            .registry
            .lock()
            .latest
            .iter()
            .map(|(topic, message)| (*topic, message.clone()))
            .collect();
        rows.sort_by_key(|(topic, _)| *topic);
        rows
    }

    pub fn client_count(&self) -> usize {
        self.registry.lock().clients.len()
    }

    /// Topics a client is subscribed to.
    pub fn subscriptions(&self, client_id: ClientId) -> Option<Vec<Topic>> {
        self.registry.lock().clients.get(&client_id).map(|slot| {
            let mut topics: Vec<_> = slot.topics.iter().copied().collect();
            topics.sort();
            topics
        })
    }
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("client_buffer", &self.client_buffer)
            .field("clients", &self.client_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tflow_core::{CongestionLevel, CycleKind, EntityId, Provenance, Reading};

    fn reading(entity: u64, vehicle_count: u32) -> HubMessage {
        HubMessage::ReadingUpdate {
            reading: Reading {
                entity_id: EntityId::new(entity),
                vehicle_count,
                avg_speed: 30.0,
                congestion: CongestionLevel::from_vehicle_count(vehicle_count),
                confidence: 0.8,
                provenance: Provenance::Synthetic,
                weather: None,
                recorded_at: Utc::now(),
            },
        }
    }

    fn count_of(delivery: &Delivery) -> u32 {
        match &delivery.message {
            HubMessage::ReadingUpdate { reading } => reading.vehicle_count,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn entity7() -> Topic {
        Topic::Entity(EntityId::new(7))
    }

    #[test]
    fn test_same_message_twice_is_delivered_twice() {
        let hub = BroadcastHub::new(16);
        let client = ClientId::new();
        let mut rx = hub.register_client(client);
        hub.subscribe(client, entity7()).unwrap();

        let message = reading(7, 12);
        hub.publish(entity7(), message.clone());
        hub.publish(entity7(), message.clone());

        assert_eq!(rx.try_recv().unwrap().message, message);
        assert_eq!(rx.try_recv().unwrap().message, message);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_snapshot_on_subscribe_then_in_order() {
        let hub = BroadcastHub::new(16);
        for count in [10, 20, 30] {
            hub.publish(entity7(), reading(7, count));
        }

        let client = ClientId::new();
        let mut rx = hub.register_client(client);
        hub.subscribe(client, entity7()).unwrap();

        let first = rx.try_recv().unwrap();
        assert!(first.snapshot);
        assert_eq!(count_of(&first), 30);
        assert!(rx.try_recv().is_err());

        for count in [40, 50, 60] {
            hub.publish(entity7(), reading(7, count));
        }
        let received: Vec<u32> = (0..3).map(|_| count_of(&rx.try_recv().unwrap())).collect();
        assert_eq!(received, vec![40, 50, 60]);
    }

    #[test]
    fn test_global_subscribers_see_every_topic() {
        let hub = BroadcastHub::new(16);
        let global = ClientId::new();
        let mut global_rx = hub.register_client(global);
        hub.subscribe(global, Topic::Global).unwrap();

        let other = ClientId::new();
        let mut other_rx = hub.register_client(other);
        hub.subscribe(other, Topic::Entity(EntityId::new(8))).unwrap();

        let report = hub.publish(entity7(), reading(7, 15));
        assert_eq!(report.delivered, 1);
        assert_eq!(global_rx.try_recv().unwrap().topic, entity7());
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn test_one_copy_when_subscribed_to_topic_and_global() {
        let hub = BroadcastHub::new(16);
        let client = ClientId::new();
        let mut rx = hub.register_client(client);
        hub.subscribe(client, entity7()).unwrap();
        hub.subscribe(client, Topic::Global).unwrap();

        let report = hub.publish(entity7(), reading(7, 5));
        assert_eq!(report.delivered, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hub = BroadcastHub::new(16);
        let client = ClientId::new();
        let mut rx = hub.register_client(client);
        hub.subscribe(client, entity7()).unwrap();

        assert!(hub.unsubscribe(client, entity7()).unwrap());
        assert!(!hub.unsubscribe(client, entity7()).unwrap());
        hub.publish(entity7(), reading(7, 5));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unknown_client_rejected() {
        let hub = BroadcastHub::new(16);
        assert!(matches!(
            hub.subscribe(ClientId::new(), Topic::Global),
            Err(HubError::UnknownClient(_))
        ));
    }

    #[test]
    fn test_slow_client_does_not_block() {
        let hub = BroadcastHub::new(2);
        let slow = ClientId::new();
        let _slow_rx = hub.register_client(slow);
        hub.subscribe(slow, entity7()).unwrap();

        let fast = ClientId::new();
        let mut fast_rx = hub.register_client(fast);
        hub.subscribe(fast, entity7()).unwrap();

        let mut dropped = 0;
        for count in 0..10 {
            let report = hub.publish(entity7(), reading(7, count));
            dropped += report.dropped;
            // Fast client drains as it goes.
            assert_eq!(count_of(&fast_rx.try_recv().unwrap()), count);
        }
        assert_eq!(dropped, 8);
    }

    #[test]
    fn test_closed_clients_are_pruned() {
        let hub = BroadcastHub::new(4);
        let client = ClientId::new();
        let rx = hub.register_client(client);
        hub.subscribe(client, entity7()).unwrap();
        drop(rx);

        let report = hub.publish(entity7(), reading(7, 1));
        assert_eq!(report.dropped, 1);
        assert_eq!(hub.client_count(), 0);
    }

    #[test]
    fn test_remove_client_and_latest() {
        let hub = BroadcastHub::new(4);
        let client = ClientId::new();
        let _rx = hub.register_client(client);
        hub.subscribe(client, Topic::Global).unwrap();
        assert_eq!(hub.subscriptions(client), Some(vec![Topic::Global]));

        assert!(hub.remove_client(client));
        assert!(!hub.remove_client(client));
        assert_eq!(hub.client_count(), 0);

        let snapshot = HubMessage::BulkSnapshot {
            cycle: CycleKind::TrafficRefresh,
            entities: Vec::new(),
            at: Utc::now(),
        };
        hub.publish_message(snapshot.clone());
        assert_eq!(hub.latest(Topic::Global), Some(snapshot));
        assert_eq!(hub.snapshot().len(), 1);
    }
}
