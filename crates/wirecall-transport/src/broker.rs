//! Named-topic broadcast hub.
//!
//! The acceptor uses a single reserved topic for its keep-alive heartbeat;
//! topics are created lazily on first subscription or publish.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use tokio::sync::broadcast;

/// Buffered payloads per topic before slow subscribers start lagging.
const TOPIC_CAPACITY: usize = 16;

/// Publish/subscribe hub keyed by topic name.
#[derive(Debug, Default)]
pub struct Broker {
    topics: RwLock<HashMap<String, broadcast::Sender<Bytes>>>,
}

impl Broker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to a topic, creating it on first use.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Bytes> {
        let mut topics = self.topics.write().expect("broker lock poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Publishes a payload to every subscriber of a topic.
    ///
    /// Returns the number of subscribers the payload reached; publishing to
    /// a topic nobody listens on is a no-op.
    pub fn publish(&self, topic: &str, payload: Bytes) -> usize {
        let topics = self.topics.read().expect("broker lock poisoned");
        match topics.get(topic) {
            Some(sender) => sender.send(payload).unwrap_or(0),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_reaches_nobody() {
        let broker = Broker::new();
        assert_eq!(broker.publish("ping", Bytes::new()), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_published_payloads() {
        let broker = Broker::new();
        let mut first = broker.subscribe("ping");
        let mut second = broker.subscribe("ping");

        assert_eq!(broker.publish("ping", Bytes::from_static(b"hi")), 2);
        assert_eq!(first.recv().await.unwrap(), Bytes::from_static(b"hi"));
        assert_eq!(second.recv().await.unwrap(), Bytes::from_static(b"hi"));
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let broker = Broker::new();
        let mut ping = broker.subscribe("ping");

        broker.publish("other", Bytes::from_static(b"x"));
        broker.publish("ping", Bytes::from_static(b"y"));
        assert_eq!(ping.recv().await.unwrap(), Bytes::from_static(b"y"));
    }
}
