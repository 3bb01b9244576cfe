//! Message bus endpoints.
//!
//! Topics are dot-separated subjects. Subscriptions accept NATS-style
//! wildcards: `*` matches one token, a trailing `>` matches one or more.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde_json::Value;
use std::sync::Arc;

mod memory;
mod nats;

pub use memory::{MemoryBus, MemoryConsumer};
pub use nats::{NatsConfig, NatsConnection, NatsConsumer, NatsProducer};

/// A message received from the bus.
#[derive(Clone, Debug, PartialEq)]
pub struct BusMessage {
    /// Identifier assigned on receipt.
    pub msg_id: String,
    pub topic: String,
    /// Time the message was received. Freshness is judged against it.
    pub timestamp: NaiveDateTime,
    pub payload: Value,
}

/// Publishing side of a broker session. Shared between handlers.
pub trait Producer: Send + Sync {
    fn publish(&self, topic: &str, payload: &Value) -> Result<()>;
}

/// Receiving side of a broker session, owned by one handler.
pub trait Consumer: Send {
    /// Subscription patterns of this consumer.
    fn topics(&self) -> &[String];

    /// Drains the messages buffered since the last call.
    fn receive(&mut self) -> Vec<BusMessage>;
}

pub type SharedProducer = Arc<dyn Producer>;

/// A broker session that hands out endpoints.
pub trait Broker: Send + Sync {
    /// Producer for this session. Callers share it between handlers.
    fn producer(&self) -> SharedProducer;

    /// New consumer subscribed to `topics`.
    fn consumer(&self, topics: &[String]) -> Box<dyn Consumer>;
}

/// Destination for outbound messages: a shared producer and a topic prefix.
#[derive(Clone)]
pub struct Outbound {
    producer: SharedProducer,
    topic: String,
}

impl Outbound {
    pub fn new(producer: SharedProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Topic prefix extended with `parts`.
    pub fn subtopic(&self, parts: &[&str]) -> String {
        join_topic(&self.topic, parts)
    }

    pub fn publish(&self, topic: &str, payload: &Value) -> Result<()> {
        self.producer.publish(topic, payload)
    }
}

/// Source of inbound messages: an owned consumer subscribed to `topic`.
pub struct Inbound {
    consumer: Box<dyn Consumer>,
    topic: String,
}

impl Inbound {
    pub fn new(consumer: Box<dyn Consumer>, topic: impl Into<String>) -> Self {
        Self {
            consumer,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// True if `topic` falls under this endpoint's subscription.
    pub fn accepts(&self, topic: &str) -> bool {
        subject_matches(&self.topic, topic)
    }

    pub fn receive(&mut self) -> Vec<BusMessage> {
        self.consumer.receive()
    }
}

/// Joins a topic prefix and further tokens with dots.
pub fn join_topic(prefix: &str, parts: &[&str]) -> String {
    let mut topic = prefix.to_string();
    for part in parts {
        if !topic.is_empty() {
            topic.push('.');
        }
        topic.push_str(part);
    }
    topic
}

/// Matches a subject against a subscription pattern.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(_)) => return pattern_tokens.next().is_none(),
            (Some("*"), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
