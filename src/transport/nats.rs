use super::{subject_matches, Broker, BusMessage, Consumer, Producer, SharedProducer};
use crate::clock::SharedClock;
use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// NATS broker configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    pub broker_id: String,
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            broker_id: "default".to_string(),
            url: default_url(),
        }
    }
}

/// Session to one NATS broker.
///
/// Producers created from it publish synchronously by blocking on the
/// runtime the connection was made on, so they must be used from plain
/// threads (the agent threads), never from inside async code.
pub struct NatsConnection {
    client: async_nats::Client,
    runtime: Handle,
    clock: SharedClock,
}

impl NatsConnection {
    /// Connect to NATS
    pub async fn connect(config: &NatsConfig, clock: SharedClock) -> Result<Self> {
        info!(broker_id = %config.broker_id, url = %config.url, "Connecting to NATS");

        let client = async_nats::connect(&config.url)
            .await
            .with_context(|| format!("Failed to connect to NATS at {}", config.url))?;

        Ok(Self {
            client,
            runtime: Handle::current(),
            clock,
        })
    }

    pub fn producer(&self) -> NatsProducer {
        NatsProducer {
            client: self.client.clone(),
            runtime: self.runtime.clone(),
        }
    }

    /// Subscribes to `topics` and buffers incoming messages until the
    /// consumer's owner calls `receive`.
    ///
    /// Subscriptions are made by tasks on the connection's runtime, so this
    /// can be called from any thread. A failed subscription is logged.
    /// Patterns may overlap: a subject matched by several of them is
    /// forwarded once, by the first matching pattern's subscription.
    pub fn consumer(&self, topics: &[String]) -> NatsConsumer {
        let (tx, rx) = unbounded_channel();
        let mut tasks = Vec::with_capacity(topics.len());
        let patterns: Arc<[String]> = topics.into();

        for (index, topic) in topics.iter().enumerate() {
            let client = self.client.clone();
            let topic = topic.clone();
            let patterns = patterns.clone();
            let tx = tx.clone();
            let clock = self.clock.clone();

            tasks.push(self.runtime.spawn(async move {
                let mut subscriber = match client.subscribe(topic.clone()).await {
                    Ok(subscriber) => subscriber,
                    Err(e) => {
                        error!(topic = %topic, error = %e, "Failed to subscribe to NATS subject");
                        return;
                    }
                };
                info!(topic = %topic, "Subscribed to NATS subject");

                while let Some(msg) = subscriber.next().await {
                    let subject = msg.subject.to_string();
                    if owning_pattern(&patterns, &subject) != Some(index) {
                        continue;
                    }
                    // Non-JSON payloads are kept as text so recorders can still store them
                    let payload = serde_json::from_slice::<Value>(&msg.payload).unwrap_or_else(|_| {
                        Value::String(String::from_utf8_lossy(&msg.payload).into_owned())
                    });
                    let bus_msg = BusMessage {
                        msg_id: Uuid::new_v4().simple().to_string(),
                        topic: subject,
                        timestamp: clock.now(),
                        payload,
                    };
                    if tx.send(bus_msg).is_err() {
                        break;
                    }
                }
            }));
        }

        NatsConsumer {
            topics: topics.to_vec(),
            rx,
            tasks,
        }
    }
}

/// Index of the first pattern in `patterns` matching `subject`.
fn owning_pattern(patterns: &[String], subject: &str) -> Option<usize> {
    patterns.iter().position(|p| subject_matches(p, subject))
}

impl Broker for NatsConnection {
    fn producer(&self) -> SharedProducer {
        Arc::new(NatsConnection::producer(self))
    }

    fn consumer(&self, topics: &[String]) -> Box<dyn Consumer> {
        Box::new(NatsConnection::consumer(self, topics))
    }
}

/// Blocking publisher on a NATS session.
#[derive(Clone)]
pub struct NatsProducer {
    client: async_nats::Client,
    runtime: Handle,
}

impl Producer for NatsProducer {
    fn publish(&self, topic: &str, payload: &Value) -> Result<()> {
        let bytes = serde_json::to_vec(payload).context("Failed to serialize payload to JSON")?;

        debug!(subject = %topic, bytes = bytes.len(), "Publishing to NATS");

        self.runtime
            .block_on(self.client.publish(topic.to_string(), bytes.into()))
            .with_context(|| format!("Failed to publish to subject '{}'", topic))?;

        Ok(())
    }
}

/// Buffered NATS subscription owned by one handler.
pub struct NatsConsumer {
    topics: Vec<String>,
    rx: UnboundedReceiver<BusMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl Consumer for NatsConsumer {
    fn topics(&self) -> &[String] {
        &self.topics
    }

    fn receive(&mut self) -> Vec<BusMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            messages.push(msg);
        }
        messages
    }
}

impl Drop for NatsConsumer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_overlapping_patterns_have_one_owner() {
        let topics = patterns(&["iot.>", "iot.data.>"]);
        assert_eq!(owning_pattern(&topics, "iot.data.ads-1.0"), Some(0));
        assert_eq!(owning_pattern(&topics, "iot.health.ads-1"), Some(0));
    }

    #[test]
    fn test_disjoint_patterns_own_their_subjects() {
        let topics = patterns(&["iot.data.>", "iot.health.*"]);
        assert_eq!(owning_pattern(&topics, "iot.data.ads-1.0"), Some(0));
        assert_eq!(owning_pattern(&topics, "iot.health.ads-1"), Some(1));
        assert_eq!(owning_pattern(&topics, "other.topic"), None);
    }

    #[test]
    fn test_repeated_pattern_is_owned_by_first() {
        let topics = patterns(&["iot.cmd.pump", "iot.cmd.pump"]);
        assert_eq!(owning_pattern(&topics, "iot.cmd.pump"), Some(0));
    }
}
