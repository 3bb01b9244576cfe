use super::{Broker, BusMessage, Consumer, Producer, SharedProducer};
use crate::clock::SharedClock;
use anyhow::Result;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

struct Subscription {
    patterns: Vec<String>,
    tx: UnboundedSender<BusMessage>,
}

struct BusInner {
    subscriptions: DashMap<u64, Subscription>,
    next_id: AtomicU64,
    clock: SharedClock,
}

/// In-process message bus.
///
/// Every published message is delivered once to each consumer with at least
/// one matching pattern. Consumers that were dropped are pruned on publish.
/// Clones share the same bus.
#[derive(Clone)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

impl MemoryBus {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscriptions: DashMap::new(),
                next_id: AtomicU64::new(0),
                clock,
            }),
        }
    }

    /// Creates a consumer subscribed to `topics`.
    pub fn subscribe<S: AsRef<str>>(&self, topics: &[S]) -> MemoryConsumer {
        let (tx, rx) = unbounded_channel();
        let patterns: Vec<String> = topics.iter().map(|t| t.as_ref().to_string()).collect();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscriptions.insert(
            id,
            Subscription {
                patterns: patterns.clone(),
                tx,
            },
        );
        MemoryConsumer { topics: patterns, rx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriptions.len()
    }
}

impl Broker for MemoryBus {
    fn producer(&self) -> SharedProducer {
        Arc::new(self.clone())
    }

    fn consumer(&self, topics: &[String]) -> Box<dyn Consumer> {
        Box::new(self.subscribe(topics))
    }
}

impl Producer for MemoryBus {
    fn publish(&self, topic: &str, payload: &Value) -> Result<()> {
        let mut closed = Vec::new();

        for entry in self.inner.subscriptions.iter() {
            let sub = entry.value();
            if !sub.patterns.iter().any(|p| super::subject_matches(p, topic)) {
                continue;
            }
            let msg = BusMessage {
                msg_id: Uuid::new_v4().simple().to_string(),
                topic: topic.to_string(),
                timestamp: self.inner.clock.now(),
                payload: payload.clone(),
            };
            if sub.tx.send(msg).is_err() {
                closed.push(*entry.key());
            }
        }

        for id in closed {
            self.inner.subscriptions.remove(&id);
        }
        Ok(())
    }
}

/// Consumer end of a [`MemoryBus`] subscription.
pub struct MemoryConsumer {
    topics: Vec<String>,
    rx: UnboundedReceiver<BusMessage>,
}

impl Consumer for MemoryConsumer {
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
