//! Message recorder: a handler that stores everything it receives.

use crate::store::{Record, RecordEntry, RecordStore};
use anyhow::Result;
use iot_agents::clock::SharedClock;
use iot_agents::handler::{Handler, HandlerStatus};
use iot_agents::message::message_class;
use iot_agents::scheduler::Scheduler;
use iot_agents::transport::{BusMessage, Consumer};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Default polling interval of a recorder (seconds).
pub const DEFAULT_POLLING_INTERVAL: u32 = 5;

/// Default health-check interval of a recorder (seconds).
pub const DEFAULT_HEALTH_CHECK_INTERVAL: u32 = 600;

/// Counters reported on health checks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecorderStats {
    /// Messages taken from the consumer
    pub received: u64,
    /// Stored as a known message type
    pub typed: u64,
    /// Stored as generic records
    pub generic: u64,
    /// Could not be stored
    pub failed: u64,
}

/// Drains its subscriptions on every polling event and persists each
/// message. Messages are never discarded for their content: anything that
/// does not decode is stored as a generic record.
pub struct MessageRecorder {
    recorder_id: String,
    scheduler: Scheduler,
    consumer: Box<dyn Consumer>,
    store: Box<dyn RecordStore>,
    status: HandlerStatus,
    stats: RecorderStats,
}

impl MessageRecorder {
    pub fn new(
        broker_id: &str,
        consumer: Box<dyn Consumer>,
        store: Box<dyn RecordStore>,
        polling_interval: u32,
        health_check_interval: u32,
        clock: SharedClock,
    ) -> Self {
        let recorder_id = format!("Rec.{}.{}", broker_id, Uuid::new_v4().simple());
        info!(
            recorder_id = %recorder_id,
            topics = ?consumer.topics(),
            "Creating message recorder"
        );
        Self {
            recorder_id,
            scheduler: Scheduler::new(polling_interval, health_check_interval, clock),
            consumer,
            store,
            status: HandlerStatus::default(),
            stats: RecorderStats::default(),
        }
    }

    pub fn stats(&self) -> &RecorderStats {
        &self.stats
    }

    /// Classifies and stores one message.
    pub fn record(&mut self, msg: &BusMessage) -> Result<()> {
        self.stats.received += 1;
        let record = Record::classify(&msg.payload);
        let entry = RecordEntry {
            msg_id: msg.msg_id.clone(),
            topic: msg.topic.clone(),
            timestamp: msg.timestamp,
            class: message_class(&msg.payload).unwrap_or_default().to_string(),
            stored_at: self.scheduler.clock().now(),
            record,
        };

        if let Err(e) = self.store.store(&entry) {
            self.stats.failed += 1;
            return Err(e);
        }

        if entry.record.is_generic() {
            self.stats.generic += 1;
        } else {
            self.stats.typed += 1;
        }
        Ok(())
    }
}

impl Handler for MessageRecorder {
    fn handler_id(&self) -> &str {
        &self.recorder_id
    }

    fn handler_type(&self) -> &'static str {
        "recorder"
    }

    fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    fn status(&self) -> &HandlerStatus {
        &self.status
    }

    fn status_mut(&mut self) -> &mut HandlerStatus {
        &mut self.status
    }

    fn on_polling_due(&mut self) {
        let messages = self.consumer.receive();
        if messages.is_empty() {
            return;
        }
        debug!(recorder_id = %self.recorder_id, count = messages.len(), "Recording messages");

        for msg in &messages {
            if let Err(e) = self.record(msg) {
                error!(
                    recorder_id = %self.recorder_id,
                    msg_id = %msg.msg_id,
                    topic = %msg.topic,
                    error = %e,
                    "Failed to store message"
                );
                self.status.record_error(&e);
            }
        }
    }

    fn on_health_check_due(&mut self) {
        info!(
            recorder_id = %self.recorder_id,
            received = self.stats.received,
            typed = self.stats.typed,
            generic = self.stats.generic,
            failed = self.stats.failed,
            "Recorder health"
        );
    }
}
