//! Handlers: one timing skeleton shared by every device category.
//!
//! A handler owns a [`Scheduler`] and reacts to the two events it reports.
//! Handlers that consume bus messages drain their consumer on the polling
//! event, so receiving is driven by the timer rather than by callbacks.

use crate::freshness::{age_secs, Freshness, FreshnessPolicy};
use crate::message::Message;
use crate::scheduler::{DueEvents, Scheduler};
use crate::transport::{BusMessage, Inbound, Outbound};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, warn};

mod actor;
mod input;
mod output;
mod sensor;

pub use actor::{ActorHandler, DEFAULT_ACTOR_HEALTH_INTERVAL};
pub use input::InputDeviceHandler;
pub use output::OutputDeviceHandler;
pub use sensor::{sensor_health_interval, SensorHandler};

#[cfg(test)]
mod tests;

/// What a handler did with one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Decoded, fresh and acted upon.
    Applied,
    /// Older than the freshness threshold; discarded.
    Stale,
    /// Could not be decoded; discarded.
    Malformed,
    /// Not addressed to this handler.
    Ignored,
}

/// Counters kept by every handler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandlerStatus {
    /// Number of polling events handled
    pub poll_count: u64,
    /// Number of health-check events handled
    pub health_count: u64,
    /// Inbound messages acted upon
    pub applied_count: u64,
    /// Inbound messages discarded as stale or malformed
    pub discarded_count: u64,
    /// Device and transport failures contained by the handler
    pub error_count: u64,
    /// Last contained failure
    pub last_error: Option<String>,
    /// Wall-clock time of the last polling event
    pub last_poll: Option<chrono::DateTime<Utc>>,
}

impl HandlerStatus {
    pub fn record_outcome(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Applied => self.applied_count += 1,
            MessageOutcome::Stale | MessageOutcome::Malformed => self.discarded_count += 1,
            MessageOutcome::Ignored => {}
        }
    }

    pub fn record_error(&mut self, error: &anyhow::Error) {
        self.error_count += 1;
        self.last_error = Some(format!("{:#}", error));
    }
}

/// A scheduler plus the behavior of one device category.
///
/// `on_polling_due` and `on_health_check_due` must contain their own
/// failures: a failing device or transport is logged and skipped for the
/// cycle, never propagated to the agent loop.
pub trait Handler: Send {
    /// Identifier of the controlled element (device, actor or sensor).
    fn handler_id(&self) -> &str;

    /// Short category name for logs.
    fn handler_type(&self) -> &'static str;

    fn scheduler(&self) -> &Scheduler;
    fn scheduler_mut(&mut self) -> &mut Scheduler;

    fn status(&self) -> &HandlerStatus;
    fn status_mut(&mut self) -> &mut HandlerStatus;

    fn on_polling_due(&mut self);

    fn on_health_check_due(&mut self) {}

    /// Aligns the scheduler to wall-clock slots.
    fn init_time(&mut self) {
        self.scheduler_mut().init_time();
    }

    /// Advances the scheduler and runs whatever became due, polling first.
    fn tick(&mut self) -> DueEvents {
        let due = self.scheduler_mut().tick();
        if due.polling {
            let status = self.status_mut();
            status.poll_count += 1;
            status.last_poll = Some(Utc::now());
            self.on_polling_due();
        }
        if due.health_check {
            self.status_mut().health_count += 1;
            self.on_health_check_due();
        }
        due
    }

    /// Stops the scheduler for good.
    fn stop(&mut self) {
        self.scheduler_mut().stop();
    }
}

/// Drains `inbound`, if configured.
pub(crate) fn drain(handler_id: &str, inbound: Option<&mut Inbound>) -> Vec<BusMessage> {
    let Some(inbound) = inbound else {
        return Vec::new();
    };
    let messages = inbound.receive();
    if !messages.is_empty() {
        debug!(handler_id = %handler_id, count = messages.len(), "Received messages");
    }
    messages
}

/// Returns true if `msg` arrived on a topic covered by `inbound`.
pub(crate) fn addressed_to(handler_id: &str, inbound: Option<&Inbound>, msg: &BusMessage) -> bool {
    match inbound {
        Some(inbound) if inbound.accepts(&msg.topic) => true,
        Some(inbound) => {
            debug!(
                handler_id = %handler_id,
                topic = %msg.topic,
                expected = %inbound.topic(),
                "Unexpected topic"
            );
            false
        }
        None => false,
    }
}

/// Decodes `msg` as `M` and applies `policy` relative to the time `msg` was
/// received. Time spent buffered until the next polling event does not count
/// towards its age.
///
/// Malformed payloads are logged as errors and stale ones as warnings; both
/// come back as the outcome to report.
pub(crate) fn admit<M: Message>(
    handler_id: &str,
    msg: &BusMessage,
    policy: &FreshnessPolicy,
) -> Result<M, MessageOutcome> {
    let decoded = match M::from_record(&msg.payload) {
        Ok(decoded) => decoded,
        Err(e) => {
            error!(
                handler_id = %handler_id,
                topic = %msg.topic,
                msg_id = %msg.msg_id,
                class = M::CLASS,
                error = %e,
                "Malformed message, discarded"
            );
            return Err(MessageOutcome::Malformed);
        }
    };

    match policy.check(decoded.created_at(), msg.timestamp) {
        Freshness::Fresh => Ok(decoded),
        Freshness::Stale { age } => {
            warn!(
                handler_id = %handler_id,
                topic = %msg.topic,
                msg_id = %msg.msg_id,
                age_secs = age_secs(age),
                max_age_secs = policy.max_age().num_seconds(),
                "Stale message, discarded"
            );
            Err(MessageOutcome::Stale)
        }
    }
}

/// Publishes `record` to the endpoint topic extended by `parts`. A missing
/// endpoint skips silently; a transport failure is logged and counted.
pub(crate) fn publish(
    handler_id: &str,
    outbound: Option<&Outbound>,
    parts: &[&str],
    record: &Value,
    status: &mut HandlerStatus,
) {
    let Some(outbound) = outbound else {
        return;
    };
    let topic = outbound.subtopic(parts);
    match outbound.publish(&topic, record) {
        Ok(()) => debug!(handler_id = %handler_id, topic = %topic, "Published"),
        Err(e) => {
            error!(handler_id = %handler_id, topic = %topic, error = %e, "Publish failed");
            status.record_error(&e);
        }
    }
}
