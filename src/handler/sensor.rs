use super::{addressed_to, admit, drain, publish, Handler, HandlerStatus, MessageOutcome};
use crate::clock::SharedClock;
use crate::freshness::FreshnessPolicy;
use crate::message::{InputProbe, Message};
use crate::scheduler::Scheduler;
use crate::sensor::Sensor;
use crate::transport::{BusMessage, Inbound, Outbound};
use tracing::{debug, info};

/// Health-check interval of a sensor handler polling every
/// `polling_interval` seconds.
pub fn sensor_health_interval(polling_interval: u32) -> u32 {
    polling_interval.saturating_mul(30).min(300)
}

/// Turns fresh input probes into sensor measurements, published to
/// `{data_topic}.{sensor_id}`.
pub struct SensorHandler {
    sensor: Sensor,
    scheduler: Scheduler,
    input: Option<Inbound>,
    data: Option<Outbound>,
    freshness: FreshnessPolicy,
    status: HandlerStatus,
}

impl SensorHandler {
    pub fn new(sensor: Sensor, polling_interval: u32, clock: SharedClock) -> Self {
        debug!(
            sensor_id = %sensor.sensor_id(),
            sensor_type = %sensor.sensor_type(),
            "Creating sensor handler"
        );
        Self {
            sensor,
            scheduler: Scheduler::new(
                polling_interval,
                sensor_health_interval(polling_interval),
                clock,
            ),
            input: None,
            data: None,
            freshness: FreshnessPolicy::probes(),
            status: HandlerStatus::default(),
        }
    }

    pub fn with_input(mut self, input: Inbound) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_data(mut self, data: Outbound) -> Self {
        self.data = Some(data);
        self
    }

    pub fn sensor(&self) -> &Sensor {
        &self.sensor
    }

    /// Measures one inbound probe.
    pub fn on_message(&mut self, msg: &BusMessage) -> MessageOutcome {
        let sensor_id = self.sensor.sensor_id().to_string();
        if !addressed_to(&sensor_id, self.input.as_ref(), msg) {
            return MessageOutcome::Ignored;
        }
        if self.data.is_none() {
            return MessageOutcome::Ignored;
        }

        let outcome = match admit::<InputProbe>(&sensor_id, msg, &self.freshness) {
            Ok(probe) => {
                let now = self.scheduler.clock().now();
                let msmt = self.sensor.measure(&probe, now);
                publish(
                    &sensor_id,
                    self.data.as_ref(),
                    &[sensor_id.as_str()],
                    &msmt.to_record(),
                    &mut self.status,
                );
                MessageOutcome::Applied
            }
            Err(outcome) => outcome,
        };
        self.status.record_outcome(outcome);
        outcome
    }
}

impl Handler for SensorHandler {
    fn handler_id(&self) -> &str {
        self.sensor.sensor_id()
    }

    fn handler_type(&self) -> &'static str {
        "sensor"
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
        let messages = drain(self.sensor.sensor_id(), self.input.as_mut());
        for msg in &messages {
            self.on_message(msg);
        }
    }

    fn on_health_check_due(&mut self) {
        match self.sensor.last_measurement() {
            Some(msmt) => info!(
                sensor_id = %self.sensor.sensor_id(),
                msmt_time = %msmt.msmt_time,
                msmt_value = msmt.msmt_value,
                unit = %msmt.msmt_unit,
                measured = self.status.applied_count,
                discarded = self.status.discarded_count,
                "Sensor health"
            ),
            None => info!(
                sensor_id = %self.sensor.sensor_id(),
                discarded = self.status.discarded_count,
                "Sensor health, no measurement yet"
            ),
        }
    }
}
