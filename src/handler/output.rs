use super::{addressed_to, admit, drain, publish, Handler, HandlerStatus, MessageOutcome};
use crate::clock::SharedClock;
use crate::device::OutputDevice;
use crate::freshness::FreshnessPolicy;
use crate::message::{Message, OutputData};
use crate::scheduler::Scheduler;
use crate::timer::TimerSet;
use crate::transport::{BusMessage, Inbound, Outbound};
use tracing::{debug, error, info};

/// Switches the ports of an output device as told by [`OutputData`]
/// commands.
///
/// A command with a duration arms a timer that later switches the port to
/// the opposite state, `(state + 1) % 2`.
pub struct OutputDeviceHandler {
    device: Box<dyn OutputDevice>,
    scheduler: Scheduler,
    input: Option<Inbound>,
    health: Option<Outbound>,
    freshness: FreshnessPolicy,
    /// Pending reverts as `(port, state)`
    timers: TimerSet<(String, i64)>,
    status: HandlerStatus,
}

impl OutputDeviceHandler {
    pub fn new(
        device: Box<dyn OutputDevice>,
        polling_interval: u32,
        health_check_interval: u32,
        clock: SharedClock,
    ) -> Self {
        debug!(
            device_id = %device.device_id(),
            device_type = %device.device_type(),
            model = %device.model(),
            "Creating output device handler"
        );
        Self {
            device,
            scheduler: Scheduler::new(polling_interval, health_check_interval, clock),
            input: None,
            health: None,
            freshness: FreshnessPolicy::commands(),
            timers: TimerSet::new(),
            status: HandlerStatus::default(),
        }
    }

    pub fn with_input(mut self, input: Inbound) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_health(mut self, health: Outbound) -> Self {
        self.health = Some(health);
        self
    }

    pub fn device(&self) -> &dyn OutputDevice {
        self.device.as_ref()
    }

    pub fn pending_reverts(&self) -> usize {
        self.timers.len()
    }

    /// Applies one inbound output command.
    pub fn on_message(&mut self, msg: &BusMessage) -> MessageOutcome {
        let device_id = self.device.device_id().to_string();
        if !addressed_to(&device_id, self.input.as_ref(), msg) {
            return MessageOutcome::Ignored;
        }

        let outcome = match admit::<OutputData>(&device_id, msg, &self.freshness) {
            Ok(output) => {
                self.process_output(
                    &output.output_port,
                    output.output_data,
                    output.output_duration,
                );
                MessageOutcome::Applied
            }
            Err(outcome) => outcome,
        };
        self.status.record_outcome(outcome);
        outcome
    }

    fn process_output(&mut self, port: &str, state: i64, duration: Option<u32>) {
        debug!(device_id = %self.device.device_id(), port = %port, state, "Switching port");
        if let Err(e) = self.device.switch_to(port, state) {
            error!(device_id = %self.device.device_id(), port = %port, error = %e, "Switch failed");
            self.status.record_error(&e);
            return;
        }

        if let Some(duration) = duration {
            let now = self.scheduler.clock().now();
            let revert_state = (state + 1) % 2;
            self.timers.create(duration, (port.to_string(), revert_state), now);
            debug!(
                device_id = %self.device.device_id(),
                port = %port,
                duration_secs = duration,
                "Revert timer started"
            );
        }
    }

    fn run_timers(&mut self) {
        let now = self.scheduler.clock().now();
        for timer in self.timers.take_expired(now) {
            let (port, state) = timer.payload;
            self.process_output(&port, state, None);
        }
    }
}

impl Handler for OutputDeviceHandler {
    fn handler_id(&self) -> &str {
        self.device.device_id()
    }

    fn handler_type(&self) -> &'static str {
        "output_device"
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
        let messages = drain(self.device.device_id(), self.input.as_mut());
        for msg in &messages {
            self.on_message(msg);
        }
        self.run_timers();
    }

    fn on_health_check_due(&mut self) {
        if self.health.is_none() {
            return;
        }
        let now = self.scheduler.clock().now();
        let health = match self.device.check_health(now) {
            Ok(Some(health)) => health,
            Ok(None) => return,
            Err(e) => {
                error!(device_id = %self.device.device_id(), error = %e, "Health check failed");
                self.status.record_error(&e);
                return;
            }
        };

        let device_id = self.device.device_id();
        publish(
            device_id,
            self.health.as_ref(),
            &[device_id],
            &health.to_record(),
            &mut self.status,
        );
    }

    fn stop(&mut self) {
        if !self.timers.is_empty() {
            info!(
                device_id = %self.device.device_id(),
                pending = self.timers.len(),
                "Discarding pending revert timers"
            );
            self.timers.clear();
        }
        self.scheduler.stop();
    }
}
