use super::{publish, Handler, HandlerStatus};
use crate::clock::SharedClock;
use crate::device::InputDevice;
use crate::message::Message;
use crate::scheduler::Scheduler;
use crate::transport::Outbound;
use tracing::{debug, error};

/// Polls an input device and publishes its probes and health reports.
///
/// Probes go to `{data_topic}.{device_id}.{channel_no}`, health reports to
/// `{health_topic}.{device_id}`.
pub struct InputDeviceHandler {
    device: Box<dyn InputDevice>,
    scheduler: Scheduler,
    data: Option<Outbound>,
    health: Option<Outbound>,
    status: HandlerStatus,
}

impl InputDeviceHandler {
    pub fn new(
        device: Box<dyn InputDevice>,
        polling_interval: u32,
        health_check_interval: u32,
        clock: SharedClock,
    ) -> Self {
        debug!(
            device_id = %device.device_id(),
            device_type = %device.device_type(),
            model = %device.model(),
            "Creating input device handler"
        );
        Self {
            device,
            scheduler: Scheduler::new(polling_interval, health_check_interval, clock),
            data: None,
            health: None,
            status: HandlerStatus::default(),
        }
    }

    pub fn with_data(mut self, data: Outbound) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_health(mut self, health: Outbound) -> Self {
        self.health = Some(health);
        self
    }

    pub fn device(&self) -> &dyn InputDevice {
        self.device.as_ref()
    }
}

impl Handler for InputDeviceHandler {
    fn handler_id(&self) -> &str {
        self.device.device_id()
    }

    fn handler_type(&self) -> &'static str {
        "input_device"
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
        if self.data.is_none() {
            return;
        }
        let now = self.scheduler.clock().now();
        let probes = match self.device.probe(now) {
            Ok(probes) => probes,
            Err(e) => {
                error!(device_id = %self.device.device_id(), error = %e, "Probe failed");
                self.status.record_error(&e);
                return;
            }
        };

        let device_id = self.device.device_id();
        for probe in &probes {
            let channel = probe.channel_no.to_string();
            publish(
                device_id,
                self.data.as_ref(),
                &[device_id, channel.as_str()],
                &probe.to_record(),
                &mut self.status,
            );
        }
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
}
