use super::{addressed_to, admit, drain, publish, Handler, HandlerStatus, MessageOutcome};
use crate::actor::Actor;
use crate::clock::SharedClock;
use crate::freshness::FreshnessPolicy;
use crate::message::{ActorCommand, Message};
use crate::scheduler::Scheduler;
use crate::transport::{BusMessage, Inbound, Outbound};
use tracing::{debug, info};

/// Health-check interval used when none is configured.
pub const DEFAULT_ACTOR_HEALTH_INTERVAL: u32 = 900;

/// Drives an [`Actor`]: applies fresh commands and publishes the resulting
/// output data, and reverts the actor when its timers expire.
///
/// Polls every second, since the polling event doubles as the timer tick.
pub struct ActorHandler {
    actor: Box<dyn Actor>,
    scheduler: Scheduler,
    input: Option<Inbound>,
    data: Option<Outbound>,
    freshness: FreshnessPolicy,
    status: HandlerStatus,
}

impl ActorHandler {
    /// Creates the handler. A `health_check_interval` of 0 selects
    /// [`DEFAULT_ACTOR_HEALTH_INTERVAL`].
    pub fn new(actor: Box<dyn Actor>, health_check_interval: u32, clock: SharedClock) -> Self {
        debug!(
            actor_id = %actor.actor_id(),
            actor_type = %actor.actor_type(),
            model = %actor.model(),
            "Creating actor handler"
        );
        let health_check_interval = if health_check_interval > 0 {
            health_check_interval
        } else {
            DEFAULT_ACTOR_HEALTH_INTERVAL
        };
        Self {
            actor,
            scheduler: Scheduler::new(1, health_check_interval, clock),
            input: None,
            data: None,
            freshness: FreshnessPolicy::commands(),
            status: HandlerStatus::default(),
        }
    }

    pub fn with_input(mut self, input: Inbound) -> Self {
        self.input = Some(input);
        self
    }

    /// Endpoint the actor's output data is published to, usually the input
    /// topic of an output device handler.
    pub fn with_data(mut self, data: Outbound) -> Self {
        self.data = Some(data);
        self
    }

    pub fn actor(&self) -> &dyn Actor {
        self.actor.as_ref()
    }

    /// Applies one inbound actor command.
    pub fn on_message(&mut self, msg: &BusMessage) -> MessageOutcome {
        let actor_id = self.actor.actor_id().to_string();
        if !addressed_to(&actor_id, self.input.as_ref(), msg) {
            return MessageOutcome::Ignored;
        }

        let outcome = match admit::<ActorCommand>(&actor_id, msg, &self.freshness) {
            Ok(cmd) => {
                let now = self.scheduler.clock().now();
                debug!(
                    actor_id = %actor_id,
                    sender_id = %cmd.sender_id,
                    detail = %cmd.cmd_detail,
                    duration_secs = cmd.cmd_duration,
                    "Processing command"
                );
                if let Some(output) = self.actor.process_command(&cmd, now) {
                    publish(
                        &actor_id,
                        self.data.as_ref(),
                        &[],
                        &output.to_record(),
                        &mut self.status,
                    );
                }
                MessageOutcome::Applied
            }
            Err(outcome) => outcome,
        };
        self.status.record_outcome(outcome);
        outcome
    }
}

impl Handler for ActorHandler {
    fn handler_id(&self) -> &str {
        self.actor.actor_id()
    }

    fn handler_type(&self) -> &'static str {
        "actor"
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
        let messages = drain(self.actor.actor_id(), self.input.as_mut());
        for msg in &messages {
            self.on_message(msg);
        }

        let now = self.scheduler.clock().now();
        let reverts = self.actor.timer_tick(now);
        let actor_id = self.actor.actor_id();
        for output in &reverts {
            debug!(actor_id = %actor_id, port = %output.output_port, "Timer expired, reverting");
            publish(actor_id, self.data.as_ref(), &[], &output.to_record(), &mut self.status);
        }
    }

    fn stop(&mut self) {
        info!(actor_id = %self.actor.actor_id(), "Stopping actor, clearing timers");
        self.actor.clear_timers();
        self.scheduler.stop();
    }
}
