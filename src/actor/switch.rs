use super::Actor;
use crate::message::{ActorCommand, OutputData};
use crate::timer::TimerSet;
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;

/// Port values for the two states of a switch actor and its initial state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct SwitchStates {
    pub on: i64,
    pub off: i64,
    pub init: i64,
}

/// Actor switched between ON and OFF on one output device port.
///
/// OFF is the safe state: reverting a command always switches OFF.
pub struct SwitchActor {
    actor_id: String,
    actor_type: String,
    model: String,
    port: String,
    states: SwitchStates,
    last_output: Option<OutputData>,
    timers: TimerSet<()>,
}

impl SwitchActor {
    pub fn new(
        actor_id: impl Into<String>,
        actor_type: impl Into<String>,
        port: impl Into<String>,
        states: SwitchStates,
    ) -> Self {
        let actor_type = actor_type.into();
        Self {
            actor_id: actor_id.into(),
            model: actor_type.clone(),
            actor_type,
            port: port.into(),
            states,
            last_output: None,
            timers: TimerSet::new(),
        }
    }

    /// Relay board with active-low inputs: ON = 0, OFF = 1, starts OFF.
    pub fn relais(
        actor_id: impl Into<String>,
        actor_type: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        let mut actor = Self::new(
            actor_id,
            actor_type,
            port,
            SwitchStates {
                on: 0,
                off: 1,
                init: 1,
            },
        );
        actor.model = "RELAIS 4*SRD-05VDC-SL-C".to_string();
        actor
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn states(&self) -> SwitchStates {
        self.states
    }

    pub fn is_on(&self) -> bool {
        self.last_output
            .as_ref()
            .map_or(false, |o| o.output_data == self.states.on)
    }

    pub fn outstanding_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn set_init_state(&mut self, now: NaiveDateTime) -> OutputData {
        self.switch(self.states.init, now)
    }

    /// Flips the current state. `None` until the actor has produced output.
    pub fn toggle_state(&mut self, now: NaiveDateTime) -> Option<OutputData> {
        let current = self.last_output.as_ref()?.output_data;
        let target = if current == self.states.off {
            self.states.on
        } else {
            self.states.off
        };
        Some(self.switch(target, now))
    }

    pub fn switch_on(&mut self, now: NaiveDateTime) -> OutputData {
        self.switch(self.states.on, now)
    }

    pub fn switch_off(&mut self, now: NaiveDateTime) -> OutputData {
        self.switch(self.states.off, now)
    }

    pub fn switch(&mut self, state: i64, now: NaiveDateTime) -> OutputData {
        debug!(actor_id = %self.actor_id, port = %self.port, state, "Actor switching");
        let output = OutputData::new(&self.actor_id, &self.actor_type, &self.port, now, state);
        self.last_output = Some(output.clone());
        output
    }
}

impl Actor for SwitchActor {
    fn actor_id(&self) -> &str {
        &self.actor_id
    }

    fn actor_type(&self) -> &str {
        &self.actor_type
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn process_command(&mut self, cmd: &ActorCommand, now: NaiveDateTime) -> Option<OutputData> {
        if cmd.cmd_duration > 0 {
            self.timers.create(cmd.cmd_duration, (), now);
        }
        if cmd.is_on() {
            Some(self.switch_on(now))
        } else {
            Some(self.switch_off(now))
        }
    }

    fn revert_command(&mut self, now: NaiveDateTime) -> Option<OutputData> {
        Some(self.switch_off(now))
    }

    fn timers(&self) -> &TimerSet<()> {
        &self.timers
    }

    fn timers_mut(&mut self) -> &mut TimerSet<()> {
        &mut self.timers
    }
}
