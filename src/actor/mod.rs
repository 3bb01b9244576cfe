//! Actors: stateful abstractions that turn commands into output data.
//!
//! An actor never touches hardware itself. It produces [`OutputData`]
//! records that its handler publishes to the output device's input topic.

use crate::message::{ActorCommand, OutputData};
use crate::timer::TimerSet;
use chrono::NaiveDateTime;

mod switch;

pub use switch::{SwitchActor, SwitchStates};

/// An element that executes [`ActorCommand`]s.
pub trait Actor: Send {
    fn actor_id(&self) -> &str;
    fn actor_type(&self) -> &str;
    fn model(&self) -> &str;

    /// Executes a command. Arms a revert timer when the command carries a
    /// duration.
    fn process_command(&mut self, cmd: &ActorCommand, now: NaiveDateTime) -> Option<OutputData>;

    /// Forces the actor into its safe state.
    fn revert_command(&mut self, now: NaiveDateTime) -> Option<OutputData>;

    fn timers(&self) -> &TimerSet<()>;
    fn timers_mut(&mut self) -> &mut TimerSet<()>;

    /// Reverts once per timer that has expired by `now`.
    fn timer_tick(&mut self, now: NaiveDateTime) -> Vec<OutputData> {
        let expired = self.timers_mut().take_expired(now);
        expired
            .iter()
            .filter_map(|_| self.revert_command(now))
            .collect()
    }

    /// Discards all outstanding timers.
    fn clear_timers(&mut self) {
        self.timers_mut().clear();
    }
}
