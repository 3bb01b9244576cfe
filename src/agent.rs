//! Agents: one thread per handler driving its tick loop.
//!
//! The loop waits on the cancellation channel for `cancel_poll`, sleeps for
//! `tick_sleep` and then ticks the handler, which yields a cadence of about
//! one second while reacting to `stop` within `cancel_poll`.
//!
//! Cancellation is cooperative. A handler blocked inside a callback cannot
//! be interrupted; `stop` then reports failure once the grace period has
//! passed, and `kill` merely waits again.

use crate::handler::Handler;
use anyhow::{bail, Context, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Loop cadence and shutdown grace period of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentTiming {
    /// How long each iteration waits for cancellation
    pub cancel_poll: Duration,
    /// Sleep between the cancellation check and the tick
    pub tick_sleep: Duration,
    /// How long `stop` waits for the thread to exit
    pub stop_grace: Duration,
}

impl Default for AgentTiming {
    fn default() -> Self {
        Self {
            cancel_poll: Duration::from_millis(100),
            tick_sleep: Duration::from_millis(900),
            stop_grace: Duration::from_secs(3),
        }
    }
}

/// A started agent thread.
struct Running {
    cancel: Sender<()>,
    /// Hands the handler back when the loop exits
    done: Receiver<Box<dyn Handler>>,
    thread: JoinHandle<()>,
}

/// Execution context of one handler.
///
/// The handler lives on the agent thread while the agent runs and is handed
/// back on a clean stop, so the agent can be started again.
pub struct Agent {
    agent_id: String,
    timing: AgentTiming,
    handler: Option<Box<dyn Handler>>,
    running: Option<Running>,
}

impl Agent {
    pub fn new(handler: Box<dyn Handler>) -> Self {
        let agent_id = format!("A.{}.{}", handler.handler_id(), Uuid::new_v4().simple());
        Self {
            agent_id,
            timing: AgentTiming::default(),
            handler: Some(handler),
            running: None,
        }
    }

    pub fn with_timing(mut self, timing: AgentTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn timing(&self) -> AgentTiming {
        self.timing
    }

    /// The handler, while the agent is not running.
    pub fn handler(&self) -> Option<&dyn Handler> {
        self.handler.as_deref()
    }

    pub fn handler_mut(&mut self) -> Option<&mut (dyn Handler + 'static)> {
        self.handler.as_deref_mut()
    }

    /// True while the agent thread is alive.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map_or(false, |running| !running.thread.is_finished())
    }

    /// Spawns the agent thread.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            bail!("agent {} is already running", self.agent_id);
        }
        let Some(mut handler) = self.handler.take() else {
            bail!("agent {} has lost its handler", self.agent_id);
        };

        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<Box<dyn Handler>>();
        let agent_id = self.agent_id.clone();
        let timing = self.timing;

        let thread = thread::Builder::new()
            .name(format!("agent-{}", handler.handler_id()))
            .spawn(move || {
                let span = info_span!("agent", agent_id = %agent_id);
                let _enter = span.enter();

                info!(
                    handler_id = %handler.handler_id(),
                    handler_type = handler.handler_type(),
                    "Agent started"
                );
                handler.init_time();

                loop {
                    match cancel_rx.recv_timeout(timing.cancel_poll) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    thread::sleep(timing.tick_sleep);
                    let due = handler.tick();
                    if due.polling || due.health_check {
                        debug!(polling = due.polling, health_check = due.health_check, "Tick");
                    }
                }

                info!("Agent loop finished");
                // The owner may have given up waiting already
                let _ = done_tx.send(handler);
            })
            .with_context(|| format!("Failed to spawn thread for agent {}", self.agent_id))?;

        self.running = Some(Running {
            cancel: cancel_tx,
            done: done_rx,
            thread,
        });
        Ok(())
    }

    /// Signals cancellation and waits up to the grace period for the thread
    /// to exit. Returns whether it did. Stopping an agent that is not
    /// running succeeds immediately.
    pub fn stop(&mut self) -> bool {
        let Some(running) = self.running.as_ref() else {
            return true;
        };

        // Fails only if the thread is already gone
        let _ = running.cancel.send(());

        match running.done.recv_timeout(self.timing.stop_grace) {
            Ok(handler) => {
                self.handler = Some(handler);
                self.join();
                info!(agent_id = %self.agent_id, "Agent stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    agent_id = %self.agent_id,
                    grace_ms = self.timing.stop_grace.as_millis() as u64,
                    "Agent did not stop within grace period"
                );
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.join();
                error!(
                    agent_id = %self.agent_id,
                    "Agent thread terminated abnormally, handler lost"
                );
                true
            }
        }
    }

    /// Retries [`Agent::stop`]. There is no forced termination: a handler
    /// stuck in a callback keeps its thread alive.
    pub fn kill(&mut self) -> bool {
        warn!(agent_id = %self.agent_id, "Killing agent, retrying graceful stop");
        self.stop()
    }

    fn join(&mut self) {
        if let Some(running) = self.running.take() {
            if running.thread.join().is_err() {
                error!(agent_id = %self.agent_id, "Agent thread panicked");
            }
        }
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if self.running.is_some() && !self.stop() {
            warn!(agent_id = %self.agent_id, "Dropping agent with running thread");
        }
    }
}
