//! Owns the agents of one host process.

use crate::agent::{Agent, AgentTiming};
use crate::handler::Handler;
use anyhow::{Context, Result};
use tracing::{error, info, warn};

/// Result of stopping every agent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StopReport {
    pub stopped: Vec<String>,
    /// Agents whose threads were still alive after `kill`
    pub failed: Vec<String>,
}

impl StopReport {
    pub fn all_stopped(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Host {
    agents: Vec<Agent>,
}

impl Host {
    pub fn new(handlers: Vec<Box<dyn Handler>>, timing: AgentTiming) -> Self {
        let agents = handlers
            .into_iter()
            .map(|handler| Agent::new(handler).with_timing(timing))
            .collect();
        Self { agents }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn running_count(&self) -> usize {
        self.agents.iter().filter(|a| a.is_running()).count()
    }

    /// Starts every agent. On failure the agents started so far are stopped
    /// again.
    pub fn start_all(&mut self) -> Result<()> {
        for index in 0..self.agents.len() {
            let agent = &mut self.agents[index];
            let started = agent
                .start()
                .with_context(|| format!("Failed to start agent {}", agent.agent_id()));
            if let Err(e) = started {
                error!(error = %e, "Aborting host start");
                self.stop_all();
                return Err(e);
            }
        }
        info!(agents = self.agents.len(), "All agents started");
        Ok(())
    }

    /// Stops every agent, retrying with `kill` where the grace period
    /// expires, then stops the handlers that were handed back.
    pub fn stop_all(&mut self) -> StopReport {
        let mut report = StopReport::default();

        for agent in &mut self.agents {
            let agent_id = agent.agent_id().to_string();
            if agent.stop() || agent.kill() {
                if let Some(handler) = agent.handler_mut() {
                    handler.stop();
                }
                report.stopped.push(agent_id);
            } else {
                warn!(agent_id = %agent_id, "Agent could not be stopped");
                report.failed.push(agent_id);
            }
        }

        info!(
            stopped = report.stopped.len(),
            failed = report.failed.len(),
            "Host stopped"
        );
        report
    }
}
