// Time source for schedulers, freshness checks and timers
pub mod clock;

// Payload records exchanged over the bus
pub mod message;

// Stale-message policy
pub mod freshness;

// Wall-clock aligned polling and health-check timing
pub mod scheduler;

// Auto-revert timers
pub mod timer;

// Hardware collaborators
pub mod device;

// Command-driven actors and measuring sensors
pub mod actor;
pub mod sensor;

// Per-category handlers and the agent threads driving them
pub mod agent;
pub mod handler;

// Message bus endpoints (in-process and NATS)
pub mod transport;

// Host configuration and wiring
pub mod config;
pub mod factory;
pub mod host;

pub use agent::{Agent, AgentTiming};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use handler::{Handler, MessageOutcome};
pub use message::{Message, MessageError};
