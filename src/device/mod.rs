//! Hardware device interfaces used by the input and output handlers.
//!
//! Physical I2C/GPIO drivers implement these traits outside this crate.
//! The simulated devices let a host run without hardware attached.

use crate::message::{InputHealth, InputProbe};
use anyhow::Result;
use chrono::NaiveDateTime;

mod simulated;

pub use simulated::{ChannelReading, SimulatedInputDevice, SimulatedOutputDevice};

/// Device with input channels that can be probed.
pub trait InputDevice: Send {
    fn device_id(&self) -> &str;
    fn device_type(&self) -> &str;
    fn model(&self) -> &str;

    /// Reads all active channels. An empty result means nothing to report.
    fn probe(&mut self, now: NaiveDateTime) -> Result<Vec<InputProbe>>;

    /// Reports the device's health, if it has anything to report.
    fn check_health(&mut self, now: NaiveDateTime) -> Result<Option<InputHealth>>;
}

/// Device with output ports that can be switched.
pub trait OutputDevice: Send {
    fn device_id(&self) -> &str;
    fn device_type(&self) -> &str;
    fn model(&self) -> &str;

    /// Sets `port` to `state` and returns the state now in effect.
    fn switch_to(&mut self, port: &str, state: i64) -> Result<i64>;

    fn check_health(&mut self, _now: NaiveDateTime) -> Result<Option<InputHealth>> {
        Ok(None)
    }
}
