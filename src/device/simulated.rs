use super::{InputDevice, OutputDevice};
use crate::message::{InputHealth, InputProbe};
use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Fixed reading reported by one channel of a simulated input device.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChannelReading {
    pub channel_no: u8,
    pub value: i64,
    #[serde(default)]
    pub voltage: f64,
}

/// Input device that reports configured readings and counts its probes.
pub struct SimulatedInputDevice {
    device_id: String,
    model: String,
    channels: Vec<ChannelReading>,
    last_probe_time: Option<NaiveDateTime>,
    num_probes: u64,
    num_probe_detail: Vec<u64>,
}

impl SimulatedInputDevice {
    pub fn new(
        device_id: impl Into<String>,
        model: impl Into<String>,
        channels: Vec<ChannelReading>,
    ) -> Self {
        let width = channels
            .iter()
            .map(|c| usize::from(c.channel_no) + 1)
            .max()
            .unwrap_or(0);
        Self {
            device_id: device_id.into(),
            model: model.into(),
            channels,
            last_probe_time: None,
            num_probes: 0,
            num_probe_detail: vec![0; width],
        }
    }

    /// Replaces the reading of one channel.
    pub fn set_reading(&mut self, channel_no: u8, value: i64, voltage: f64) {
        if let Some(channel) = self.channels.iter_mut().find(|c| c.channel_no == channel_no) {
            channel.value = value;
            channel.voltage = voltage;
        }
    }

    pub fn num_probes(&self) -> u64 {
        self.num_probes
    }
}

impl InputDevice for SimulatedInputDevice {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn device_type(&self) -> &str {
        "DigitalInput"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn probe(&mut self, now: NaiveDateTime) -> Result<Vec<InputProbe>> {
        let probes: Vec<InputProbe> = self
            .channels
            .iter()
            .map(|c| {
                InputProbe::new(
                    &self.model,
                    &self.device_id,
                    now,
                    c.channel_no,
                    c.value,
                    c.voltage,
                )
            })
            .collect();

        for channel in &self.channels {
            self.num_probe_detail[usize::from(channel.channel_no)] += 1;
        }
        self.num_probes += 1;
        self.last_probe_time = Some(now);

        debug!(device_id = %self.device_id, channels = probes.len(), "Probed simulated device");
        Ok(probes)
    }

    fn check_health(&mut self, now: NaiveDateTime) -> Result<Option<InputHealth>> {
        let mut health = InputHealth::new(&self.model, &self.device_id, now, 0);
        health.last_probe_time = self.last_probe_time;
        health.num_probe_total = self.num_probes;
        health.num_probe_detail = self.num_probe_detail.clone();
        Ok(Some(health))
    }
}

/// Output device that keeps its port states in memory.
pub struct SimulatedOutputDevice {
    device_id: String,
    model: String,
    ports: BTreeMap<String, i64>,
}

impl SimulatedOutputDevice {
    /// Creates the device with every port set to `init_state`.
    pub fn new(
        device_id: impl Into<String>,
        model: impl Into<String>,
        ports: impl IntoIterator<Item = String>,
        init_state: i64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            model: model.into(),
            ports: ports.into_iter().map(|p| (p, init_state)).collect(),
        }
    }

    pub fn port_state(&self, port: &str) -> Option<i64> {
        self.ports.get(port).copied()
    }
}

impl OutputDevice for SimulatedOutputDevice {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn device_type(&self) -> &str {
        "DigitalOutput"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn switch_to(&mut self, port: &str, state: i64) -> Result<i64> {
        match self.ports.get_mut(port) {
            Some(current) => {
                *current = state;
                debug!(device_id = %self.device_id, port = %port, state, "Switched simulated port");
                Ok(state)
            }
            None => bail!("device '{}' has no output port '{}'", self.device_id, port),
        }
    }
}
