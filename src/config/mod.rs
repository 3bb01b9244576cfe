use crate::actor::SwitchStates;
use crate::agent::AgentTiming;
use crate::device::ChannelReading;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

// Re-export existing config types
pub use crate::transport::NatsConfig;

/// Complete host configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IotConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub brokers: Vec<NatsConfig>,
    #[serde(default)]
    pub input_devices: Vec<InputDeviceConfig>,
    #[serde(default)]
    pub output_devices: Vec<OutputDeviceConfig>,
    #[serde(default)]
    pub actors: Vec<ActorConfig>,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

/// Agent loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// How long each loop iteration waits for cancellation (milliseconds)
    #[serde(default = "default_cancel_poll_ms")]
    pub cancel_poll_ms: u64,
    /// Sleep before each tick (milliseconds)
    #[serde(default = "default_tick_sleep_ms")]
    pub tick_sleep_ms: u64,
    /// Grace period for stopping an agent (seconds)
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
}

fn default_cancel_poll_ms() -> u64 {
    100
}

fn default_tick_sleep_ms() -> u64 {
    900
}

fn default_stop_grace_secs() -> u64 {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cancel_poll_ms: default_cancel_poll_ms(),
            tick_sleep_ms: default_tick_sleep_ms(),
            stop_grace_secs: default_stop_grace_secs(),
        }
    }
}

impl AgentConfig {
    pub fn timing(&self) -> AgentTiming {
        AgentTiming {
            cancel_poll: Duration::from_millis(self.cancel_poll_ms),
            tick_sleep: Duration::from_millis(self.tick_sleep_ms),
            stop_grace: Duration::from_secs(self.stop_grace_secs),
        }
    }
}

/// Topic on a configured broker
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicRef {
    #[serde(default = "default_broker")]
    pub broker: String,
    pub topic: String,
}

fn default_broker() -> String {
    "default".to_string()
}

/// Simulated input device publishing probes
#[derive(Debug, Clone, Deserialize)]
pub struct InputDeviceConfig {
    pub device_id: String,
    #[serde(default = "default_input_model")]
    pub model: String,
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u32,
    #[serde(default)]
    pub health_check_interval: u32,
    #[serde(default)]
    pub channels: Vec<ChannelReading>,
    pub data_topic: Option<TopicRef>,
    pub health_topic: Option<TopicRef>,
}

fn default_input_model() -> String {
    "SIMULATED_INPUT".to_string()
}

fn default_polling_interval() -> u32 {
    60
}

/// Simulated output device switched by output commands
#[derive(Debug, Clone, Deserialize)]
pub struct OutputDeviceConfig {
    pub device_id: String,
    #[serde(default = "default_output_model")]
    pub model: String,
    pub ports: Vec<String>,
    #[serde(default)]
    pub init_state: i64,
    #[serde(default = "default_output_polling_interval")]
    pub polling_interval: u32,
    #[serde(default)]
    pub health_check_interval: u32,
    pub input_topic: Option<TopicRef>,
    pub health_topic: Option<TopicRef>,
}

fn default_output_model() -> String {
    "SIMULATED_OUTPUT".to_string()
}

fn default_output_polling_interval() -> u32 {
    1
}

/// Actor preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// Relay board, ON = 0, OFF = 1
    #[default]
    Relais,
    /// Switch with explicit `states`
    Switch,
}

/// Switch actor turning commands into output data
#[derive(Debug, Clone, Deserialize)]
pub struct ActorConfig {
    pub actor_id: String,
    #[serde(default = "default_actor_type")]
    pub actor_type: String,
    #[serde(default)]
    pub kind: ActorKind,
    /// Output device port the actor drives
    pub port: String,
    /// Required for `kind = "switch"`
    pub states: Option<SwitchStates>,
    /// 0 selects the actor default
    #[serde(default)]
    pub health_check_interval: u32,
    pub input_topic: Option<TopicRef>,
    pub data_topic: Option<TopicRef>,
}

fn default_actor_type() -> String {
    "Switch".to_string()
}

/// Sensor measuring input probes
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    pub sensor_id: String,
    pub sensor_type: String,
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u32,
    pub input_topic: Option<TopicRef>,
    pub data_topic: Option<TopicRef>,
}

impl IotConfig {
    /// Configured brokers, or the default broker if none is configured.
    pub fn broker_configs(&self) -> Vec<NatsConfig> {
        if self.brokers.is_empty() {
            vec![NatsConfig::default()]
        } else {
            self.brokers.clone()
        }
    }

    fn topic_refs(&self) -> impl Iterator<Item = &TopicRef> {
        let inputs = self
            .input_devices
            .iter()
            .flat_map(|d| [d.data_topic.as_ref(), d.health_topic.as_ref()]);
        let outputs = self
            .output_devices
            .iter()
            .flat_map(|d| [d.input_topic.as_ref(), d.health_topic.as_ref()]);
        let actors = self
            .actors
            .iter()
            .flat_map(|a| [a.input_topic.as_ref(), a.data_topic.as_ref()]);
        let sensors = self
            .sensors
            .iter()
            .flat_map(|s| [s.input_topic.as_ref(), s.data_topic.as_ref()]);
        inputs.chain(outputs).chain(actors).chain(sensors).flatten()
    }

    /// Checks element ids for uniqueness and topic references against the
    /// configured brokers.
    pub fn validate(&self) -> Result<()> {
        let brokers: HashSet<String> = self
            .broker_configs()
            .into_iter()
            .map(|b| b.broker_id)
            .collect();
        for topic in self.topic_refs() {
            if !brokers.contains(&topic.broker) {
                bail!("topic '{}' refers to unknown broker '{}'", topic.topic, topic.broker);
            }
        }

        let mut ids = HashSet::new();
        let all_ids = self
            .input_devices
            .iter()
            .map(|d| &d.device_id)
            .chain(self.output_devices.iter().map(|d| &d.device_id))
            .chain(self.actors.iter().map(|a| &a.actor_id))
            .chain(self.sensors.iter().map(|s| &s.sensor_id));
        for id in all_ids {
            if !ids.insert(id) {
                bail!("duplicate element id '{}'", id);
            }
        }

        for actor in &self.actors {
            if actor.kind == ActorKind::Switch && actor.states.is_none() {
                bail!("switch actor '{}' needs 'states'", actor.actor_id);
            }
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<IotConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: IotConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [agent]
        stop_grace_secs = 5

        [[brokers]]
        broker_id = "local"
        url = "nats://localhost:4222"

        [[input_devices]]
        device_id = "ads-1"
        model = "ADS1115"
        polling_interval = 30
        health_check_interval = 600
        channels = [{ channel_no = 1, value = 15000, voltage = 1.9 }]
        data_topic = { broker = "local", topic = "iot.data" }
        health_topic = { broker = "local", topic = "iot.health" }

        [[output_devices]]
        device_id = "mcp-1"
        ports = ["A0", "A1"]
        init_state = 1
        input_topic = { broker = "local", topic = "iot.out.mcp-1" }

        [[actors]]
        actor_id = "pump"
        port = "A0"
        input_topic = { broker = "local", topic = "iot.cmd.pump" }
        data_topic = { broker = "local", topic = "iot.out.mcp-1" }

        [[sensors]]
        sensor_id = "soil-1"
        sensor_type = "KYES516"
        input_topic = { broker = "local", topic = "iot.data.ads-1.1" }
        data_topic = { broker = "local", topic = "iot.msmt" }
    "#;

    #[test]
    fn test_default_config() {
        let config = IotConfig::default();
        assert_eq!(config.agent.cancel_poll_ms, 100);
        assert_eq!(config.agent.tick_sleep_ms, 900);
        assert_eq!(config.agent.stop_grace_secs, 3);
        assert_eq!(config.broker_configs().len(), 1);
        assert_eq!(config.broker_configs()[0].broker_id, "default");
        assert_eq!(config.agent.timing(), AgentTiming::default());
    }

    #[test]
    fn test_config_deserialization() {
        let config: IotConfig = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.agent.stop_grace_secs, 5);
        assert_eq!(config.agent.tick_sleep_ms, 900);
        assert_eq!(config.brokers[0].broker_id, "local");

        let input = &config.input_devices[0];
        assert_eq!(input.polling_interval, 30);
        assert_eq!(input.channels[0].value, 15000);
        assert_eq!(input.data_topic.as_ref().unwrap().topic, "iot.data");

        let output = &config.output_devices[0];
        assert_eq!(output.polling_interval, 1);
        assert_eq!(output.init_state, 1);
        assert!(output.health_topic.is_none());

        let actor = &config.actors[0];
        assert_eq!(actor.kind, ActorKind::Relais);
        assert_eq!(actor.actor_type, "Switch");
        assert_eq!(config.sensors[0].polling_interval, 60);
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [[sensors]]
            sensor_id = "raw-1"
            sensor_type = "Generic"
            data_topic = { topic = "iot.msmt" }
        "#;

        let config: IotConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.agent.cancel_poll_ms, 100); // Default
        assert_eq!(config.sensors[0].data_topic.as_ref().unwrap().broker, "default");
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_broker_is_rejected() {
        let toml = r#"
            [[sensors]]
            sensor_id = "raw-1"
            sensor_type = "Generic"
            data_topic = { broker = "remote", topic = "iot.msmt" }
        "#;
        let config: IotConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("remote"));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let toml = r#"
            [[sensors]]
            sensor_id = "x"
            sensor_type = "Generic"

            [[actors]]
            actor_id = "x"
            port = "A0"
        "#;
        let config: IotConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_switch_actor_needs_states() {
        let toml = r#"
            [[actors]]
            actor_id = "valve"
            kind = "switch"
            port = "A1"
        "#;
        let config: IotConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.actors[0].actor_id, "pump");
        assert!(load_config("/nonexistent/iot.toml").is_err());
    }
}
