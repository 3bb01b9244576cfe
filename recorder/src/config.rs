use crate::recorder::{DEFAULT_HEALTH_CHECK_INTERVAL, DEFAULT_POLLING_INTERVAL};
use anyhow::{bail, Context, Result};
use iot_agents::config::{AgentConfig, NatsConfig};
use serde::Deserialize;

/// Recorder configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    #[serde(default)]
    pub broker: NatsConfig,
    /// Subjects to record; wildcards allowed
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    /// SQLite database file
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u32,
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval: u32,
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_topics() -> Vec<String> {
    vec![">".to_string()]
}

fn default_database() -> String {
    "iot_recorder.db".to_string()
}

fn default_polling_interval() -> u32 {
    DEFAULT_POLLING_INTERVAL
}

fn default_health_check_interval() -> u32 {
    DEFAULT_HEALTH_CHECK_INTERVAL
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            broker: NatsConfig::default(),
            topics: default_topics(),
            database: default_database(),
            polling_interval: default_polling_interval(),
            health_check_interval: default_health_check_interval(),
            agent: AgentConfig::default(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<RecorderConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: RecorderConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    if config.topics.is_empty() {
        bail!("recorder needs at least one topic");
    }
    Ok(config)
}
