use super::{timestamp, Message};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

/// Result of reading one input channel of an input device.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InputProbe {
    pub device_type: String,
    pub device_id: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub probe_time: NaiveDateTime,
    pub channel_no: u8,
    pub value: i64,
    #[serde(default)]
    pub voltage: f64,
}

impl InputProbe {
    pub fn new(
        device_type: impl Into<String>,
        device_id: impl Into<String>,
        probe_time: NaiveDateTime,
        channel_no: u8,
        value: i64,
        voltage: f64,
    ) -> Self {
        Self {
            device_type: device_type.into(),
            device_id: device_id.into(),
            probe_time,
            channel_no,
            value,
            voltage,
        }
    }
}

impl Message for InputProbe {
    const CLASS: &'static str = "InputProbe";
    const MANDATORY: &'static [&'static str] =
        &["device_type", "device_id", "probe_time", "channel_no", "value"];

    fn to_record(&self) -> Value {
        json!({
            "class": Self::CLASS,
            "device_type": self.device_type,
            "device_id": self.device_id,
            "probe_time": timestamp::format(&self.probe_time),
            "channel_no": self.channel_no,
            "value": self.value,
            "voltage": self.voltage,
        })
    }

    fn created_at(&self) -> NaiveDateTime {
        self.probe_time
    }
}

/// Health report of an input device.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InputHealth {
    pub device_type: String,
    pub device_id: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub health_time: NaiveDateTime,
    pub health_status: i64,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub last_probe_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub num_probe_total: u64,
    /// Successful probes per input channel.
    #[serde(default)]
    pub num_probe_detail: Vec<u64>,
}

impl InputHealth {
    pub fn new(
        device_type: impl Into<String>,
        device_id: impl Into<String>,
        health_time: NaiveDateTime,
        health_status: i64,
    ) -> Self {
        Self {
            device_type: device_type.into(),
            device_id: device_id.into(),
            health_time,
            health_status,
            last_probe_time: None,
            num_probe_total: 0,
            num_probe_detail: Vec::new(),
        }
    }
}

impl Message for InputHealth {
    const CLASS: &'static str = "InputHealth";
    const MANDATORY: &'static [&'static str] =
        &["device_type", "device_id", "health_time", "health_status"];

    fn to_record(&self) -> Value {
        json!({
            "class": Self::CLASS,
            "device_type": self.device_type,
            "device_id": self.device_id,
            "health_time": timestamp::format(&self.health_time),
            "health_status": self.health_status,
            "last_probe_time": timestamp::option::format(&self.last_probe_time),
            "num_probe_total": self.num_probe_total,
            "num_probe_detail": self.num_probe_detail,
        })
    }

    fn created_at(&self) -> NaiveDateTime {
        self.health_time
    }
}
