use super::{timestamp, Message};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

/// Instruction for an output device to set one of its ports.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct OutputData {
    pub component_id: String,
    pub component_type: String,
    pub output_port: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub output_time: NaiveDateTime,
    /// State value to write to the port.
    pub output_data: i64,
    /// Seconds after which the device flips the port back on its own.
    #[serde(default)]
    pub output_duration: Option<u32>,
}

impl OutputData {
    pub fn new(
        component_id: impl Into<String>,
        component_type: impl Into<String>,
        output_port: impl Into<String>,
        output_time: NaiveDateTime,
        output_data: i64,
    ) -> Self {
        Self {
            component_id: component_id.into(),
            component_type: component_type.into(),
            output_port: output_port.into(),
            output_time,
            output_data,
            output_duration: None,
        }
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.output_duration = Some(secs);
        self
    }
}

impl Message for OutputData {
    const CLASS: &'static str = "OutputData";
    const MANDATORY: &'static [&'static str] = &[
        "component_type",
        "component_id",
        "output_time",
        "output_port",
        "output_data",
    ];

    fn to_record(&self) -> Value {
        json!({
            "class": Self::CLASS,
            "component_type": self.component_type,
            "component_id": self.component_id,
            "output_time": timestamp::format(&self.output_time),
            "output_port": self.output_port,
            "output_data": self.output_data,
            "output_duration": self.output_duration,
        })
    }

    fn created_at(&self) -> NaiveDateTime {
        self.output_time
    }
}
