use super::{timestamp, Message};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

/// Measurement calculated by a sensor from a hardware probe.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SensorMeasurement {
    pub sensor_id: String,
    pub sensor_type: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub msmt_time: NaiveDateTime,
    pub hw_value: i64,
    pub hw_voltage: f64,
    pub msmt_unit: String,
    pub msmt_value: f64,
}

impl Message for SensorMeasurement {
    const CLASS: &'static str = "SensorMeasurement";
    const MANDATORY: &'static [&'static str] = &[
        "sensor_id",
        "sensor_type",
        "msmt_time",
        "hw_value",
        "hw_voltage",
        "msmt_unit",
        "msmt_value",
    ];

    fn to_record(&self) -> Value {
        json!({
            "class": Self::CLASS,
            "sensor_id": self.sensor_id,
            "sensor_type": self.sensor_type,
            "msmt_time": timestamp::format(&self.msmt_time),
            "hw_value": self.hw_value,
            "hw_voltage": self.hw_voltage,
            "msmt_unit": self.msmt_unit,
            "msmt_value": self.msmt_value,
        })
    }

    fn created_at(&self) -> NaiveDateTime {
        self.msmt_time
    }
}
