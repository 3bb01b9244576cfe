//! Sensors convert raw hardware probes into measurements.

use crate::message::{InputProbe, SensorMeasurement};
use chrono::NaiveDateTime;
use tracing::debug;

/// Sensor-specific calculation of a measurement value from a raw probe.
pub trait MeasurementCalculator: Send {
    /// Unit of the calculated value (e.g. `pct`).
    fn unit(&self) -> &str;

    fn calculate(&self, hw_value: i64, hw_voltage: f64) -> f64;
}

/// Reports the raw hardware value unchanged.
#[derive(Clone, Debug, Default)]
pub struct Passthrough;

impl MeasurementCalculator for Passthrough {
    fn unit(&self) -> &str {
        "raw"
    }

    fn calculate(&self, hw_value: i64, _hw_voltage: f64) -> f64 {
        hw_value as f64
    }
}

/// KY-ES-516 soil humidity sensor read through an ADC.
#[derive(Clone, Debug, Default)]
pub struct HumidityKyes516;

impl HumidityKyes516 {
    const DRY_READING: f64 = 30000.0;
}

impl MeasurementCalculator for HumidityKyes516 {
    fn unit(&self) -> &str {
        "pct"
    }

    fn calculate(&self, hw_value: i64, _hw_voltage: f64) -> f64 {
        100.0 * (Self::DRY_READING - hw_value as f64) / Self::DRY_READING
    }
}

/// Returns the calculator for a configured sensor type.
pub fn calculator_for(sensor_type: &str) -> Box<dyn MeasurementCalculator> {
    match sensor_type {
        "KYES516" => Box::new(HumidityKyes516),
        _ => Box::new(Passthrough),
    }
}

/// A sensor fed by input probes.
pub struct Sensor {
    sensor_id: String,
    sensor_type: String,
    calculator: Box<dyn MeasurementCalculator>,
    last_measurement: Option<SensorMeasurement>,
}

impl Sensor {
    pub fn new(
        sensor_id: impl Into<String>,
        sensor_type: impl Into<String>,
        calculator: Box<dyn MeasurementCalculator>,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            sensor_type: sensor_type.into(),
            calculator,
            last_measurement: None,
        }
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    pub fn last_measurement(&self) -> Option<&SensorMeasurement> {
        self.last_measurement.as_ref()
    }

    /// Calculates a measurement from `probe`, stamped `now`.
    pub fn measure(&mut self, probe: &InputProbe, now: NaiveDateTime) -> SensorMeasurement {
        let msmt = SensorMeasurement {
            sensor_id: self.sensor_id.clone(),
            sensor_type: self.sensor_type.clone(),
            msmt_time: now,
            hw_value: probe.value,
            hw_voltage: probe.voltage,
            msmt_unit: self.calculator.unit().to_string(),
            msmt_value: self.calculator.calculate(probe.value, probe.voltage),
        };
        debug!(
            sensor_id = %self.sensor_id,
            hw_value = probe.value,
            msmt_value = msmt.msmt_value,
            unit = %msmt.msmt_unit,
            "Measured"
        );
        self.last_measurement = Some(msmt.clone());
        msmt
    }
}
