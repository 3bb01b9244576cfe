//! IoT message types and their flat key/value payload records.
//!
//! Every message round-trips through a JSON object carrying a `class`
//! discriminator. Decoding checks the mandatory fields first, then the
//! discriminator, then the field values.

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde_json::Value;

mod actor;
mod input;
mod output;
mod sensor;
pub mod timestamp;
mod validation;
#[cfg(test)]
mod tests;

pub use actor::ActorCommand;
pub use input::{InputHealth, InputProbe};
pub use output::OutputData;
pub use sensor::SensorMeasurement;
pub use validation::{check_record, message_class, MessageError};

/// A message that can be carried as a payload record on the bus.
pub trait Message: Sized + DeserializeOwned {
    /// Value of the `class` discriminator.
    const CLASS: &'static str;

    /// Fields that must be present (besides `class`) for decoding to proceed.
    const MANDATORY: &'static [&'static str];

    /// Converts the message into its payload record, including `class`.
    fn to_record(&self) -> Value;

    /// Creation time of the message as stated by its sender.
    fn created_at(&self) -> NaiveDateTime;

    /// Decodes a payload record.
    fn from_record(record: &Value) -> Result<Self, MessageError> {
        check_record(record, Self::CLASS, Self::MANDATORY)?;
        serde_json::from_value(record.clone())
            .map_err(|e| MessageError::InvalidValue(format!("{}: {}", Self::CLASS, e)))
    }
}
