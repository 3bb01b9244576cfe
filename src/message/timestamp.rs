//! Payload timestamp format: `YYYY-MM-DD HH:MM:SS[.ffffff]`.
//!
//! Fractional seconds are optional when reading and always written.

use chrono::{NaiveDateTime, ParseError};
use serde::{Deserialize, Deserializer};

const WITH_FRACTION: &str = "%Y-%m-%d %H:%M:%S%.6f";
const WITHOUT_FRACTION: &str = "%Y-%m-%d %H:%M:%S";

pub fn format(ts: &NaiveDateTime) -> String {
    ts.format(WITH_FRACTION).to_string()
}

pub fn parse(s: &str) -> Result<NaiveDateTime, ParseError> {
    if s.contains('.') {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
    } else {
        NaiveDateTime::parse_from_str(s, WITHOUT_FRACTION)
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{}': {}", s, e)))
}

/// Same format for optional timestamps; `null` maps to `None`.
pub mod option {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => super::parse(&s).map(Some).map_err(|e| {
                serde::de::Error::custom(format!("invalid timestamp '{}': {}", s, e))
            }),
            None => Ok(None),
        }
    }

    pub fn format(ts: &Option<NaiveDateTime>) -> Option<String> {
        ts.as_ref().map(super::format)
    }
}
