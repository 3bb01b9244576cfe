use serde_json::{Map, Value};
use std::fmt;

/// Decoding errors for payload records. All variants mean "bad format".
#[derive(Debug, Clone, PartialEq)]
pub enum MessageError {
    NotARecord,
    MissingField(String),
    ClassMismatch { expected: String, found: String },
    InvalidValue(String),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::NotARecord => write!(f, "payload must be a JSON object"),
            MessageError::MissingField(name) => {
                write!(f, "missing mandatory element '{}'", name)
            }
            MessageError::ClassMismatch { expected, found } => {
                write!(f, "invalid record class '{}', expected '{}'", found, expected)
            }
            MessageError::InvalidValue(reason) => write!(f, "invalid field value: {}", reason),
        }
    }
}

impl std::error::Error for MessageError {}

/// Checks that `record` is an object holding `class` and every mandatory
/// field, and that its `class` equals `class`.
pub fn check_record<'a>(
    record: &'a Value,
    class: &str,
    mandatory: &[&str],
) -> Result<&'a Map<String, Value>, MessageError> {
    let map = record.as_object().ok_or(MessageError::NotARecord)?;

    for field in std::iter::once(&"class").chain(mandatory.iter()) {
        if !map.contains_key(*field) {
            return Err(MessageError::MissingField(field.to_string()));
        }
    }

    let found = match map.get("class") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    if found != class {
        return Err(MessageError::ClassMismatch {
            expected: class.to_string(),
            found,
        });
    }

    Ok(map)
}

/// Returns the `class` discriminator of a payload record, if it has one.
pub fn message_class(record: &Value) -> Option<&str> {
    record.get("class").and_then(Value::as_str)
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_class_is_missing_field() {
        let err = check_record(&json!({"a": 1}), "X", &["a"]).unwrap_err();
        assert_eq!(err, MessageError::MissingField("class".to_string()));
    }

    #[test]
    fn test_missing_field_reported_before_class_mismatch() {
        let err = check_record(&json!({"class": "Y"}), "X", &["a"]).unwrap_err();
        assert_eq!(err, MessageError::MissingField("a".to_string()));
    }

    #[test]
    fn test_class_mismatch() {
        let err = check_record(&json!({"class": "Y", "a": 1}), "X", &["a"]).unwrap_err();
        assert_eq!(
            err,
            MessageError::ClassMismatch {
                expected: "X".to_string(),
                found: "Y".to_string()
            }
        );
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(
            check_record(&json!(["class"]), "X", &[]).unwrap_err(),
            MessageError::NotARecord
        );
    }

    #[test]
    fn test_message_class() {
        assert_eq!(message_class(&json!({"class": "InputProbe"})), Some("InputProbe"));
        assert_eq!(message_class(&json!({"value": 1})), None);
        assert_eq!(message_class(&json!("text")), None);
    }
}
