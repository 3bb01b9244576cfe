use super::*;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;

fn at(h: u32, m: u32, s: u32, micro: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_micro_opt(h, m, s, micro)
        .unwrap()
}

#[test]
fn test_timestamp_written_with_fraction() {
    let cmd = ActorCommand::new("btn-1", "Button", at(8, 30, 0, 0), "ON", 0);
    let record = cmd.to_record();
    assert_eq!(record["cmd_time"], "2024-03-01 08:30:00.000000");
    assert_eq!(record["class"], "ActorCommand");
}

#[test]
fn test_timestamp_read_without_fraction() {
    let record = json!({
        "class": "ActorCommand",
        "sender_id": "btn-1",
        "sender_type": "Button",
        "cmd_time": "2024-03-01 08:30:05",
        "cmd_detail": "OFF",
        "cmd_duration": 0
    });
    let cmd = ActorCommand::from_record(&record).unwrap();
    assert_eq!(cmd.cmd_time, at(8, 30, 5, 0));
    assert!(!cmd.is_on());
}

#[test]
fn test_timestamp_read_with_fraction() {
    let record = json!({
        "class": "OutputData",
        "component_id": "relais-1",
        "component_type": "Relais",
        "output_time": "2024-03-01 08:30:05.250000",
        "output_port": "A0",
        "output_data": 1
    });
    let out = OutputData::from_record(&record).unwrap();
    assert_eq!(out.output_time, at(8, 30, 5, 250_000));
    assert_eq!(out.output_duration, None);
}

#[test]
fn test_actor_command_round_trip_keeps_detail() {
    let cmd = ActorCommand::new("btn-1", "Button", at(9, 0, 0, 123_456), "ON", 30);
    let back = ActorCommand::from_record(&cmd.to_record()).unwrap();
    assert_eq!(back, cmd);
    assert!(back.is_on());
}

#[test]
fn test_missing_field_fails_distinctly() {
    let record = json!({
        "class": "ActorCommand",
        "sender_id": "btn-1",
        "sender_type": "Button",
        "cmd_detail": "ON",
        "cmd_duration": 0
    });
    assert_eq!(
        ActorCommand::from_record(&record).unwrap_err(),
        MessageError::MissingField("cmd_time".to_string())
    );
}

#[test]
fn test_wrong_class_fails_distinctly() {
    let probe = InputProbe::new("ADS1115", "ads-1", at(9, 0, 0, 0), 0, 12000, 1.5);
    let err = OutputData::from_record(&probe.to_record()).unwrap_err();
    assert!(matches!(err, MessageError::MissingField(_)));

    let mut record = probe.to_record();
    record["class"] = json!("DigitalInputProbe");
    assert_eq!(
        InputProbe::from_record(&record).unwrap_err(),
        MessageError::ClassMismatch {
            expected: "InputProbe".to_string(),
            found: "DigitalInputProbe".to_string()
        }
    );
}

#[test]
fn test_bad_timestamp_is_invalid_value() {
    let record = json!({
        "class": "InputProbe",
        "device_type": "ADS1115",
        "device_id": "ads-1",
        "probe_time": "yesterday",
        "channel_no": 0,
        "value": 100
    });
    assert!(matches!(
        InputProbe::from_record(&record),
        Err(MessageError::InvalidValue(_))
    ));
}

#[test]
fn test_probe_voltage_is_optional() {
    let record = json!({
        "class": "InputProbe",
        "device_type": "ADS1115",
        "device_id": "ads-1",
        "probe_time": "2024-03-01 09:00:00.000000",
        "channel_no": 2,
        "value": 15000
    });
    let probe = InputProbe::from_record(&record).unwrap();
    assert_eq!(probe.channel_no, 2);
    assert_eq!(probe.voltage, 0.0);
}

#[test]
fn test_health_without_probe_time() {
    let health = InputHealth::new("ADS1115", "ads-1", at(9, 0, 0, 0), 0);
    let record = health.to_record();
    assert!(record["last_probe_time"].is_null());
    let back = InputHealth::from_record(&record).unwrap();
    assert_eq!(back.last_probe_time, None);
}

#[test]
fn test_output_duration_survives_record() {
    let out = OutputData::new("relais-1", "Relais", "A3", at(9, 0, 0, 0), 0).with_duration(45);
    let back = OutputData::from_record(&out.to_record()).unwrap();
    assert_eq!(back.output_duration, Some(45));
    assert_eq!(back.output_port, "A3");
}
