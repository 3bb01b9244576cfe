use super::*;
use crate::actor::SwitchActor;
use crate::clock::{Clock, ManualClock, SharedClock};
use crate::device::{ChannelReading, InputDevice, OutputDevice, SimulatedInputDevice};
use crate::message::{ActorCommand, InputHealth, InputProbe, OutputData, SensorMeasurement};
use crate::sensor::{calculator_for, Sensor};
use crate::transport::{BusMessage, Consumer, Inbound, MemoryBus, Outbound};
use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn clock_at(at: NaiveDateTime) -> (ManualClock, SharedClock) {
    let clock = ManualClock::new(at);
    let shared: SharedClock = Arc::new(clock.clone());
    (clock, shared)
}

fn message(topic: &str, payload: serde_json::Value, at: NaiveDateTime) -> BusMessage {
    BusMessage {
        msg_id: "test-msg".to_string(),
        topic: topic.to_string(),
        timestamp: at,
        payload,
    }
}

/// Output device that records every switch with the clock time.
struct RecordingOutput {
    clock: ManualClock,
    switches: Arc<Mutex<Vec<(NaiveDateTime, String, i64)>>>,
}

impl OutputDevice for RecordingOutput {
    fn device_id(&self) -> &str {
        "mcp-1"
    }

    fn device_type(&self) -> &str {
        "DigitalOutput"
    }

    fn model(&self) -> &str {
        "MCP23017"
    }

    fn switch_to(&mut self, port: &str, state: i64) -> Result<i64> {
        self.switches
            .lock()
            .unwrap()
            .push((self.clock.now(), port.to_string(), state));
        Ok(state)
    }
}

struct BrokenInput;

impl InputDevice for BrokenInput {
    fn device_id(&self) -> &str {
        "broken-1"
    }

    fn device_type(&self) -> &str {
        "DigitalInput"
    }

    fn model(&self) -> &str {
        "none"
    }

    fn probe(&mut self, _now: NaiveDateTime) -> Result<Vec<InputProbe>> {
        bail!("i2c bus not responding")
    }

    fn check_health(&mut self, _now: NaiveDateTime) -> Result<Option<InputHealth>> {
        bail!("i2c bus not responding")
    }
}

fn output_handler(
    clock: &ManualClock,
    shared: SharedClock,
) -> (OutputDeviceHandler, Arc<Mutex<Vec<(NaiveDateTime, String, i64)>>>, Arc<MemoryBus>) {
    let switches = Arc::new(Mutex::new(Vec::new()));
    let device = RecordingOutput {
        clock: clock.clone(),
        switches: switches.clone(),
    };
    let bus = Arc::new(MemoryBus::new(shared.clone()));
    let input = Inbound::new(Box::new(bus.subscribe(&["iot.out.mcp-1"])), "iot.out.mcp-1");
    let handler = OutputDeviceHandler::new(Box::new(device), 1, 0, shared).with_input(input);
    (handler, switches, bus)
}

#[test]
fn test_input_handler_polls_twice_in_125_seconds() {
    let (clock, shared) = clock_at(start());
    let bus = Arc::new(MemoryBus::new(shared.clone()));
    let mut probes = bus.subscribe(&["iot.data.>"]);
    let device = SimulatedInputDevice::new(
        "ads-1",
        "ADS1115",
        vec![ChannelReading { channel_no: 0, value: 100, voltage: 0.1 }],
    );
    let mut handler = InputDeviceHandler::new(Box::new(device), 60, 0, shared)
        .with_data(Outbound::new(bus.clone(), "iot.data"));

    handler.init_time();
    let mut health_events = 0;
    for _ in 0..125 {
        clock.advance_secs(1);
        if handler.tick().health_check {
            health_events += 1;
        }
    }

    assert_eq!(handler.status().poll_count, 2);
    assert_eq!(health_events, 0);
    assert_eq!(handler.status().health_count, 0);

    let published = probes.receive();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].topic, "iot.data.ads-1.0");
    assert_eq!(published[0].payload["class"], "InputProbe");
}

#[test]
fn test_input_handler_publishes_health_under_device_topic() {
    let (clock, shared) = clock_at(start());
    let bus = Arc::new(MemoryBus::new(shared.clone()));
    let mut health = bus.subscribe(&["iot.health.>"]);
    let device = SimulatedInputDevice::new("ads-1", "ADS1115", vec![]);
    let mut handler = InputDeviceHandler::new(Box::new(device), 60, 300, shared)
        .with_health(Outbound::new(bus.clone(), "iot.health"));

    handler.init_time();
    clock.advance_secs(60);
    let due = handler.tick();
    assert!(due.polling && due.health_check);

    let published = health.receive();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, "iot.health.ads-1");
    let report = InputHealth::from_record(&published[0].payload).unwrap();
    assert_eq!(report.device_id, "ads-1");
}

#[test]
fn test_device_failure_is_contained() {
    let (clock, shared) = clock_at(start());
    let bus = Arc::new(MemoryBus::new(shared.clone()));
    let mut handler = InputDeviceHandler::new(Box::new(BrokenInput), 60, 60, shared)
        .with_data(Outbound::new(bus.clone(), "iot.data"))
        .with_health(Outbound::new(bus.clone(), "iot.health"));

    handler.init_time();
    clock.advance_secs(60);
    handler.tick();
    clock.advance_secs(60);
    handler.tick();

    let status = handler.status();
    assert_eq!(status.poll_count, 2);
    assert_eq!(status.error_count, 4);
    assert!(status.last_error.as_deref().unwrap().contains("i2c"));
    assert!(!handler.scheduler().is_stopped());
}

#[test]
fn test_output_command_at_threshold_is_applied() {
    let (clock, shared) = clock_at(start());
    let (mut handler, switches, _bus) = output_handler(&clock, shared);
    let cmd = OutputData::new("relay-1", "Switch", "A0", start() - Duration::seconds(10), 1);

    let outcome = handler.on_message(&message("iot.out.mcp-1", cmd.to_record(), start()));

    assert_eq!(outcome, MessageOutcome::Applied);
    assert_eq!(switches.lock().unwrap().len(), 1);
}

#[test]
fn test_stale_output_command_is_discarded() {
    let (clock, shared) = clock_at(start());
    let (mut handler, switches, _bus) = output_handler(&clock, shared);
    let cmd = OutputData::new("relay-1", "Switch", "A0", start() - Duration::seconds(15), 1);

    let outcome = handler.on_message(&message("iot.out.mcp-1", cmd.to_record(), start()));

    assert_eq!(outcome, MessageOutcome::Stale);
    assert!(switches.lock().unwrap().is_empty());
    assert_eq!(handler.status().discarded_count, 1);
}

#[test]
fn test_malformed_and_foreign_messages() {
    let (clock, shared) = clock_at(start());
    let (mut handler, switches, _bus) = output_handler(&clock, shared);

    let bad = json!({"class": "OutputData", "output_port": "A0"});
    assert_eq!(
        handler.on_message(&message("iot.out.mcp-1", bad, start())),
        MessageOutcome::Malformed
    );

    let cmd = OutputData::new("relay-1", "Switch", "A0", start(), 1);
    assert_eq!(
        handler.on_message(&message("iot.out.other", cmd.to_record(), start())),
        MessageOutcome::Ignored
    );
    assert!(switches.lock().unwrap().is_empty());
}

#[test]
fn test_output_duration_reverts_port() {
    let (clock, shared) = clock_at(start());
    let (mut handler, switches, bus) = output_handler(&clock, shared);

    handler.init_time();
    clock.advance_secs(60);
    handler.tick();

    let cmd = OutputData::new("relay-1", "Switch", "A0", clock.now(), 1).with_duration(5);
    crate::transport::Producer::publish(bus.as_ref(), "iot.out.mcp-1", &cmd.to_record()).unwrap();

    for _ in 0..8 {
        clock.advance_secs(1);
        handler.tick();
    }

    let switches = switches.lock().unwrap();
    let states: Vec<i64> = switches.iter().map(|(_, _, s)| *s).collect();
    assert_eq!(states, vec![1, 0]);
    assert_eq!(switches[1].0 - switches[0].0, Duration::seconds(5));
    assert_eq!(handler.pending_reverts(), 0);
}

#[test]
fn test_actor_publishes_output_and_revert() {
    let (clock, shared) = clock_at(start());
    let bus = Arc::new(MemoryBus::new(shared.clone()));
    let mut outputs = bus.subscribe(&["iot.out.mcp-1"]);
    let input = Inbound::new(Box::new(bus.subscribe(&["iot.cmd.relay-1"])), "iot.cmd.relay-1");
    let actor = SwitchActor::relais("relay-1", "Switch", "A0");
    let mut handler = ActorHandler::new(Box::new(actor), 0, shared)
        .with_input(input)
        .with_data(Outbound::new(bus.clone(), "iot.out.mcp-1"));
    assert_eq!(handler.scheduler().health_check_interval(), 900);

    let cmd = ActorCommand::new("ctl", "Controller", start(), "ON", 5);
    let outcome = handler.on_message(&message("iot.cmd.relay-1", cmd.to_record(), start()));
    assert_eq!(outcome, MessageOutcome::Applied);

    let on = outputs.receive();
    assert_eq!(on.len(), 1);
    assert_eq!(OutputData::from_record(&on[0].payload).unwrap().output_data, 0);

    handler.init_time();
    clock.advance_secs(60);
    handler.tick();
    let off = outputs.receive();
    assert_eq!(off.len(), 1);
    assert_eq!(OutputData::from_record(&off[0].payload).unwrap().output_data, 1);

    clock.advance_secs(1);
    handler.tick();
    assert!(outputs.receive().is_empty());
}

#[test]
fn test_actor_without_data_endpoint_skips_publishing() {
    let (_clock, shared) = clock_at(start());
    let bus = Arc::new(MemoryBus::new(shared.clone()));
    let input = Inbound::new(Box::new(bus.subscribe(&["iot.cmd.relay-1"])), "iot.cmd.relay-1");
    let actor = SwitchActor::relais("relay-1", "Switch", "A0");
    let mut handler = ActorHandler::new(Box::new(actor), 0, shared).with_input(input);

    let cmd = ActorCommand::new("ctl", "Controller", start(), "ON", 0);
    let outcome = handler.on_message(&message("iot.cmd.relay-1", cmd.to_record(), start()));

    assert_eq!(outcome, MessageOutcome::Applied);
    assert_eq!(handler.status().error_count, 0);
}

#[test]
fn test_actor_stop_clears_timers() {
    let (_clock, shared) = clock_at(start());
    let bus = Arc::new(MemoryBus::new(shared.clone()));
    let input = Inbound::new(Box::new(bus.subscribe(&["iot.cmd.relay-1"])), "iot.cmd.relay-1");
    let actor = SwitchActor::relais("relay-1", "Switch", "A0");
    let mut handler = ActorHandler::new(Box::new(actor), 60, shared).with_input(input);

    let cmd = ActorCommand::new("ctl", "Controller", start(), "ON", 30);
    handler.on_message(&message("iot.cmd.relay-1", cmd.to_record(), start()));

    assert_eq!(handler.actor().timers().len(), 1);

    handler.stop();
    assert!(handler.scheduler().is_stopped());
    assert!(handler.actor().timers().is_empty());
    assert_eq!(handler.tick(), crate::scheduler::DueEvents::default());
}

#[test]
fn test_sensor_freshness_and_topic() {
    let (_clock, shared) = clock_at(start());
    let bus = Arc::new(MemoryBus::new(shared.clone()));
    let mut msmts = bus.subscribe(&["iot.msmt.>"]);
    let input = Inbound::new(Box::new(bus.subscribe(&["iot.data.ads-1.1"])), "iot.data.ads-1.1");
    let sensor = Sensor::new("soil-1", "KYES516", calculator_for("KYES516"));
    let mut handler = SensorHandler::new(sensor, 60, shared)
        .with_input(input)
        .with_data(Outbound::new(bus.clone(), "iot.msmt"));
    assert_eq!(handler.scheduler().health_check_interval(), 300);

    let fresh_at = start() - Duration::seconds(30);
    let stale_at = start() - Duration::milliseconds(30_100);
    let fresh = InputProbe::new("ADS1115", "ads-1", fresh_at, 1, 15000, 1.2);
    let stale = InputProbe::new("ADS1115", "ads-1", stale_at, 1, 15000, 1.2);

    assert_eq!(
        handler.on_message(&message("iot.data.ads-1.1", fresh.to_record(), start())),
        MessageOutcome::Applied
    );
    assert_eq!(
        handler.on_message(&message("iot.data.ads-1.1", stale.to_record(), start())),
        MessageOutcome::Stale
    );

    let published = msmts.receive();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, "iot.msmt.soil-1");
    let msmt = SensorMeasurement::from_record(&published[0].payload).unwrap();
    assert_eq!(msmt.msmt_value, 50.0);
    assert_eq!(msmt.msmt_unit, "pct");
}

#[test]
fn test_sensor_health_interval_is_capped() {
    assert_eq!(sensor_health_interval(5), 150);
    assert_eq!(sensor_health_interval(60), 300);
}

#[test]
fn test_probe_buffered_past_threshold_is_measured() {
    let (clock, shared) = clock_at(start());
    let bus = Arc::new(MemoryBus::new(shared.clone()));
    let mut msmts = bus.subscribe(&["iot.msmt.>"]);
    let input = Inbound::new(Box::new(bus.subscribe(&["iot.data.ads-1.1"])), "iot.data.ads-1.1");
    let sensor = Sensor::new("soil-1", "KYES516", calculator_for("KYES516"));
    let mut handler = SensorHandler::new(sensor, 60, shared)
        .with_input(input)
        .with_data(Outbound::new(bus.clone(), "iot.msmt"));

    let probe = InputProbe::new("ADS1115", "ads-1", start(), 1, 15000, 1.2);
    let received = message("iot.data.ads-1.1", probe.to_record(), start());
    clock.advance_secs(40);

    assert_eq!(handler.on_message(&received), MessageOutcome::Applied);
    let published = msmts.receive();
    assert_eq!(published.len(), 1);
    let msmt = SensorMeasurement::from_record(&published[0].payload).unwrap();
    assert_eq!(msmt.msmt_time, start() + Duration::seconds(40));
}

#[test]
fn test_command_aged_on_receipt_is_stale() {
    let (clock, shared) = clock_at(start());
    let (mut handler, switches, _bus) = output_handler(&clock, shared);
    let cmd = OutputData::new("relay-1", "Switch", "A0", start(), 1);

    let late = message("iot.out.mcp-1", cmd.to_record(), start() + Duration::seconds(11));
    assert_eq!(handler.on_message(&late), MessageOutcome::Stale);
    assert!(switches.lock().unwrap().is_empty());
}

#[test]
fn test_command_waiting_for_first_slot_is_applied() {
    let (clock, shared) = clock_at(start() + Duration::seconds(1));
    let (mut handler, switches, bus) = output_handler(&clock, shared);
    handler.init_time();

    let cmd = OutputData::new("relay-1", "Switch", "A0", clock.now(), 1);
    crate::transport::Producer::publish(bus.as_ref(), "iot.out.mcp-1", &cmd.to_record()).unwrap();

    let mut first_poll = None;
    for _ in 0..60 {
        clock.advance_secs(1);
        if handler.tick().polling && first_poll.is_none() {
            first_poll = Some(clock.now());
        }
    }

    assert_eq!(first_poll, Some(start() + Duration::seconds(60)));
    assert_eq!(handler.status().applied_count, 1);
    assert_eq!(handler.status().discarded_count, 0);
    assert_eq!(switches.lock().unwrap().len(), 1);
}
