//! Builds handlers from configuration.
//!
//! Endpoints are resolved per broker id. Every handler publishing to the
//! same broker shares one producer; each inbound endpoint gets its own
//! consumer.

use crate::actor::SwitchActor;
use crate::clock::SharedClock;
use crate::config::{
    ActorConfig, ActorKind, InputDeviceConfig, IotConfig, OutputDeviceConfig, SensorConfig,
    TopicRef,
};
use crate::device::{SimulatedInputDevice, SimulatedOutputDevice};
use crate::handler::{ActorHandler, Handler, InputDeviceHandler, OutputDeviceHandler, SensorHandler};
use crate::sensor::{calculator_for, Sensor};
use crate::transport::{Broker, Inbound, Outbound, SharedProducer};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct HandlerFactory {
    brokers: HashMap<String, Arc<dyn Broker>>,
    producers: HashMap<String, SharedProducer>,
    clock: SharedClock,
}

impl HandlerFactory {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            brokers: HashMap::new(),
            producers: HashMap::new(),
            clock,
        }
    }

    /// Registers the session for `broker_id`.
    pub fn add_broker(&mut self, broker_id: impl Into<String>, broker: Arc<dyn Broker>) {
        self.brokers.insert(broker_id.into(), broker);
    }

    pub fn with_broker(mut self, broker_id: impl Into<String>, broker: Arc<dyn Broker>) -> Self {
        self.add_broker(broker_id, broker);
        self
    }

    /// Number of distinct producers handed out so far.
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    fn broker(&self, broker_id: &str) -> Result<&Arc<dyn Broker>> {
        self.brokers
            .get(broker_id)
            .ok_or_else(|| anyhow!("no session for broker '{}'", broker_id))
    }

    fn outbound(&mut self, topic: Option<&TopicRef>) -> Result<Option<Outbound>> {
        let Some(topic) = topic else {
            return Ok(None);
        };
        let producer = match self.producers.get(&topic.broker) {
            Some(producer) => producer.clone(),
            None => {
                let producer = self.broker(&topic.broker)?.producer();
                debug!(broker_id = %topic.broker, "Created producer");
                self.producers.insert(topic.broker.clone(), producer.clone());
                producer
            }
        };
        Ok(Some(Outbound::new(producer, &topic.topic)))
    }

    fn inbound(&self, topic: Option<&TopicRef>) -> Result<Option<Inbound>> {
        let Some(topic) = topic else {
            return Ok(None);
        };
        let consumer = self.broker(&topic.broker)?.consumer(&[topic.topic.clone()]);
        Ok(Some(Inbound::new(consumer, &topic.topic)))
    }

    pub fn input_device_handler(
        &mut self,
        config: &InputDeviceConfig,
    ) -> Result<InputDeviceHandler> {
        let device = SimulatedInputDevice::new(
            &config.device_id,
            &config.model,
            config.channels.clone(),
        );
        let mut handler = InputDeviceHandler::new(
            Box::new(device),
            config.polling_interval,
            config.health_check_interval,
            self.clock.clone(),
        );
        if let Some(data) = self.outbound(config.data_topic.as_ref())? {
            handler = handler.with_data(data);
        }
        if let Some(health) = self.outbound(config.health_topic.as_ref())? {
            handler = handler.with_health(health);
        }
        Ok(handler)
    }

    pub fn output_device_handler(
        &mut self,
        config: &OutputDeviceConfig,
    ) -> Result<OutputDeviceHandler> {
        let device = SimulatedOutputDevice::new(
            &config.device_id,
            &config.model,
            config.ports.iter().cloned(),
            config.init_state,
        );
        let mut handler = OutputDeviceHandler::new(
            Box::new(device),
            config.polling_interval,
            config.health_check_interval,
            self.clock.clone(),
        );
        if let Some(input) = self.inbound(config.input_topic.as_ref())? {
            handler = handler.with_input(input);
        }
        if let Some(health) = self.outbound(config.health_topic.as_ref())? {
            handler = handler.with_health(health);
        }
        Ok(handler)
    }

    pub fn actor_handler(&mut self, config: &ActorConfig) -> Result<ActorHandler> {
        let actor = match (config.kind, config.states) {
            (ActorKind::Relais, _) => {
                SwitchActor::relais(&config.actor_id, &config.actor_type, &config.port)
            }
            (ActorKind::Switch, Some(states)) => {
                SwitchActor::new(&config.actor_id, &config.actor_type, &config.port, states)
            }
            (ActorKind::Switch, None) => {
                return Err(anyhow!("switch actor '{}' needs 'states'", config.actor_id))
            }
        };
        let mut handler = ActorHandler::new(
            Box::new(actor),
            config.health_check_interval,
            self.clock.clone(),
        );
        if let Some(input) = self.inbound(config.input_topic.as_ref())? {
            handler = handler.with_input(input);
        }
        if let Some(data) = self.outbound(config.data_topic.as_ref())? {
            handler = handler.with_data(data);
        }
        Ok(handler)
    }

    pub fn sensor_handler(&mut self, config: &SensorConfig) -> Result<SensorHandler> {
        let sensor = Sensor::new(
            &config.sensor_id,
            &config.sensor_type,
            calculator_for(&config.sensor_type),
        );
        let mut handler = SensorHandler::new(sensor, config.polling_interval, self.clock.clone());
        if let Some(input) = self.inbound(config.input_topic.as_ref())? {
            handler = handler.with_input(input);
        }
        if let Some(data) = self.outbound(config.data_topic.as_ref())? {
            handler = handler.with_data(data);
        }
        Ok(handler)
    }

    /// Builds every configured handler: input devices, output devices,
    /// actors, then sensors.
    pub fn build_all(&mut self, config: &IotConfig) -> Result<Vec<Box<dyn Handler>>> {
        let mut handlers: Vec<Box<dyn Handler>> = Vec::new();

        for device in &config.input_devices {
            handlers.push(Box::new(self.input_device_handler(device)?));
        }
        for device in &config.output_devices {
            handlers.push(Box::new(self.output_device_handler(device)?));
        }
        for actor in &config.actors {
            handlers.push(Box::new(self.actor_handler(actor)?));
        }
        for sensor in &config.sensors {
            handlers.push(Box::new(self.sensor_handler(sensor)?));
        }

        info!(
            handlers = handlers.len(),
            producers = self.producers.len(),
            "Handlers built"
        );
        Ok(handlers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_clock;
    use crate::transport::MemoryBus;

    fn config() -> IotConfig {
        toml::from_str(
            r#"
            [[input_devices]]
            device_id = "ads-1"
            data_topic = { topic = "iot.data" }
            health_topic = { topic = "iot.health" }

            [[output_devices]]
            device_id = "mcp-1"
            ports = ["A0"]
            input_topic = { topic = "iot.out.mcp-1" }

            [[actors]]
            actor_id = "pump"
            port = "A0"
            input_topic = { topic = "iot.cmd.pump" }
            data_topic = { topic = "iot.out.mcp-1" }

            [[sensors]]
            sensor_id = "soil-1"
            sensor_type = "KYES516"
            polling_interval = 5
        "#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_all_shares_one_producer_per_broker() {
        let bus = MemoryBus::new(system_clock());
        let mut factory =
            HandlerFactory::new(system_clock()).with_broker("default", Arc::new(bus.clone()));

        let handlers = factory.build_all(&config()).unwrap();

        let ids: Vec<&str> = handlers.iter().map(|h| h.handler_id()).collect();
        assert_eq!(ids, vec!["ads-1", "mcp-1", "pump", "soil-1"]);
        assert_eq!(factory.producer_count(), 1);
        // output device and actor each subscribe once
        assert_eq!(bus.subscriber_count(), 2);
        assert_eq!(handlers[3].scheduler().health_check_interval(), 150);
        assert_eq!(handlers[2].scheduler().polling_interval(), 1);
    }

    #[test]
    fn test_missing_broker_session_fails() {
        let mut factory = HandlerFactory::new(system_clock());
        assert!(factory.build_all(&config()).is_err());
    }
}
