use anyhow::{Context, Result};
use iot_agents::clock::system_clock;
use iot_agents::config::load_config;
use iot_agents::factory::HandlerFactory;
use iot_agents::host::Host;
use iot_agents::transport::NatsConnection;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iot_agents=info".into()),
        )
        .init();

    info!("IoT host starting...");

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("IOT_CONFIG").ok())
        .unwrap_or_else(|| "iot-host.toml".to_string());
    let config = load_config(&config_path)?;

    info!(
        config = %config_path,
        input_devices = config.input_devices.len(),
        output_devices = config.output_devices.len(),
        actors = config.actors.len(),
        sensors = config.sensors.len(),
        "Configuration loaded"
    );

    let clock = system_clock();
    let mut factory = HandlerFactory::new(clock.clone());
    for broker in config.broker_configs() {
        let connection = NatsConnection::connect(&broker, clock.clone()).await?;
        factory.add_broker(broker.broker_id.clone(), Arc::new(connection));
        info!(broker_id = %broker.broker_id, "Broker connected");
    }

    let handlers = factory.build_all(&config)?;
    let mut host = Host::new(handlers, config.agent.timing());
    host.start_all()?;

    info!(agents = host.agents().len(), "IoT host running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");

    // Agent shutdown blocks on thread joins
    let report = tokio::task::spawn_blocking(move || host.stop_all())
        .await
        .context("Shutdown task failed")?;

    if !report.all_stopped() {
        warn!(failed = ?report.failed, "Some agents did not stop");
    }

    info!("IoT host stopped");
    Ok(())
}
