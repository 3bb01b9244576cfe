use anyhow::{Context, Result};
use iot_agents::agent::Agent;
use iot_agents::clock::system_clock;
use iot_agents::transport::NatsConnection;
use recorder::config::{load_config, RecorderConfig};
use recorder::{MessageRecorder, SqliteRecordStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recorder=info,iot_agents=info".into()),
        )
        .init();

    info!("IoT recorder starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(&path)?,
        None => RecorderConfig::default(),
    };

    info!(
        broker_id = %config.broker.broker_id,
        url = %config.broker.url,
        topics = ?config.topics,
        database = %config.database,
        "Configuration loaded"
    );

    let store = SqliteRecordStore::new(&config.database)
        .context("Failed to initialize record store")?;
    info!("Record store initialized");

    let clock = system_clock();
    let connection = NatsConnection::connect(&config.broker, clock.clone()).await?;
    let consumer = connection.consumer(&config.topics);

    let recorder = MessageRecorder::new(
        &config.broker.broker_id,
        Box::new(consumer),
        Box::new(store),
        config.polling_interval,
        config.health_check_interval,
        clock,
    );
    let mut agent = Agent::new(Box::new(recorder)).with_timing(config.agent.timing());
    agent.start()?;

    info!(agent_id = %agent.agent_id(), "IoT recorder running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    // Agent shutdown blocks on the thread join
    let stopped = tokio::task::spawn_blocking(move || agent.stop() || agent.kill())
        .await
        .context("Shutdown task failed")?;

    if !stopped {
        warn!("Recorder agent did not stop");
    }

    info!("IoT recorder stopped");
    Ok(())
}
