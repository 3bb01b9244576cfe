//! Persistent storage of received messages using SQLite.
//!
//! Every message gets one row in `iot_recorder_msg` plus one row in the table
//! for its kind. Payloads that are not a known message type, or that fail
//! to decode, go to `iot_recorder_generic` as JSON text.

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use iot_agents::message::{
    message_class, timestamp, InputHealth, InputProbe, Message, SensorMeasurement,
};
use rusqlite::{params, Connection, Transaction};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Tables created by [`SqliteRecordStore`].
pub const TABLES: &[&str] = &[
    "iot_recorder_msg",
    "iot_recorder_input_probe",
    "iot_recorder_input_health",
    "iot_recorder_sensor_msmt",
    "iot_recorder_generic",
];

/// Decoded payload of a received message.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Probe(InputProbe),
    Health(InputHealth),
    Measurement(SensorMeasurement),
    Generic(Value),
}

impl Record {
    /// Classifies a payload by its `class` discriminator. Unknown classes,
    /// missing classes and decoding failures all yield `Generic`.
    pub fn classify(payload: &Value) -> Record {
        let decoded = match message_class(payload) {
            Some(InputProbe::CLASS) => InputProbe::from_record(payload).map(Record::Probe),
            Some(InputHealth::CLASS) => InputHealth::from_record(payload).map(Record::Health),
            Some(SensorMeasurement::CLASS) => {
                SensorMeasurement::from_record(payload).map(Record::Measurement)
            }
            _ => return Record::Generic(payload.clone()),
        };

        decoded.unwrap_or_else(|e| {
            warn!(error = %e, "Undecodable payload, storing as generic record");
            Record::Generic(payload.clone())
        })
    }

    pub fn table(&self) -> &'static str {
        match self {
            Record::Probe(_) => "iot_recorder_input_probe",
            Record::Health(_) => "iot_recorder_input_health",
            Record::Measurement(_) => "iot_recorder_sensor_msmt",
            Record::Generic(_) => "iot_recorder_generic",
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Record::Generic(_))
    }
}

/// A received message ready to be stored.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordEntry {
    pub msg_id: String,
    pub topic: String,
    /// Receipt time of the message
    pub timestamp: NaiveDateTime,
    /// `class` discriminator, empty if the payload has none
    pub class: String,
    pub record: Record,
    pub stored_at: NaiveDateTime,
}

/// Destination for recorded messages.
pub trait RecordStore: Send {
    fn store(&self, entry: &RecordEntry) -> Result<()>;
}

/// Record storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE iot_recorder_msg (
///     msg_id TEXT PRIMARY KEY,
///     msg_topic TEXT NOT NULL,
///     msg_timestamp TEXT NOT NULL,
///     msg_class TEXT NOT NULL,
///     store_date TEXT NOT NULL
/// );
/// ```
/// plus one table per message kind keyed by the same `msg_id`.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Creates or opens a record store.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS iot_recorder_msg (
                msg_id TEXT PRIMARY KEY,
                msg_topic TEXT NOT NULL,
                msg_timestamp TEXT NOT NULL,
                msg_class TEXT NOT NULL,
                store_date TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS iot_recorder_input_probe (
                msg_id TEXT PRIMARY KEY,
                device_type TEXT NOT NULL,
                device_id TEXT NOT NULL,
                probe_time TEXT NOT NULL,
                channel_no INTEGER NOT NULL,
                value INTEGER NOT NULL,
                voltage REAL NOT NULL,
                store_date TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS iot_recorder_input_health (
                msg_id TEXT PRIMARY KEY,
                device_type TEXT NOT NULL,
                device_id TEXT NOT NULL,
                health_time TEXT NOT NULL,
                health_status INTEGER NOT NULL,
                last_probe_time TEXT,
                num_probe_total INTEGER NOT NULL,
                num_probe_detail TEXT NOT NULL,
                store_date TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS iot_recorder_sensor_msmt (
                msg_id TEXT PRIMARY KEY,
                sensor_id TEXT NOT NULL,
                sensor_type TEXT NOT NULL,
                msmt_time TEXT NOT NULL,
                hw_value INTEGER NOT NULL,
                hw_voltage REAL NOT NULL,
                msmt_unit TEXT NOT NULL,
                msmt_value REAL NOT NULL,
                store_date TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS iot_recorder_generic (
                msg_id TEXT PRIMARY KEY,
                msg_payload TEXT NOT NULL,
                store_date TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create recorder tables")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_msg_class ON iot_recorder_msg(msg_class)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of rows in one of the recorder tables.
    pub fn count(&self, table: &str) -> Result<i64> {
        if !TABLES.contains(&table) {
            bail!("unknown recorder table '{}'", table);
        }
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .with_context(|| format!("Failed to count rows of {}", table))?;
        Ok(count)
    }

    fn insert_record(tx: &Transaction<'_>, entry: &RecordEntry) -> Result<()> {
        let msg_id = &entry.msg_id;
        let store_date = timestamp::format(&entry.stored_at);

        match &entry.record {
            Record::Probe(probe) => tx.execute(
                r#"
                INSERT INTO iot_recorder_input_probe (
                    msg_id, device_type, device_id, probe_time,
                    channel_no, value, voltage, store_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    msg_id,
                    probe.device_type,
                    probe.device_id,
                    timestamp::format(&probe.probe_time),
                    i64::from(probe.channel_no),
                    probe.value,
                    probe.voltage,
                    store_date,
                ],
            ),
            Record::Health(health) => tx.execute(
                r#"
                INSERT INTO iot_recorder_input_health (
                    msg_id, device_type, device_id, health_time, health_status,
                    last_probe_time, num_probe_total, num_probe_detail, store_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    msg_id,
                    health.device_type,
                    health.device_id,
                    timestamp::format(&health.health_time),
                    health.health_status,
                    timestamp::option::format(&health.last_probe_time),
                    health.num_probe_total as i64,
                    serde_json::to_string(&health.num_probe_detail)?,
                    store_date,
                ],
            ),
            Record::Measurement(msmt) => tx.execute(
                r#"
                INSERT INTO iot_recorder_sensor_msmt (
                    msg_id, sensor_id, sensor_type, msmt_time, hw_value,
                    hw_voltage, msmt_unit, msmt_value, store_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    msg_id,
                    msmt.sensor_id,
                    msmt.sensor_type,
                    timestamp::format(&msmt.msmt_time),
                    msmt.hw_value,
                    msmt.hw_voltage,
                    msmt.msmt_unit,
                    msmt.msmt_value,
                    store_date,
                ],
            ),
            Record::Generic(payload) => tx.execute(
                "INSERT INTO iot_recorder_generic (msg_id, msg_payload, store_date) VALUES (?1, ?2, ?3)",
                params![msg_id, serde_json::to_string(payload)?, store_date],
            ),
        }
        .with_context(|| format!("Failed to insert into {}", entry.record.table()))?;

        Ok(())
    }
}

impl RecordStore for SqliteRecordStore {
    fn store(&self, entry: &RecordEntry) -> Result<()> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.transaction().context("Failed to begin transaction")?;

        tx.execute(
            r#"
            INSERT INTO iot_recorder_msg (msg_id, msg_topic, msg_timestamp, msg_class, store_date)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry.msg_id,
                entry.topic,
                timestamp::format(&entry.timestamp),
                entry.class,
                timestamp::format(&entry.stored_at),
            ],
        )
        .context("Failed to insert into iot_recorder_msg")?;

        Self::insert_record(&tx, entry)?;
        tx.commit().context("Failed to commit record")?;

        debug!(msg_id = %entry.msg_id, table = entry.record.table(), "Stored message");
        Ok(())
    }
}
