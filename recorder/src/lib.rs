pub mod config;
pub mod recorder;
pub mod store;

pub use recorder::{MessageRecorder, RecorderStats};
pub use store::{Record, RecordEntry, RecordStore, SqliteRecordStore};
