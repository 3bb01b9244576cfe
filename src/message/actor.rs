use super::{timestamp, Message};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

/// Command sent to an actor to initiate an action.
///
/// `cmd_duration` (seconds) asks the actor to revert the command after the
/// given time; `0` means the command stays in effect.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ActorCommand {
    pub sender_id: String,
    pub sender_type: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub cmd_time: NaiveDateTime,
    pub cmd_detail: Value,
    pub cmd_duration: u32,
}

impl ActorCommand {
    pub fn new(
        sender_id: impl Into<String>,
        sender_type: impl Into<String>,
        cmd_time: NaiveDateTime,
        cmd_detail: impl Into<Value>,
        cmd_duration: u32,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            sender_type: sender_type.into(),
            cmd_time,
            cmd_detail: cmd_detail.into(),
            cmd_duration,
        }
    }

    /// True if the command asks to switch the actor on.
    pub fn is_on(&self) -> bool {
        self.cmd_detail.as_str() == Some("ON")
    }
}

impl Message for ActorCommand {
    const CLASS: &'static str = "ActorCommand";
    const MANDATORY: &'static [&'static str] = &[
        "sender_type",
        "sender_id",
        "cmd_time",
        "cmd_detail",
        "cmd_duration",
    ];

    fn to_record(&self) -> Value {
        json!({
            "class": Self::CLASS,
            "sender_id": self.sender_id,
            "sender_type": self.sender_type,
            "cmd_time": timestamp::format(&self.cmd_time),
            "cmd_detail": self.cmd_detail,
            "cmd_duration": self.cmd_duration,
        })
    }

    fn created_at(&self) -> NaiveDateTime {
        self.cmd_time
    }
}
