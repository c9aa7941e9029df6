use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Enums ---

/// Charging pile status as reported by the backend.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(from = "u8", into = "u8")]
pub enum PileStatus {
    Idle,
    Charging,
    Reserved,
    Faulted,
    Offline,
    Other(u8), // Codes added server-side after this client was built
}

impl PileStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => PileStatus::Idle,
            2 => PileStatus::Charging,
            3 => PileStatus::Reserved,
            4 => PileStatus::Faulted,
            5 => PileStatus::Offline,
            other => PileStatus::Other(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PileStatus::Idle => 1,
            PileStatus::Charging => 2,
            PileStatus::Reserved => 3,
            PileStatus::Faulted => 4,
            PileStatus::Offline => 5,
            PileStatus::Other(code) => code,
        }
    }
}

impl From<u8> for PileStatus {
    fn from(code: u8) -> Self {
        PileStatus::from_code(code)
    }
}

impl From<PileStatus> for u8 {
    fn from(status: PileStatus) -> Self {
        status.code()
    }
}

// --- Inbound Messages ---

/// A frame pushed by the server, keyed by its `type` field.
///
/// Frames that are valid JSON but do not match a known shape decode to
/// [`PushMessage::Unknown`] with the original value untouched.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// Greeting sent right after the handshake.
    Connected {
        #[serde(default)]
        message: String,
    },
    /// Acknowledgement of a client frame.
    Ack {
        #[serde(default)]
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    FaultAlert {
        pile_id: i64,
        pile_no: String,
        severity: i32,
        fault_description: String,
    },
    #[serde(rename_all = "camelCase")]
    PileStatus { pile_id: i64, status: PileStatus },
    #[serde(skip)]
    Unknown(Value),
}

impl PushMessage {
    /// Decodes one text frame.
    ///
    /// Only invalid JSON is an error; schema mismatches fall back to `Unknown`.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Value) -> Self {
        match PushMessage::deserialize(&value) {
            Ok(message) => message,
            Err(_) => PushMessage::Unknown(value),
        }
    }

    /// The wire `type` tag, if the frame carried one.
    pub fn message_type(&self) -> Option<&str> {
        match self {
            PushMessage::Connected { .. } => Some("connected"),
            PushMessage::Ack { .. } => Some("ack"),
            PushMessage::FaultAlert { .. } => Some("fault_alert"),
            PushMessage::PileStatus { .. } => Some("pile_status"),
            PushMessage::Unknown(value) => value.get("type").and_then(Value::as_str),
        }
    }
}

// --- Outbound Requests ---

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Ping,
    #[serde(rename_all = "camelCase")]
    SubscribeStation { station_id: i64 },
}
