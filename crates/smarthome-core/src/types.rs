//! Entity types persisted by the store and returned by the services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque device identifier.
pub type DeviceId = String;

/// Opaque command identifier.
pub type CommandId = String;

/// An already-serialized JSON payload carried through without validation.
///
/// Stored and returned verbatim; only boundaries that need structure decode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonBlob(String);

impl JsonBlob {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Serialize a JSON value into a blob.
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self(value.to_string())
    }

    /// The empty JSON object, used when a payload is omitted.
    pub fn empty_object() -> Self {
        Self("{}".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.0)
    }

    /// Decode as a JSON value, presenting non-JSON payloads as a string value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.0).unwrap_or_else(|_| serde_json::Value::String(self.0.clone()))
    }
}

impl From<serde_json::Value> for JsonBlob {
    fn from(value: serde_json::Value) -> Self {
        Self::from_value(&value)
    }
}

/// A registered controllable device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    /// Capability names, stored serialized.
    pub capabilities: JsonBlob,
    /// Identifier used by the delivery transport. Unique across devices.
    pub external_device_id: String,
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// Capability names; a malformed stored list reads as empty.
    pub fn capability_names(&self) -> Vec<String> {
        self.capabilities.decode().unwrap_or_default()
    }
}

/// The latest reported state of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub device_id: DeviceId,
    pub state_json: JsonBlob,
    pub updated_at: DateTime<Utc>,
}

/// Command lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    /// Dispatched, awaiting acknowledgement or expiry.
    Pending,
    /// Acknowledged as successful.
    Acked,
    /// Acknowledged as failed.
    Failed,
    /// No acknowledgement arrived within the window.
    Timeout,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CommandStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Acked => "acked",
            CommandStatus::Failed => "failed",
            CommandStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single requested action directed at a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub device_id: DeviceId,
    pub action: String,
    pub params_json: JsonBlob,
    pub status: CommandStatus,
    /// Empty unless the command failed.
    #[serde(default)]
    pub error: String,
    pub created_at: DateTime<Utc>,
    /// Set only on transition to acked or failed.
    pub acked_at: Option<DateTime<Utc>>,
}

impl Command {
    /// Apply an acknowledgement. Returns false, leaving the command untouched,
    /// if it already reached a terminal status.
    pub fn acknowledge(&mut self, success: bool, error: &str, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if success {
            self.status = CommandStatus::Acked;
            self.error.clear();
        } else {
            self.status = CommandStatus::Failed;
            self.error = error.to_string();
        }
        self.acked_at = Some(at);
        true
    }

    /// Apply the timeout transition. `acked_at` stays unset.
    pub fn expire(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = CommandStatus::Timeout;
        true
    }
}

/// Outcome of a conditional command transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The command as persisted after the call.
    pub command: Command,
    /// False when the command was already terminal and nothing changed.
    pub applied: bool,
}
