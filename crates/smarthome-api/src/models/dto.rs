//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smarthome_core::{Command, CommandStatus, Device, DeviceState, Transition};
use smarthome_devices::NewDevice;

/// POST /api/v1/devices
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeviceRequest {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(alias = "mqttDeviceId", default)]
    pub external_device_id: String,
}

impl From<CreateDeviceRequest> for NewDevice {
    fn from(req: CreateDeviceRequest) -> Self {
        NewDevice {
            name: req.name,
            device_type: req.device_type,
            capabilities: req.capabilities,
            external_device_id: req.external_device_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub capabilities: Vec<String>,
    pub external_device_id: String,
    /// Legacy name for `externalDeviceId`, kept for older clients.
    #[serde(default)]
    pub mqtt_device_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Device> for DeviceDto {
    fn from(device: Device) -> Self {
        let capabilities = device.capability_names();
        Self {
            id: device.id,
            name: device.name,
            device_type: device.device_type,
            capabilities,
            mqtt_device_id: device.external_device_id.clone(),
            external_device_id: device.external_device_id,
            created_at: device.created_at,
        }
    }
}

/// PUT /api/v1/devices/:id/state
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStateRequest {
    /// Any JSON value; stored verbatim.
    pub state: Option<serde_json::Value>,
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStateDto {
    pub device_id: String,
    pub state: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl From<DeviceState> for DeviceStateDto {
    fn from(state: DeviceState) -> Self {
        Self {
            state: state.state_json.to_value(),
            device_id: state.device_id,
            updated_at: state.updated_at,
        }
    }
}

/// POST /api/v1/devices/:id/commands
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchCommandRequest {
    #[serde(default)]
    pub action: String,
    pub params: Option<serde_json::Value>,
}

/// POST /api/v1/commands/:id/ack
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckCommandRequest {
    pub success: bool,
    #[serde(default)]
    pub error: String,
    pub at: Option<DateTime<Utc>>,
}

/// POST /api/v1/commands/:id/expire
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireCommandRequest {
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDto {
    pub id: String,
    pub device_id: String,
    pub action: String,
    pub params: serde_json::Value,
    pub status: CommandStatus,
    pub error: String,
    pub created_at: DateTime<Utc>,
    pub acked_at: Option<DateTime<Utc>>,
}

impl From<Command> for CommandDto {
    fn from(command: Command) -> Self {
        Self {
            params: command.params_json.to_value(),
            id: command.id,
            device_id: command.device_id,
            action: command.action,
            status: command.status,
            error: command.error,
            created_at: command.created_at,
            acked_at: command.acked_at,
        }
    }
}

/// Command after an acknowledgement or expiry call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDto {
    #[serde(flatten)]
    pub command: CommandDto,
    /// False when the command was already terminal.
    pub applied: bool,
}

impl From<Transition> for TransitionDto {
    fn from(t: Transition) -> Self {
        Self {
            command: t.command.into(),
            applied: t.applied,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub commit: String,
    pub date: String,
}
