//! Device registry handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use super::common::{created, json_body, ok, HandlerResult, StatusResult};
use super::ServerState;
use crate::models::{CreateDeviceRequest, DeviceDto, ErrorResponse};

/// POST /api/v1/devices
pub async fn create_device_handler(
    State(state): State<ServerState>,
    body: Result<Json<CreateDeviceRequest>, JsonRejection>,
) -> StatusResult<DeviceDto> {
    let req = json_body(body)?;
    let device = state.registry.create(req.into()).await?;
    created(device.into())
}

/// GET /api/v1/devices
pub async fn list_devices_handler(State(state): State<ServerState>) -> HandlerResult<Vec<DeviceDto>> {
    let devices = state.registry.list().await?;
    ok(devices.into_iter().map(DeviceDto::from).collect())
}

/// GET /api/v1/devices/:id
pub async fn get_device_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> HandlerResult<DeviceDto> {
    ok(state.registry.get(&id).await?.into())
}

/// GET /api/v1/devices/external/:external_id
pub async fn get_device_by_external_id_handler(
    State(state): State<ServerState>,
    Path(external_id): Path<String>,
) -> HandlerResult<DeviceDto> {
    ok(state.registry.get_by_external_id(&external_id).await?.into())
}

/// DELETE /api/v1/devices/:id
pub async fn delete_device_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    state.registry.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
