//! Reported device state handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use smarthome_core::JsonBlob;

use super::common::{json_body, ok, HandlerResult};
use super::ServerState;
use crate::models::{DeviceStateDto, ErrorResponse, ReportStateRequest};

fn state_blob(req: &ReportStateRequest) -> Result<JsonBlob, ErrorResponse> {
    req.state
        .as_ref()
        .map(JsonBlob::from_value)
        .ok_or_else(|| ErrorResponse::bad_request("state is required"))
}

/// PUT /api/v1/devices/:id/state
pub async fn report_state_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Result<Json<ReportStateRequest>, JsonRejection>,
) -> HandlerResult<DeviceStateDto> {
    let req = json_body(body)?;
    let blob = state_blob(&req)?;
    let observed_at = req.observed_at.unwrap_or_else(|| state.commands.now());

    ok(state.states.report(&id, blob, observed_at).await?.into())
}

/// PUT /api/v1/devices/external/:external_id/state
pub async fn report_state_by_external_id_handler(
    State(state): State<ServerState>,
    Path(external_id): Path<String>,
    body: Result<Json<ReportStateRequest>, JsonRejection>,
) -> HandlerResult<DeviceStateDto> {
    let req = json_body(body)?;
    let blob = state_blob(&req)?;
    let observed_at = req.observed_at.unwrap_or_else(|| state.commands.now());

    let reported = state
        .states
        .report_by_external_id(&external_id, blob, observed_at)
        .await?;
    ok(reported.into())
}

/// GET /api/v1/devices/:id/state
pub async fn get_state_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> HandlerResult<DeviceStateDto> {
    ok(state.states.get(&id).await?.into())
}
