//! Command lifecycle handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use smarthome_core::JsonBlob;

use super::common::{created, json_body, ok, optional_json_body, HandlerResult, StatusResult};
use super::ServerState;
use crate::models::{
    AckCommandRequest, CommandDto, DispatchCommandRequest, ExpireCommandRequest, TransitionDto,
};

/// POST /api/v1/devices/:id/commands
pub async fn dispatch_command_handler(
    State(state): State<ServerState>,
    Path(device_id): Path<String>,
    body: Result<Json<DispatchCommandRequest>, JsonRejection>,
) -> StatusResult<CommandDto> {
    let req = json_body(body)?;
    let params = req.params.as_ref().map(JsonBlob::from_value);

    let command = state
        .commands
        .dispatch(&device_id, &req.action, params)
        .await?;
    created(command.into())
}

/// GET /api/v1/devices/:id/commands
pub async fn list_device_commands_handler(
    State(state): State<ServerState>,
    Path(device_id): Path<String>,
) -> HandlerResult<Vec<CommandDto>> {
    let commands = state.commands.list_for_device(&device_id).await?;
    ok(commands.into_iter().map(CommandDto::from).collect())
}

/// GET /api/v1/commands/:id
pub async fn get_command_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> HandlerResult<CommandDto> {
    ok(state.commands.get(&id).await?.into())
}

/// POST /api/v1/commands/:id/ack
///
/// Late or duplicate acks answer 200 with the unchanged command and
/// `applied: false`.
pub async fn ack_command_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Result<Json<AckCommandRequest>, JsonRejection>,
) -> HandlerResult<TransitionDto> {
    let req = json_body(body)?;
    let at = req.at.unwrap_or_else(|| state.commands.now());

    let transition = state
        .commands
        .acknowledge(&id, req.success, &req.error, at)
        .await?;
    ok(transition.into())
}

/// POST /api/v1/commands/:id/expire
///
/// The body is optional; a malformed one is rejected before anything moves.
pub async fn expire_command_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Result<Json<ExpireCommandRequest>, JsonRejection>,
) -> HandlerResult<TransitionDto> {
    let req = optional_json_body(body)?;
    let at = req.at.unwrap_or_else(|| state.commands.now());

    ok(state.commands.expire_if_pending(&id, at).await?.into())
}
