//! Application router configuration.

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use smarthome_core::config::HttpConfig;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::types::ServerState;
use crate::auth::api_key_middleware;
use crate::models::ErrorResponse;

/// Create the application router.
pub fn create_router(state: ServerState, http: &HttpConfig) -> Router {
    use crate::handlers::{basic, commands, device_state, devices};

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/healthz", get(basic::liveness_handler))
        .route("/readyz", get(basic::readiness_handler))
        .route("/api/v1/version", get(basic::version_handler));

    let protected_routes = Router::new()
        .route(
            "/api/v1/devices",
            post(devices::create_device_handler).get(devices::list_devices_handler),
        )
        .route(
            "/api/v1/devices/:id",
            get(devices::get_device_handler).delete(devices::delete_device_handler),
        )
        .route(
            "/api/v1/devices/external/:external_id",
            get(devices::get_device_by_external_id_handler),
        )
        .route(
            "/api/v1/devices/external/:external_id/state",
            put(device_state::report_state_by_external_id_handler),
        )
        .route(
            "/api/v1/devices/:id/state",
            put(device_state::report_state_handler).get(device_state::get_state_handler),
        )
        .route(
            "/api/v1/devices/:id/commands",
            post(commands::dispatch_command_handler).get(commands::list_device_commands_handler),
        )
        .route("/api/v1/commands/:id", get(commands::get_command_handler))
        .route("/api/v1/commands/:id/ack", post(commands::ack_command_handler))
        .route(
            "/api/v1/commands/:id/expire",
            post(commands::expire_command_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    // Outermost first: request id, access log, id echo, panic recovery, timeout
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            let request_id = req
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %req.method(),
                path = %req.uri().path(),
                request_id = %request_id,
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            http.request_timeout,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(http.body_limit))
        .layer(middleware)
        .with_state(state)
}

fn handle_panic(_err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!(category = "api", "handler_panicked");
    ErrorResponse::internal("internal error").into_response()
}
