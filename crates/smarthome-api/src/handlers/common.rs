//! Common API handler utilities.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;

use crate::models::ErrorResponse;

/// Result type for all API handlers.
pub type HandlerResult<T> = Result<Json<T>, ErrorResponse>;

/// Result type for handlers that pick their own success status.
pub type StatusResult<T> = Result<(StatusCode, Json<T>), ErrorResponse>;

/// 200 with a JSON body.
pub fn ok<T>(data: T) -> HandlerResult<T> {
    Ok(Json(data))
}

/// 201 with a JSON body.
pub fn created<T>(data: T) -> StatusResult<T> {
    Ok((StatusCode::CREATED, Json(data)))
}

/// Unwrap a JSON body, turning malformed input into a 400.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ErrorResponse> {
    body.map(|Json(value)| value).map_err(ErrorResponse::from)
}

/// Like [`json_body`], but a request sent without a JSON body yields the
/// default. A body that claims to be JSON and fails to parse is still a 400.
pub fn optional_json_body<T: Default>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, ErrorResponse> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(ErrorResponse::from(rejection)),
    }
}
