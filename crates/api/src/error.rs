//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use courier::CourierError;
use routing_slip::RoutingSlipError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Engine error.
    Courier(CourierError),
    /// The routing slip could not be built.
    RoutingSlip(RoutingSlipError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Courier(err) => courier_error_to_response(err),
            ApiError::RoutingSlip(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn courier_error_to_response(err: CourierError) -> (StatusCode, String) {
    match &err {
        CourierError::UnknownActivity(_) | CourierError::RoutingSlip(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CourierError::Transport(_) => {
            tracing::warn!(error = %err, "transport rejected routing slip");
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        _ => {
            tracing::error!(error = %err, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<CourierError> for ApiError {
    fn from(err: CourierError) -> Self {
        ApiError::Courier(err)
    }
}

impl From<RoutingSlipError> for ApiError {
    fn from(err: RoutingSlipError) -> Self {
        ApiError::RoutingSlip(err)
    }
}

impl From<transport::TransportError> for ApiError {
    fn from(err: transport::TransportError) -> Self {
        ApiError::Courier(CourierError::Transport(err))
    }
}
