use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use webhooks_core::DomainError;
use webhooks_infra::{CallerError, StoreError};

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::Configuration(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("subscription {id} not found"))
        }
        StoreError::Storage(msg) => json_error(StatusCode::SERVICE_UNAVAILABLE, "store_error", msg),
        StoreError::Corrupt(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "corrupt_record", msg),
    }
}

pub fn caller_error_to_response(err: CallerError) -> axum::response::Response {
    match err {
        CallerError::Configuration(e) => domain_error_to_response(e),
        CallerError::Store(e) => store_error_to_response(e),
        CallerError::Serialize(e) => json_error(StatusCode::BAD_REQUEST, "invalid_payload", e.to_string()),
        CallerError::Client(e) => json_error(StatusCode::BAD_GATEWAY, "http_client_error", e.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
