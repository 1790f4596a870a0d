use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use goodsin_infra::command_dispatcher::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> Response {
    match err {
        DispatchError::Concurrency(msg) | DispatchError::Conflict(msg) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        DispatchError::Validation { field, message } => validation_error(field.as_deref(), message),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
        DispatchError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        DispatchError::TenantIsolation(msg) => json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg),
        DispatchError::Deserialize(msg) => {
            tracing::error!(error = %msg, "event deserialization failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Publish(msg) => {
            tracing::error!(error = %msg, "event publish failed");
            json_error(StatusCode::BAD_GATEWAY, "publish_error", msg)
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 400 with the offending request field, when known.
pub fn validation_error(field: Option<&str>, message: impl Into<String>) -> Response {
    let mut body = json!({
        "error": "validation_error",
        "message": message.into(),
    });
    if let Some(field) = field {
        body["field"] = json!(field);
    }
    (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
}

pub fn forbidden(err: impl std::fmt::Display) -> Response {
    tracing::warn!(error = %err, "command rejected by authorization");
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

/// Parse a path or body id, answering 400 with the offending field on garbage.
pub fn parse_id<T>(raw: &str, field: &'static str) -> Result<T, Response>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| validation_error(Some(field), format!("invalid {field}: {e}")))
}
