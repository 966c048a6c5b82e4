use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use lift_core::LiftError;

/// Handler error rendered as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub struct ApiError(pub LiftError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LiftError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            LiftError::NotFound(_) => StatusCode::NOT_FOUND,
            LiftError::Conflict(_) | LiftError::ResourceExhausted(_) => StatusCode::CONFLICT,
            LiftError::Busy(_) | LiftError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<LiftError> for ApiError {
    fn from(e: LiftError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self(LiftError::invalid(e.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self(LiftError::invalid(e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(kind = self.0.kind(), error = %self.0, "request failed");
        }
        let body = json!({
            "error": {
                "code": self.0.kind(),
                "message": self.0.message(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_status_codes() {
        let cases = [
            (LiftError::invalid("x"), StatusCode::BAD_REQUEST),
            (LiftError::not_found("x"), StatusCode::NOT_FOUND),
            (LiftError::Conflict("x".into()), StatusCode::CONFLICT),
            (LiftError::ResourceExhausted("x".into()), StatusCode::CONFLICT),
            (LiftError::Busy("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (LiftError::StoreUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn response_carries_code_and_status() {
        let resp = ApiError(LiftError::not_found("session sess_1")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
