//! HTTP and WebSocket request handlers.

pub mod health;
pub mod v1;

use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};

use trivium::data::ErrorResponse;
use trivium::errors::SessionError;

/// Wrapper that maps [`SessionError`] kinds onto HTTP statuses with a
/// structured `{success, message}` body.
pub struct ApiError(pub SessionError);

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::Forbidden(_) => StatusCode::FORBIDDEN,
            SessionError::Conflict(_) | SessionError::Invalid(_) => StatusCode::BAD_REQUEST,
            SessionError::Unavailable(_) | SessionError::Corrupt(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorResponse {
            success: false,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: SessionError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn error_kinds_map_to_http_statuses() {
        assert_eq!(
            status_of(SessionError::session_not_found()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(SessionError::Forbidden("Only host can start".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(SessionError::Conflict("Already answered".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SessionError::Invalid("bad payload".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SessionError::Unavailable("store down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(SessionError::Corrupt("bad blob".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
