use axum::extract::{rejection::JsonRejection, FromRequest};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatline_auth::AuthError;
use chatline_realtime::RealtimeError;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

/// `Json` extractor whose rejections render as an [`ErrorResponse`] body.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        warn!(status = %rejection.status(), %message, "rejected request body");
        Self::bad_request(message)
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match error {
            AuthError::InvalidCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::UserExists | AuthError::InvalidEmail | AuthError::EmptyPassword => {
                StatusCode::BAD_REQUEST
            }
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::TokenCreation(_) | AuthError::Database(_) | AuthError::PasswordHash(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!(error = ?error, "auth error");
        } else {
            warn!(error = %error, "auth request rejected");
        }
        Self::new(status, error.to_string())
    }
}

impl From<RealtimeError> for ApiError {
    fn from(error: RealtimeError) -> Self {
        let status = match error {
            RealtimeError::MissingCredential | RealtimeError::InvalidCredential(_) => {
                StatusCode::UNAUTHORIZED
            }
            RealtimeError::EmptyContent
            | RealtimeError::ContentTooLong { .. }
            | RealtimeError::EmptyQuery => StatusCode::BAD_REQUEST,
            RealtimeError::Persistence(_)
            | RealtimeError::Storage(_)
            | RealtimeError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = ?error, "realtime error");
        }
        Self::new(status, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_client_statuses() {
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::UserExists).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::UserNotFound).status,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn realtime_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(RealtimeError::EmptyContent).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(RealtimeError::ContentTooLong { max: 10 }).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(RealtimeError::Persistence("locked".into())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(RealtimeError::MissingCredential).status,
            StatusCode::UNAUTHORIZED
        );
    }
}
