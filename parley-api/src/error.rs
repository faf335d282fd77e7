use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use parley_core::{ErrorKind, ParleyError};
use serde::Serialize;
use serde_json::json;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A core error on its way out of a route.
#[derive(Debug)]
pub struct ApiError {
    error: ParleyError,
    path: String,
}

impl ApiError {
    pub fn new(error: ParleyError, path: impl Into<String>) -> Self {
        Self {
            error,
            path: path.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.error.kind();
        let status = status_for(kind);

        // Internal details stay in the log.
        let message = if kind == ErrorKind::Internal {
            tracing::error!("{} failed: {}", self.path, self.error);
            "Internal server error".to_string()
        } else {
            tracing::debug!("{} rejected: {}", self.path, self.error);
            self.error.to_string()
        };

        let body = json!({
            "success": false,
            "statusCode": status.as_u16(),
            "errorCode": kind.code(),
            "message": message,
            "timestamp": Utc::now(),
            "path": self.path,
        });
        (status, Json(body)).into_response()
    }
}

/// Success envelope shared by every route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    success: bool,
    status_code: u16,
    message: String,
    data: T,
    timestamp: chrono::DateTime<Utc>,
    path: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, data: T, path: impl Into<String>) -> Self {
        Self {
            success: true,
            status_code: status.as_u16(),
            message: message.into(),
            data,
            timestamp: Utc::now(),
            path: path.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::RelationshipStatus;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (ParleyError::InvalidSelfReference, StatusCode::BAD_REQUEST),
            (ParleyError::RelationshipExists { status: RelationshipStatus::Pending }, StatusCode::CONFLICT),
            (ParleyError::NotRelationshipTarget(1), StatusCode::FORBIDDEN),
            (ParleyError::InvalidToken, StatusCode::UNAUTHORIZED),
            (ParleyError::MessageNotFound(3), StatusCode::NOT_FOUND),
            (ParleyError::InvalidState { status: RelationshipStatus::Accepted }, StatusCode::UNPROCESSABLE_ENTITY),
            (ParleyError::Pool("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(error.kind()), status, "{}", error);
        }
    }

    #[test]
    fn error_response_uses_the_error_status() {
        let response = ApiError::new(ParleyError::ConversationNotFound(9), "/api/v1/chat/conversations/9").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
