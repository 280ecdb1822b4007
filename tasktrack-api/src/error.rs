//! API errors.
//!
//! Every failure a handler can produce ends up as an [`ApiError`]: a stable
//! [`ErrorCode`], a message and optional structured `details`, rendered as
//! JSON with the status the code maps to.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tasktrack_core::{ConfigError, StorageError, TaskTrackError, ValidationError};

/// Stable, machine-readable error category. Serialized SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    InvalidToken,
    TokenExpired,

    ValidationFailed,
    InvalidInput,
    MissingField,
    InvalidRange,
    InvalidFormat,

    EntityNotFound,
    /// A validated token carried no identity claim. The status is chosen by
    /// the missing-identity policy; see [`ApiError::identity_missing`].
    IdentityMissing,

    EntityAlreadyExists,

    TooManyRequests,

    InternalError,
    StorageError,
    ServiceUnavailable,
}

impl ErrorCode {
    /// Default HTTP status for this code.
    pub fn status_code(&self) -> StatusCode {
        use ErrorCode::*;
        match self {
            Unauthorized | InvalidToken | TokenExpired => StatusCode::UNAUTHORIZED,
            ValidationFailed | InvalidInput | MissingField | InvalidRange | InvalidFormat => {
                StatusCode::BAD_REQUEST
            }
            EntityNotFound | IdentityMissing => StatusCode::NOT_FOUND,
            EntityAlreadyExists => StatusCode::CONFLICT,
            TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            InternalError | StorageError => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn default_message(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            Unauthorized => "Authentication required",
            InvalidToken => "Invalid authentication token",
            TokenExpired => "Authentication token has expired",
            ValidationFailed => "Request validation failed",
            InvalidInput => "Invalid input data",
            MissingField => "Required field is missing",
            InvalidRange => "Value is out of valid range",
            InvalidFormat => "Invalid format",
            EntityNotFound => "Entity not found",
            IdentityMissing => "User not found",
            EntityAlreadyExists => "Entity already exists",
            TooManyRequests => "Rate limit exceeded",
            InternalError => "Internal server error",
            StorageError => "Task store operation failed",
            ServiceUnavailable => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// JSON error body returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,

    /// Structured context, such as the bounds of a range violation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Set on rate-limit rejections and mirrored into `Retry-After`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,

    #[serde(skip)]
    status_override: Option<u16>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            retry_after_secs: None,
            status_override: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_override
            .and_then(|raw| StatusCode::from_u16(raw).ok())
            .unwrap_or_else(|| self.code.status_code())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    pub fn token_expired() -> Self {
        let code = ErrorCode::TokenExpired;
        Self::new(code, code.default_message())
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::MissingField, format!("Required field '{}' is missing", field))
            .with_details(json!({ "field": field }))
    }

    /// `field` must lie in `min..=max`. The bounds travel in `details`.
    pub fn invalid_range(field: &str, min: i64, max: i64) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Field '{}' must be between {} and {}", field, min, max),
        )
        .with_details(json!({ "field": field, "min": min, "max": max }))
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::EntityNotFound, format!("{} with id {} not found", entity_type, id))
    }

    /// `IDENTITY_MISSING` surfaced with `status`. The code is the same under
    /// every policy so clients can tell it apart from an ordinary not-found.
    pub fn identity_missing(status: StatusCode) -> Self {
        let code = ErrorCode::IdentityMissing;
        let mut err = Self::new(code, code.default_message());
        err.status_override = Some(status.as_u16());
        err
    }

    pub fn entity_already_exists(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityAlreadyExists,
            format!("{} with id {} already exists", entity_type, id),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn too_many_requests(retry_after_secs: Option<u64>) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("Rate limit exceeded. Retry after {} seconds", secs),
            None => ErrorCode::TooManyRequests.default_message().to_string(),
        };
        let mut err = Self::new(ErrorCode::TooManyRequests, message);
        err.retry_after_secs = retry_after_secs;
        err
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self
            .retry_after_secs
            .and_then(|secs| HeaderValue::from_str(&secs.to_string()).ok());

        let mut response = (status, Json(self)).into_response();
        if let Some(value) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(&field),
            ValidationError::OutOfRange { field, min, max, .. } => {
                ApiError::invalid_range(&field, min, max)
            }
            ValidationError::IdMismatch { path, body } => ApiError::validation_failed(
                ValidationError::IdMismatch { path, body }.to_string(),
            )
            .with_details(json!({ "path_id": path.get(), "body_id": body.get() })),
            other @ ValidationError::InvalidValue { .. } => {
                ApiError::validation_failed(other.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => ApiError::entity_not_found("Task", id),
            StorageError::Unavailable { reason } => {
                tracing::error!(reason = %reason, "Task store unavailable");
                ApiError::service_unavailable("Task store is unavailable")
            }
            other => {
                // internals stay in the log
                tracing::error!(error = %other, "Task store operation failed");
                let code = ErrorCode::StorageError;
                ApiError::new(code, code.default_message())
            }
        }
    }
}

impl From<TaskTrackError> for ApiError {
    fn from(err: TaskTrackError) -> Self {
        match err {
            TaskTrackError::Storage(e) => e.into(),
            TaskTrackError::Validation(e) => e.into(),
            TaskTrackError::Config(e) => {
                tracing::error!(error = %e, "Configuration error while serving request");
                ApiError::internal_error("Server configuration error")
            }
        }
    }
}

/// Startup configuration failures keep their full message.
impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(format!("Invalid configuration: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasktrack_core::TaskId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ErrorCode::Unauthorized, StatusCode::UNAUTHORIZED),
            (ErrorCode::TokenExpired, StatusCode::UNAUTHORIZED),
            (ErrorCode::InvalidRange, StatusCode::BAD_REQUEST),
            (ErrorCode::EntityNotFound, StatusCode::NOT_FOUND),
            (ErrorCode::IdentityMissing, StatusCode::NOT_FOUND),
            (ErrorCode::EntityAlreadyExists, StatusCode::CONFLICT),
            (ErrorCode::StorageError, StatusCode::INTERNAL_SERVER_ERROR),
            (ErrorCode::TooManyRequests, StatusCode::TOO_MANY_REQUESTS),
        ];
        for (code, status) in cases {
            assert_eq!(code.status_code(), status, "{}", code);
        }
    }

    #[test]
    fn test_identity_missing_status_follows_policy() {
        let not_found = ApiError::identity_missing(StatusCode::NOT_FOUND);
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.message, "User not found");

        let forbidden = ApiError::identity_missing(StatusCode::FORBIDDEN);
        assert_eq!(forbidden.code, ErrorCode::IdentityMissing);
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_too_many_requests_sets_retry_after_header() {
        let response = ApiError::too_many_requests(Some(42)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("42")
        );

        let response = ApiError::unauthorized("nope").into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_range_violation_carries_bounds() {
        let err: ApiError = ValidationError::OutOfRange {
            field: "status".to_string(),
            value: 7,
            min: 0,
            max: 3,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidRange);
        assert_eq!(err.details, Some(json!({ "field": "status", "min": 0, "max": 3 })));
    }

    #[test]
    fn test_id_mismatch_carries_both_ids() {
        let err: ApiError = ValidationError::IdMismatch {
            path: TaskId::new(1),
            body: TaskId::new(2),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details, Some(json!({ "path_id": 1, "body_id": 2 })));
    }

    #[test]
    fn test_storage_errors_hide_internals() {
        let err: ApiError = TaskTrackError::Storage(StorageError::NotFound { id: TaskId::new(9) }).into();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
        assert!(err.message.contains('9'));

        let err: ApiError = TaskTrackError::Storage(StorageError::LockPoisoned).into();
        assert_eq!(err.code, ErrorCode::StorageError);
        assert!(!err.message.contains("poison"));
    }

    #[test]
    fn test_body_shape() -> Result<(), serde_json::Error> {
        let err = ApiError::unauthorized("Invalid token");
        let value = serde_json::to_value(&err)?;
        assert_eq!(value, json!({ "code": "UNAUTHORIZED", "message": "Invalid token" }));

        let err = ApiError::missing_field("title");
        let value = serde_json::to_value(&err)?;
        assert_eq!(value["details"], json!({ "field": "title" }));
        Ok(())
    }
}
