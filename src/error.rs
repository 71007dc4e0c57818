/// Error Handling Module
///
/// Unified error handling for the account service:
/// 1. Domain-specific error types (validation, directory, media, auth)
/// 2. The unified `AppError` used for control flow
/// 3. HTTP response mapping with a stable `code` per error kind
/// 4. Structured error logging with request context

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
    MissingFile(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is required", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
            ValidationError::MissingFile(field) => write!(f, "{} file is missing", field),
        }
    }
}

impl StdError for ValidationError {}

/// Identity directory errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                DatabaseError::UniqueConstraintViolation(
                    "Username or email already registered".to_string(),
                )
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionPool(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
                DatabaseError::QueryExecution(err.to_string())
            }
            _ => DatabaseError::UnexpectedError(err.to_string()),
        }
    }
}

/// Media storage errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    UploadFailed(String),
    DeleteFailed(String),
    ServiceUnavailable(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::UploadFailed(msg) => write!(f, "Failed to upload media: {}", msg),
            MediaError::DeleteFailed(msg) => write!(f, "Failed to delete media: {}", msg),
            MediaError::ServiceUnavailable(msg) => {
                write!(f, "Media service unavailable: {}", msg)
            }
        }
    }
}

impl StdError for MediaError {}

/// Authentication errors
///
/// The token variants all surface as `401 Unauthorized`; `InvalidCredentials`
/// covers both "no such account" and "wrong password".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    MissingToken,
    TokenInvalid,
    TokenExpired,
    TokenMalformed,
    TokenRevoked,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::TokenInvalid => "TOKEN_INVALID",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenMalformed => "TOKEN_MALFORMED",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::MissingToken => write!(f, "Missing authentication token"),
            AuthError::TokenInvalid => write!(f, "Invalid token"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenMalformed => write!(f, "Malformed token"),
            AuthError::TokenRevoked => write!(f, "Token is no longer valid"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Conflict(String),
    Auth(AuthError),
    NotFound(String),
    Upload(MediaError),
    Creation(DatabaseError),
    Database(DatabaseError),
    Media(MediaError),
    Internal(String),
}

impl AppError {
    /// Stable machine-readable kind, also used as the response `code`.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Auth(e) => e.code(),
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Upload(_) => "UPLOAD_ERROR",
            AppError::Creation(_) => "CREATION_ERROR",
            AppError::Database(DatabaseError::ConnectionPool(_)) => "SERVICE_UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Media(_) => "MEDIA_SERVICE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the auth error kind when this is an authentication failure.
    pub fn auth_kind(&self) -> Option<AuthError> {
        match self {
            AppError::Auth(e) => Some(*e),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Upload(e) => write!(f, "{}", e),
            AppError::Creation(e) => write!(f, "Account creation failed: {}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Media(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueConstraintViolation(msg) => AppError::Conflict(msg),
            DatabaseError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::Database(other),
        }
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        AppError::Media(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let status = self.status_code();
        // Internal details never reach the client
        let message = match self {
            AppError::Validation(e) => e.to_string(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Auth(e) => e.to_string(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Upload(_) => "Failed to upload media".to_string(),
            AppError::Creation(_) => {
                "Something went wrong while registering the account".to_string()
            }
            AppError::Database(DatabaseError::ConnectionPool(_)) => {
                "Database service temporarily unavailable".to_string()
            }
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Media(_) => "Media service temporarily unavailable".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        };

        let error_response = ErrorResponse::new(
            request_id.to_string(),
            message,
            self.code().to_string(),
            status.as_u16(),
        );

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) | AppError::NotFound(_) => {
                tracing::warn!(request_id = request_id, error = %self, "Request rejected");
            }
            AppError::Auth(e) => {
                tracing::warn!(
                    request_id = request_id,
                    code = e.code(),
                    "Authentication failed"
                );
            }
            AppError::Upload(e) | AppError::Media(e) => {
                tracing::error!(request_id = request_id, error = %e, "Media service error");
            }
            AppError::Creation(e) | AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Directory error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upload(_) | AppError::Creation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(DatabaseError::ConnectionPool(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Media(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Error context for enhanced logging and debugging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl ToString) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn log_error(&self, error: &AppError) {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "user_id": self.user_id,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        match error {
            AppError::Validation(_)
            | AppError::Conflict(_)
            | AppError::Auth(_)
            | AppError::NotFound(_) => {
                tracing::warn!(error = %error, code = error.code(), context = %context, "Operation rejected");
            }
            _ => {
                tracing::error!(error = %error, code = error.code(), context = %context, "Operation failed");
            }
        }
    }
}
