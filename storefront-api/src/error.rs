/// Error handling for the API server
///
/// All handlers return `Result<T, ApiError>`; `ApiError` renders the JSON
/// error payload:
///
/// ```json
/// { "error": "validation_error", "message": "Request validation failed",
///   "details": [{ "field": "price", "message": "Price must be at least 0.01." }] }
/// ```
///
/// # Example
///
/// ```
/// use storefront_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler() -> ApiResult<Json<serde_json::Value>> {
///     Err(ApiError::NotFound("Product not found".to_string()))
/// }
/// ```

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use storefront_shared::{
    auth::{authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError},
    catalog::{inventory::InventoryError, query::QueryError, FieldError},
    db::unique_violation_constraint,
};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Conflict (409) on a unique field, e.g. a taken username
    DuplicateField { field: &'static str, message: String },

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// An error that also raises a boolean flag in the payload, such as
    /// `email_verification_required` or `expired`
    Flagged {
        status: StatusCode,
        message: String,
        flag: &'static str,
    },

    /// Too many requests (429)
    RateLimitExceeded { retry_after: u64, message: String },

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    /// Extra top-level flags
    #[serde(flatten)]
    pub flags: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ApiError {
    /// A single-field validation error
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::DuplicateField { .. } => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Flagged { status, .. } => *status,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

fn error_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "bad_request",
        StatusCode::UNAUTHORIZED => "unauthorized",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::CONFLICT => "conflict",
        StatusCode::UNPROCESSABLE_ENTITY => "validation_error",
        StatusCode::TOO_MANY_REQUESTS => "rate_limit_exceeded",
        StatusCode::SERVICE_UNAVAILABLE => "service_unavailable",
        _ => "internal_error",
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::DuplicateField { field, message } => write!(f, "Conflict on {}: {}", field, message),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Flagged { message, flag, .. } => write!(f, "{} ({})", message, flag),
            ApiError::RateLimitExceeded { message, .. } => write!(f, "Rate limit exceeded: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut retry_after = None;
        let mut flags = None;

        let (message, details) = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServiceUnavailable(msg) => (msg, None),
            ApiError::DuplicateField { field, message } => (
                message.clone(),
                Some(vec![ValidationErrorDetail::new(field, message)]),
            ),
            ApiError::ValidationError(errors) => ("Request validation failed".to_string(), Some(errors)),
            ApiError::Flagged { message, flag, .. } => {
                let mut map = serde_json::Map::new();
                map.insert(flag.to_string(), serde_json::Value::Bool(true));
                flags = Some(map);
                (message, None)
            }
            ApiError::RateLimitExceeded { retry_after: secs, message } => {
                retry_after = Some(secs);
                (message, None)
            }
            ApiError::InternalError(msg) => {
                // Logged here, never sent to the client
                tracing::error!("Internal error: {}", msg);
                ("An internal error occurred".to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code(status).to_string(),
            message,
            details,
            flags,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(secs));
        }
        response
    }
}

/// Field and message for a violated unique constraint
fn duplicate_field(constraint: &str) -> Option<(&'static str, &'static str)> {
    match constraint {
        "users_username_key" => Some(("username", "A user with that username already exists.")),
        "users_email_key" => Some(("email", "A user with this email already exists.")),
        "categories_name_key" => Some(("name", "A category with this name already exists.")),
        "categories_slug_key" | "products_slug_key" => Some(("slug", "This slug is already in use.")),
        "products_sku_key" => Some(("sku", "This SKU is already in use.")),
        _ => None,
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return ApiError::NotFound("Resource not found".to_string());
        }

        if let Some(constraint) = unique_violation_constraint(&err) {
            return match duplicate_field(constraint) {
                Some((field, message)) => ApiError::DuplicateField {
                    field,
                    message: message.to_string(),
                },
                None => ApiError::Conflict(format!("Constraint violation: {}", constraint)),
            };
        }

        match &err {
            sqlx::Error::PoolTimedOut => {
                tracing::error!("Database pool timed out");
                ApiError::ServiceUnavailable("Database is unavailable".to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                ApiError::BadRequest("Referenced resource does not exist".to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                ApiError::BadRequest("Value out of range".to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
            }
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::UnknownUser => ApiError::Unauthorized("User account not found or inactive".to_string()),
            AuthzError::NotStaff => {
                ApiError::Forbidden("You do not have permission to perform this action.".to_string())
            }
            AuthzError::DatabaseError(err) => err.into(),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            other => ApiError::Unauthorized(format!("Invalid token: {}", other)),
        }
    }
}

/// Convert list query errors to API errors
impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidPage => ApiError::NotFound(err.to_string()),
            QueryError::InvalidParameter { .. } => ApiError::BadRequest(err.to_string()),
        }
    }
}

/// Convert stock errors to API errors
impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InvalidQuantity => ApiError::field("quantity", err.to_string()),
            InventoryError::StockLimitExceeded { .. } => ApiError::field("quantity", err.to_string()),
            InventoryError::NegativeStock | InventoryError::UntrackedStock => {
                ApiError::field("stock_quantity", err.to_string())
            }
            InventoryError::InsufficientStock { .. } => ApiError::Conflict(err.to_string()),
        }
    }
}

/// Convert model field errors to API errors
impl From<Vec<FieldError>> for ApiError {
    fn from(errors: Vec<FieldError>) -> Self {
        ApiError::ValidationError(
            errors
                .into_iter()
                .map(|e| ValidationErrorDetail::new(e.field, e.message))
                .collect(),
        )
    }
}

/// Flattens `validator` errors into field details, sorted by field
pub fn validation_details(errors: &validator::ValidationErrors) -> Vec<ValidationErrorDetail> {
    let mut details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                ValidationErrorDetail::new(
                    field.to_string(),
                    error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                )
            })
        })
        .collect();

    // HashMap order is arbitrary
    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

/// Convert request body validation errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(validation_details(&errors))
    }
}
