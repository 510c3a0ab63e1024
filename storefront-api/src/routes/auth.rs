/// Authentication endpoints
///
/// This module provides the public account lifecycle:
/// - Registration and e-mail verification
/// - Login, logout and token refresh/verification
/// - Password reset by e-mailed link
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register new (inactive) user
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/logout` - Blacklist a refresh token
/// - `POST /v1/auth/token/refresh` - New access token
/// - `POST /v1/auth/token/verify` - Inspect a token
/// - `GET /v1/auth/verify-email/:token` - Confirm an e-mail address
/// - `POST /v1/auth/resend-verification` - New verification link
/// - `POST /v1/auth/password-reset` - Request a reset link
/// - `POST /v1/auth/password-reset/confirm/:token` - Set a new password
///
/// Links are not mailed; they are written to the log at `info` level.

use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult, ValidationErrorDetail},
    middleware::rate_limit::client_ip,
    routes::{
        account::{ProfileResponse, UserResponse},
        MessageResponse,
    },
};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use storefront_shared::{
    auth::{
        jwt::{self, TokenPair},
        middleware::AuthContext,
        password,
        token::validate_token_format,
    },
    models::{
        auth_token::{AuthToken, TokenPurpose},
        revoked_token::RevokedToken,
        user::{CreateUser, User},
        user_profile::UserProfile,
    },
};
use validator::Validate;

/// Verification links a user may request per window
const VERIFICATION_BURST: i64 = 3;
const VERIFICATION_WINDOW_MINUTES: i64 = 5;

/// Reset links a user may request per window
const RESET_BURST: i64 = 3;
const RESET_WINDOW_MINUTES: i64 = 15;

const RESEND_MESSAGE: &str =
    "If the email exists in our system and is not verified, a verification email has been sent.";
const RESET_MESSAGE: &str = "If the email exists in our system, a password reset link has been sent.";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";
const INVALID_VERIFICATION_TOKEN: &str = "Invalid or expired verification token";

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 30, message = "Username must be between 3 and 30 characters"))]
    pub username: String,

    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,

    /// Strength is checked separately
    pub password: String,

    /// Must equal `password` when given
    pub password_confirm: Option<String>,

    #[serde(default)]
    #[validate(length(max = 30, message = "Ensure this field has no more than 30 characters."))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 30, message = "Ensure this field has no more than 30 characters."))]
    pub last_name: String,
}

impl RegisterRequest {
    fn normalized(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self
    }

    /// Every field problem at once
    fn problems(&self) -> Vec<ValidationErrorDetail> {
        let mut errors = self
            .validate()
            .err()
            .map(|e| validation_details(&e))
            .unwrap_or_default();

        if !self.username.is_empty() && !is_valid_username(&self.username) {
            errors.push(ValidationErrorDetail::new(
                "username",
                "Username may contain only letters, digits and @/./+/-/_ characters.",
            ));
        }
        if let Err(problems) = password::validate_password_strength(&self.password) {
            errors.extend(problems.into_iter().map(|p| ValidationErrorDetail::new("password", p)));
        }
        if matches!(&self.password_confirm, Some(confirm) if *confirm != self.password) {
            errors.push(ValidationErrorDetail::new("password_confirm", "Passwords do not match"));
        }

        errors
    }
}

/// Letters, digits and `@ . + - _`
pub fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// Register response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserResponse,
    pub email_verification_required: bool,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,

    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserResponse,
    pub profile: ProfileResponse,
    pub tokens: TokenPair,
}

/// Body carrying a refresh token
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token
    pub access: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Token verify request
#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

/// Token verify response
#[derive(Debug, Serialize, PartialEq)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl VerifyTokenResponse {
    fn invalid() -> Self {
        Self {
            valid: false,
            token_type: None,
            expires_at: None,
        }
    }
}

/// E-mail verification response
#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub message: String,
    pub already_verified: bool,
    pub user: UserResponse,
    pub profile: ProfileResponse,
}

/// Body with just an e-mail address
#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
}

/// New password for a reset link
#[derive(Debug, Deserialize)]
pub struct ConfirmPasswordResetRequest {
    pub new_password: String,
    pub new_password_confirm: String,
}

fn caller_ip(headers: &HeaderMap, connect: Option<ConnectInfo<SocketAddr>>) -> Option<String> {
    client_ip(headers, connect.map(|ConnectInfo(addr)| addr)).map(|ip| ip.to_string())
}

fn parse_email(req: EmailRequest) -> ApiResult<String> {
    let req = EmailRequest {
        email: req.email.trim().to_lowercase(),
    };
    if req.email.is_empty() {
        return Err(ApiError::field("email", "Email address is required"));
    }
    req.validate()?;
    Ok(req.email)
}

/// Register a new user
///
/// The account starts inactive. A verification link is issued in the same
/// transaction and logged.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "username": "ada",
///   "email": "ada@example.com",
///   "password": "SecureP@ss123",
///   "password_confirm": "SecureP@ss123"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "message": "User created successfully. ...",
///   "user": {"id": "uuid", "username": "ada", ...},
///   "email_verification_required": true
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: username or email already taken
/// - `422 Unprocessable Entity`: validation failed
/// - `429 Too Many Requests`: rate limit
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let req = req.normalized();

    let problems = req.problems();
    if !problems.is_empty() {
        return Err(ApiError::ValidationError(problems));
    }

    // Case-insensitive duplicates; the unique constraints catch races
    if User::find_by_username(&state.db, &req.username).await?.is_some() {
        return Err(ApiError::DuplicateField {
            field: "username",
            message: "A user with that username already exists.".to_string(),
        });
    }
    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::DuplicateField {
            field: "email",
            message: "A user with this email already exists.".to_string(),
        });
    }

    let password_hash = password::hash_password(&req.password)?;

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            username: req.username,
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
        },
    )
    .await?;
    UserProfile::create(&mut *tx, user.id).await?;
    let (_, token) = AuthToken::issue(&mut *tx, user.id, TokenPurpose::EmailVerification).await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        link = %state.verification_link(&token),
        "User registered, verification link issued"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully. Please check your email for verification link."
                .to_string(),
            user: UserResponse::from(&user),
            email_verification_required: true,
        }),
    ))
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {"username": "ada", "password": "SecureP@ss123"}
/// ```
///
/// # Response
///
/// ```json
/// {
///   "message": "Login successful",
///   "user": {...},
///   "profile": {...},
///   "tokens": {"access": "eyJ...", "refresh": "eyJ...", "expires_in": 1800}
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: unknown user or wrong password
/// - `403 Forbidden`: e-mail not verified (`email_verification_required`)
///   or account deactivated
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;
    let ip = caller_ip(&headers, connect);

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let Some(mut user) = User::find_by_username(&state.db, req.username.trim()).await? else {
        tracing::warn!(client_ip = ?ip, "Login attempt for unknown username");
        return Err(invalid());
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, client_ip = ?ip, "Login attempt with wrong password");
        return Err(invalid());
    }

    let profile = UserProfile::get_or_create(&state.db, user.id).await?;

    // Unverified accounts are also inactive, so this check comes first
    if !profile.email_verified {
        return Err(ApiError::Flagged {
            status: StatusCode::FORBIDDEN,
            message: "Please verify your email address before logging in".to_string(),
            flag: "email_verification_required",
        });
    }
    if !user.is_active {
        tracing::warn!(user_id = %user.id, client_ip = ?ip, "Login attempt on deactivated account");
        return Err(ApiError::Forbidden(
            "Account is deactivated. Please contact support.".to_string(),
        ));
    }

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret(), state.token_lifetimes())?;

    User::update_last_login(&state.db, user.id).await?;
    user.last_login = Some(Utc::now());

    tracing::info!(user_id = %user.id, client_ip = ?ip, "Successful login");

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        profile: ProfileResponse::new(&profile, &user),
        user: UserResponse::from(&user),
        tokens,
    }))
}

/// Logout endpoint
///
/// Blacklists the supplied refresh token. A token that does not parse or
/// belongs to someone else is ignored and the call still succeeds.
///
/// # Errors
///
/// - `400 Bad Request`: no `refresh_token` in the body
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<LogoutRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let refresh_token = req
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Refresh token is required for secure logout".to_string()))?;

    match jwt::validate_refresh_token(refresh_token.trim(), state.jwt_secret()) {
        Ok(claims) if claims.sub == auth.user_id => {
            RevokedToken::revoke(&state.db, claims.jti, claims.sub, claims.expires_at()).await?;
            tracing::info!(user_id = %auth.user_id, jti = %claims.jti, "User logged out");
        }
        Ok(claims) => {
            tracing::warn!(
                user_id = %auth.user_id,
                token_owner = %claims.sub,
                "Logout with another user's refresh token"
            );
        }
        Err(e) => {
            tracing::warn!(user_id = %auth.user_id, error = %e, "Logout with unusable refresh token");
        }
    }

    let purged = RevokedToken::purge_expired(&state.db).await?;
    if purged > 0 {
        tracing::debug!(purged, "Purged expired blacklist entries");
    }

    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// Token refresh endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/token/refresh
///
/// {"refresh": "eyJ..."}
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: invalid, expired or blacklisted token, or the
///   user is gone or inactive
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh, state.jwt_secret())?;

    if RevokedToken::is_revoked(&state.db, claims.jti).await? {
        tracing::warn!(user_id = %claims.sub, jti = %claims.jti, "Blacklisted refresh token used");
        return Err(ApiError::Unauthorized("Token is blacklisted".to_string()));
    }

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::Unauthorized("User account not found or inactive".to_string()))?;

    let lifetimes = state.token_lifetimes();
    let access_claims =
        jwt::Claims::with_expiration(user.id, jwt::TokenType::Access, lifetimes.access);
    let access = jwt::create_token(&access_claims, state.jwt_secret())?;

    Ok(Json(RefreshResponse {
        access,
        expires_in: lifetimes.access.num_seconds(),
    }))
}

/// Reports whether a token is currently valid
///
/// Always 200; `valid` is false for anything that would be rejected,
/// including blacklisted refresh tokens.
pub async fn verify_token(
    State(state): State<AppState>,
    Json(req): Json<VerifyTokenRequest>,
) -> ApiResult<Json<VerifyTokenResponse>> {
    let claims = match jwt::validate_token(req.token.trim(), state.jwt_secret()) {
        Ok(claims) => claims,
        Err(_) => return Ok(Json(VerifyTokenResponse::invalid())),
    };

    if claims.token_type == jwt::TokenType::Refresh
        && RevokedToken::is_revoked(&state.db, claims.jti).await?
    {
        return Ok(Json(VerifyTokenResponse::invalid()));
    }

    Ok(Json(VerifyTokenResponse {
        valid: true,
        token_type: Some(claims.token_type.as_str()),
        expires_at: Some(claims.expires_at()),
    }))
}

/// Confirms an e-mail address
///
/// Marks the profile verified, activates the user and consumes the token
/// in one transaction.
///
/// # Endpoint
///
/// ```text
/// GET /v1/auth/verify-email/:token
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: unknown, used or malformed token; expired tokens
///   carry `"expired": true`
/// - `404 Not Found`: the token's user no longer exists
pub async fn verify_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    Path(token): Path<String>,
) -> ApiResult<Json<VerifyEmailResponse>> {
    let ip = caller_ip(&headers, connect);

    if !validate_token_format(&token) {
        tracing::warn!(client_ip = ?ip, "Email verification with malformed token");
        return Err(ApiError::BadRequest("Invalid verification token format".to_string()));
    }

    let mut tx = state.db.begin().await?;

    let record = AuthToken::find_by_token(&mut *tx, &token, TokenPurpose::EmailVerification)
        .await?
        .filter(|t| !t.is_used())
        .ok_or_else(|| {
            tracing::warn!(client_ip = ?ip, "Email verification with unknown or used token");
            ApiError::BadRequest(INVALID_VERIFICATION_TOKEN.to_string())
        })?;

    if record.is_expired() {
        tracing::info!(user_id = %record.user_id, "Email verification with expired token");
        return Err(ApiError::Flagged {
            status: StatusCode::BAD_REQUEST,
            message: "Verification token has expired. Please request a new verification email."
                .to_string(),
            flag: "expired",
        });
    }

    let user = User::find_by_id(&mut *tx, record.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User account not found".to_string()))?;

    let profile = UserProfile::get_or_create(&mut *tx, user.id).await?;
    if profile.email_verified {
        tx.commit().await?;
        return Ok(Json(VerifyEmailResponse {
            message: "Email address is already verified. You can log in now.".to_string(),
            already_verified: true,
            profile: ProfileResponse::new(&profile, &user),
            user: UserResponse::from(&user),
        }));
    }

    UserProfile::mark_email_verified(&mut *tx, user.id).await?;
    User::set_active(&mut *tx, user.id, true).await?;
    if !AuthToken::mark_used(&mut *tx, record.id, ip.as_deref()).await? {
        return Err(ApiError::BadRequest(INVALID_VERIFICATION_TOKEN.to_string()));
    }

    let user = User::find_by_id(&mut *tx, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User account not found".to_string()))?;
    let profile = UserProfile::get_or_create(&mut *tx, user.id).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, client_ip = ?ip, "Email verified");

    Ok(Json(VerifyEmailResponse {
        message: "Email verified successfully! You can now log in.".to_string(),
        already_verified: false,
        profile: ProfileResponse::new(&profile, &user),
        user: UserResponse::from(&user),
    }))
}

/// Issues a fresh verification link
///
/// The response never reveals whether the address exists or is verified.
/// At most three links per user are issued in any five minutes.
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let email = parse_email(req)?;
    let response = || Json(MessageResponse::new(RESEND_MESSAGE));

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        tracing::info!("Verification resend for unknown address");
        return Ok(response());
    };

    let profile = UserProfile::get_or_create(&state.db, user.id).await?;
    if profile.email_verified {
        tracing::info!(user_id = %user.id, "Verification resend for verified user");
        return Ok(response());
    }

    let since = Utc::now() - Duration::minutes(VERIFICATION_WINDOW_MINUTES);
    let recent =
        AuthToken::count_issued_since(&state.db, user.id, TokenPurpose::EmailVerification, since)
            .await?;
    if recent >= VERIFICATION_BURST {
        tracing::warn!(user_id = %user.id, recent, "Verification resend limit reached");
        return Ok(response());
    }

    AuthToken::purge_expired(&state.db, user.id, TokenPurpose::EmailVerification).await?;
    let (_, token) =
        AuthToken::issue(&state.db, user.id, TokenPurpose::EmailVerification).await?;

    tracing::info!(
        user_id = %user.id,
        link = %state.verification_link(&token),
        "Verification link reissued"
    );

    Ok(response())
}

/// Issues a password reset link
///
/// Same answer whether or not the address is known. Per-IP throttling
/// comes from the route's rate limit layer; per user, at most three links
/// are issued in any fifteen minutes. A new link supersedes older ones.
pub async fn request_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let email = parse_email(req)?;
    let ip = caller_ip(&headers, connect);
    let response = || Json(MessageResponse::new(RESET_MESSAGE));

    let user = match User::find_by_email(&state.db, &email).await? {
        Some(user) if user.is_active => user,
        Some(user) => {
            tracing::warn!(user_id = %user.id, client_ip = ?ip, "Password reset for inactive user");
            return Ok(response());
        }
        None => {
            tracing::info!(client_ip = ?ip, "Password reset for unknown address");
            return Ok(response());
        }
    };

    let since = Utc::now() - Duration::minutes(RESET_WINDOW_MINUTES);
    let recent =
        AuthToken::count_issued_since(&state.db, user.id, TokenPurpose::PasswordReset, since).await?;
    if recent >= RESET_BURST {
        tracing::warn!(user_id = %user.id, client_ip = ?ip, recent, "Password reset limit reached");
        return Ok(response());
    }

    let mut tx = state.db.begin().await?;
    AuthToken::invalidate_outstanding(&mut *tx, user.id, TokenPurpose::PasswordReset).await?;
    let (_, token) = AuthToken::issue(&mut *tx, user.id, TokenPurpose::PasswordReset).await?;
    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        client_ip = ?ip,
        link = %state.password_reset_link(&token),
        "Password reset link issued"
    );

    Ok(response())
}

/// Sets a new password from a reset link
///
/// The token is consumed, with the caller's IP recorded, in the same
/// transaction as the password change.
///
/// # Errors
///
/// - `400 Bad Request`: bad or used token, confirmation mismatch, or the
///   new password equals the current one
/// - `422 Unprocessable Entity`: new password too weak
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    Path(token): Path<String>,
    Json(req): Json<ConfirmPasswordResetRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let ip = caller_ip(&headers, connect);

    if req.new_password != req.new_password_confirm {
        return Err(ApiError::BadRequest(
            "New password and confirmation do not match".to_string(),
        ));
    }
    password::validate_password_strength(&req.new_password).map_err(|problems| {
        ApiError::ValidationError(
            problems
                .into_iter()
                .map(|p| ValidationErrorDetail::new("new_password", p))
                .collect(),
        )
    })?;
    if !validate_token_format(&token) {
        return Err(ApiError::BadRequest(INVALID_RESET_TOKEN.to_string()));
    }

    let mut tx = state.db.begin().await?;

    let record = AuthToken::find_by_token(&mut *tx, &token, TokenPurpose::PasswordReset)
        .await?
        .filter(AuthToken::is_valid)
        .ok_or_else(|| {
            tracing::warn!(client_ip = ?ip, "Password reset with invalid or expired token");
            ApiError::BadRequest(INVALID_RESET_TOKEN.to_string())
        })?;

    let user = User::find_by_id(&mut *tx, record.user_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest(INVALID_RESET_TOKEN.to_string()))?;

    if password::verify_password(&req.new_password, &user.password_hash)? {
        return Err(ApiError::BadRequest(
            "New password must be different from current password".to_string(),
        ));
    }

    let password_hash = password::hash_password(&req.new_password)?;
    User::set_password(&mut *tx, user.id, &password_hash).await?;
    if !AuthToken::mark_used(&mut *tx, record.id, ip.as_deref()).await? {
        return Err(ApiError::BadRequest(INVALID_RESET_TOKEN.to_string()));
    }
    AuthToken::invalidate_outstanding(&mut *tx, user.id, TokenPurpose::PasswordReset).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, client_ip = ?ip, "Password reset completed");

    Ok(Json(MessageResponse::new(
        "Password reset successfully. You can now log in with your new password.",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: None,
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    fn fields(errors: &[ValidationErrorDetail]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_username_charset() {
        assert!(is_valid_username("ada.lovelace+shop@x_y-z"));
        assert!(!is_valid_username("ada lovelace"));
        assert!(!is_valid_username("ada!"));
        assert!(!is_valid_username("adà"));
    }

    #[test]
    fn test_register_normalizes_input() {
        let req = register_request("  ada  ", "  Ada@Example.COM ", "SecureP@ss123").normalized();
        assert_eq!(req.username, "ada");
        assert_eq!(req.email, "ada@example.com");
    }

    #[test]
    fn test_register_valid_request_has_no_problems() {
        let mut req = register_request("ada", "ada@example.com", "SecureP@ss123");
        req.password_confirm = Some("SecureP@ss123".to_string());
        assert!(req.problems().is_empty());
    }

    #[test]
    fn test_register_collects_problems() {
        let mut req = register_request("a!", "not-an-email", "weak");
        req.password_confirm = Some("different".to_string());

        let problems = req.problems();
        let fields = fields(&problems);
        assert!(fields.contains(&"username"));
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"password"));
        assert!(fields.contains(&"password_confirm"));
    }

    #[test]
    fn test_register_username_length_bounds() {
        let short = register_request("ab", "ada@example.com", "SecureP@ss123");
        assert_eq!(fields(&short.problems()), vec!["username"]);

        let long = register_request(&"a".repeat(31), "ada@example.com", "SecureP@ss123");
        assert_eq!(fields(&long.problems()), vec!["username"]);

        let edge = register_request(&"a".repeat(30), "ada@example.com", "SecureP@ss123");
        assert!(edge.problems().is_empty());
    }

    #[test]
    fn test_register_name_length_bounds() {
        let mut edge = register_request("ada", "ada@example.com", "SecureP@ss123");
        edge.first_name = "n".repeat(30);
        edge.last_name = "n".repeat(30);
        assert!(edge.problems().is_empty());

        let mut long = register_request("ada", "ada@example.com", "SecureP@ss123");
        long.first_name = "n".repeat(31);
        long.last_name = "n".repeat(31);
        assert_eq!(fields(&long.problems()), vec!["first_name", "last_name"]);
    }

    #[test]
    fn test_parse_email() {
        let email = parse_email(EmailRequest {
            email: " Ada@Example.com ".to_string(),
        })
        .unwrap();
        assert_eq!(email, "ada@example.com");

        assert!(parse_email(EmailRequest { email: String::new() }).is_err());
        assert!(parse_email(EmailRequest {
            email: "nope".to_string()
        })
        .is_err());
    }

    #[test]
    fn test_invalid_verify_response_serializes_minimal() {
        let json = serde_json::to_value(VerifyTokenResponse::invalid()).unwrap();
        assert_eq!(json, serde_json::json!({"valid": false}));
    }

    #[test]
    fn test_caller_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        let peer: SocketAddr = "192.0.2.1:4000".parse().unwrap();

        assert_eq!(
            caller_ip(&headers, Some(ConnectInfo(peer))).as_deref(),
            Some("203.0.113.9")
        );
        assert_eq!(
            caller_ip(&HeaderMap::new(), Some(ConnectInfo(peer))).as_deref(),
            Some("192.0.2.1")
        );
    }
}
