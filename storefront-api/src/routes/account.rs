/// Account management endpoints
///
/// Everything here runs behind the JWT layer and acts on the caller's own
/// account.
///
/// # Endpoints
///
/// - `GET /v1/auth/profile` - User and profile
/// - `PUT|PATCH /v1/auth/profile` - Partial profile update
/// - `POST /v1/auth/profile/change-password` - Change password
/// - `POST /v1/auth/deactivate` - Deactivate account
/// - `DELETE /v1/auth/delete` - Delete account permanently

use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult, ValidationErrorDetail},
    routes::MessageResponse,
};
use axum::{extract::State, Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use storefront_shared::{
    auth::{authorization::require_active_user, middleware::AuthContext, password},
    models::{
        user::User,
        user_profile::{UpdateProfile, UserProfile},
    },
};
use uuid::Uuid;
use validator::Validate;

/// Phrase a user must type to delete their account
pub const DELETE_CONFIRMATION: &str = "delete my account";

const PHONE_MIN: usize = 10;
const PHONE_MAX: usize = 20;
const BIO_MAX: usize = 500;

/// Public view of a user
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            is_active: user.is_active,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
            last_login: user.last_login,
        }
    }
}

/// Public view of a user profile
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Share of optional fields filled in, 0-100
    pub profile_completion: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn new(profile: &UserProfile, user: &User) -> Self {
        Self {
            email_verified: profile.email_verified,
            email_verified_at: profile.email_verified_at,
            phone_number: profile.phone_number.clone(),
            bio: profile.bio.clone(),
            birth_date: profile.birth_date,
            profile_completion: profile.completion(user),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

/// User plus profile
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: UserResponse,
    pub profile: ProfileResponse,
}

impl AccountResponse {
    fn new(user: &User, profile: &UserProfile) -> Self {
        Self {
            message: None,
            user: UserResponse::from(user),
            profile: ProfileResponse::new(profile, user),
        }
    }
}

/// Profile update request
///
/// Absent fields are left unchanged; an empty string clears an optional
/// profile field.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 30, message = "Ensure this field has no more than 30 characters."))]
    pub first_name: Option<String>,

    #[validate(length(max = 30, message = "Ensure this field has no more than 30 characters."))]
    pub last_name: Option<String>,

    pub phone_number: Option<String>,
    pub bio: Option<String>,

    /// `YYYY-MM-DD`
    pub birth_date: Option<String>,
}

impl UpdateProfileRequest {
    /// Checks the profile fields and converts them into an update
    ///
    /// All failures are collected so the client sees every bad field at once.
    fn profile_update(&self, today: NaiveDate) -> Result<UpdateProfile, Vec<ValidationErrorDetail>> {
        let mut errors = Vec::new();
        let mut update = UpdateProfile::default();

        if let Some(phone) = self.phone_number.as_deref().map(str::trim) {
            let len = phone.chars().count();
            if phone.is_empty() {
                update.phone_number = Some(None);
            } else if !(PHONE_MIN..=PHONE_MAX).contains(&len) {
                errors.push(ValidationErrorDetail::new(
                    "phone_number",
                    format!("Phone number must be between {} and {} characters", PHONE_MIN, PHONE_MAX),
                ));
            } else {
                update.phone_number = Some(Some(phone.to_string()));
            }
        }

        if let Some(bio) = self.bio.as_deref().map(str::trim) {
            if bio.chars().count() > BIO_MAX {
                errors.push(ValidationErrorDetail::new(
                    "bio",
                    format!("Bio must be no more than {} characters", BIO_MAX),
                ));
            } else {
                update.bio = Some(Some(bio.to_string()).filter(|b| !b.is_empty()));
            }
        }

        if let Some(raw) = self.birth_date.as_deref().map(str::trim) {
            if raw.is_empty() {
                update.birth_date = Some(None);
            } else {
                match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                    Ok(date) if date < today => update.birth_date = Some(Some(date)),
                    Ok(_) => errors.push(ValidationErrorDetail::new(
                        "birth_date",
                        "Birth date must be in the past",
                    )),
                    Err(_) => errors.push(ValidationErrorDetail::new(
                        "birth_date",
                        "Invalid birth date format. Use YYYY-MM-DD",
                    )),
                }
            }
        }

        if errors.is_empty() {
            Ok(update)
        } else {
            Err(errors)
        }
    }
}

/// Change password request
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Deactivation request
#[derive(Debug, Deserialize)]
pub struct DeactivateRequest {
    #[serde(default)]
    pub password: String,
    pub reason: Option<String>,
}

/// Deletion request
#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirmation: String,
}

/// Fails with 400 "Incorrect password" unless `password` matches
fn confirm_password(user: &User, candidate: &str) -> ApiResult<()> {
    if candidate.is_empty() {
        return Err(ApiError::BadRequest("Password confirmation is required".to_string()));
    }
    if !password::verify_password(candidate, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "Account action attempted with incorrect password");
        return Err(ApiError::BadRequest("Incorrect password".to_string()));
    }
    Ok(())
}

/// Current user and profile
///
/// # Endpoint
///
/// ```text
/// GET /v1/auth/profile
/// Authorization: Bearer <access>
/// ```
///
/// A missing profile row is created on the fly.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<AccountResponse>> {
    let user = require_active_user(&state.db, &auth).await?;
    let profile = UserProfile::get_or_create(&state.db, user.id).await?;

    Ok(Json(AccountResponse::new(&user, &profile)))
}

/// Partial profile update
///
/// # Endpoint
///
/// ```text
/// PATCH /v1/auth/profile
/// Authorization: Bearer <access>
///
/// {"first_name": "Ada", "phone_number": "+15551234567", "birth_date": "1990-12-10"}
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: one entry per invalid field
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<AccountResponse>> {
    let mut errors = req
        .validate()
        .err()
        .map(|e| validation_details(&e))
        .unwrap_or_default();
    let update = match req.profile_update(Utc::now().date_naive()) {
        Ok(update) if errors.is_empty() => update,
        Ok(_) => return Err(ApiError::ValidationError(errors)),
        Err(mut details) => {
            errors.append(&mut details);
            return Err(ApiError::ValidationError(errors));
        }
    };

    let user = require_active_user(&state.db, &auth).await?;

    let first_name = req.first_name.map(|n| n.trim().to_string());
    let last_name = req.last_name.map(|n| n.trim().to_string());

    let mut tx = state.db.begin().await?;

    let user = if first_name.is_some() || last_name.is_some() {
        User::update_names(&mut *tx, user.id, first_name, last_name)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?
    } else {
        user
    };

    let profile = UserProfile::get_or_create(&mut *tx, user.id).await?;
    let profile = if update.is_empty() {
        profile
    } else {
        UserProfile::update(&mut *tx, user.id, update)
            .await?
            .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?
    };

    tx.commit().await?;

    tracing::info!(user_id = %user.id, "Profile updated");

    let mut response = AccountResponse::new(&user, &profile);
    response.message = Some("Profile updated successfully".to_string());
    Ok(Json(response))
}

/// Change password
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/profile/change-password
/// Authorization: Bearer <access>
///
/// {"current_password": "...", "new_password": "...", "new_password_confirm": "..."}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: current password wrong, confirmation mismatch, or
///   unchanged password
/// - `422 Unprocessable Entity`: new password too weak
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = require_active_user(&state.db, &auth).await?;

    if !password::verify_password(&req.current_password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "Password change with incorrect current password");
        return Err(ApiError::BadRequest("Current password is incorrect".to_string()));
    }
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
    if password::verify_password(&req.new_password, &user.password_hash)? {
        return Err(ApiError::BadRequest(
            "New password must be different from current password".to_string(),
        ));
    }

    let password_hash = password::hash_password(&req.new_password)?;
    User::set_password(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(MessageResponse::new(
        "Password changed successfully. Please log in with your new password.",
    )))
}

/// Deactivate the caller's account
///
/// The account keeps its data and can be reactivated by support. Access
/// tokens already issued stay valid until they expire, but refresh and
/// every account endpoint reject inactive users.
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<DeactivateRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = require_active_user(&state.db, &auth).await?;
    confirm_password(&user, &req.password)?;

    User::set_active(&state.db, user.id, false).await?;

    let reason = req.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
    tracing::info!(
        user_id = %user.id,
        reason = reason.unwrap_or("Not provided"),
        "Account deactivated"
    );

    Ok(Json(MessageResponse::new(
        "Account deactivated successfully. Contact support to reactivate.",
    )))
}

/// Permanently delete the caller's account
///
/// # Endpoint
///
/// ```text
/// DELETE /v1/auth/delete
/// Authorization: Bearer <access>
///
/// {"password": "...", "confirmation": "delete my account"}
/// ```
///
/// Profile, tokens and owned products go with the user.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<DeleteAccountRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = require_active_user(&state.db, &auth).await?;

    if !req.confirmation.trim().eq_ignore_ascii_case(DELETE_CONFIRMATION) {
        return Err(ApiError::BadRequest(format!(
            "Please type \"{}\" to confirm deletion",
            DELETE_CONFIRMATION
        )));
    }
    confirm_password(&user, &req.password)?;

    User::delete(&state.db, user.id).await?;

    tracing::warn!(user_id = %user.id, username = %user.username, "Account permanently deleted");

    Ok(Json(MessageResponse::new(
        "Account deleted permanently. All data has been removed.",
    )))
}
