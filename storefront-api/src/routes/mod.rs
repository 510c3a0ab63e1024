/// API route handlers
///
/// - `health`: health check
/// - `auth`: registration, login, tokens, e-mail verification, password reset
/// - `account`: profile, password change, deactivation and deletion
/// - `categories`: category browsing and staff management
/// - `products`: the signed-in user's products, stock and images
/// - `public`: anonymous product browsing and search

pub mod account;
pub mod auth;
pub mod categories;
pub mod health;
pub mod products;
pub mod public;

use crate::error::{ApiError, ApiResult};
use axum::Extension;
use serde::{Deserialize, Deserializer, Serialize};
use storefront_shared::auth::middleware::AuthContext;

/// The caller's auth context on optional-auth routes, or 401
pub(crate) fn require_auth(auth: Option<Extension<AuthContext>>) -> ApiResult<AuthContext> {
    auth.map(|Extension(auth)| auth).ok_or_else(|| {
        ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
    })
}

/// Deserializes a nullable field so that "absent" and "null" differ
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: missing is `None`, `null` is `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// `{ "message": ... }`
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
