/// Authorization checks
///
/// Products are owner-scoped by query (another user's product is simply not
/// found), so the only role check is for staff, who manage categories.
///
/// # Example
///
/// ```no_run
/// use storefront_shared::auth::authorization::require_staff;
/// use storefront_shared::auth::middleware::AuthContext;
/// use sqlx::PgPool;
///
/// async fn create_category(pool: &PgPool, auth: &AuthContext) -> Result<(), Box<dyn std::error::Error>> {
///     let staff = require_staff(pool, auth).await?;
///     println!("{} may manage categories", staff.username);
///     Ok(())
/// }
/// ```

use sqlx::PgPool;

use super::middleware::AuthContext;
use crate::models::user::User;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The token's user no longer exists or is deactivated
    #[error("User account not found or inactive")]
    UnknownUser,

    /// User is not staff
    #[error("Staff permissions required")]
    NotStaff,

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Loads the authenticated user, requiring an active account
pub async fn require_active_user(pool: &PgPool, auth: &AuthContext) -> Result<User, AuthzError> {
    match User::find_by_id(pool, auth.user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(AuthzError::UnknownUser),
    }
}

/// Loads the authenticated user, requiring an active staff account
pub async fn require_staff(pool: &PgPool, auth: &AuthContext) -> Result<User, AuthzError> {
    let user = require_active_user(pool, auth).await?;
    check_staff(&user)?;
    Ok(user)
}

/// Staff check on an already-loaded user
pub fn check_staff(user: &User) -> Result<(), AuthzError> {
    if user.is_staff {
        Ok(())
    } else {
        Err(AuthzError::NotStaff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(is_staff: bool) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_staff,
            date_joined: now,
            updated_at: now,
            last_login: None,
        }
    }

    #[test]
    fn test_check_staff() {
        assert!(check_staff(&user(true)).is_ok());
        assert!(matches!(check_staff(&user(false)), Err(AuthzError::NotStaff)));
    }
}
