/// Single-use email tokens
///
/// Backs the email verification and password reset links. The plaintext
/// token only ever exists in the link; the table stores its SHA-256 hash.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE auth_tokens (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     purpose VARCHAR(32) NOT NULL,           -- email_verification | password_reset
///     token_hash CHAR(64) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     expires_at TIMESTAMPTZ NOT NULL,
///     used_at TIMESTAMPTZ,
///     used_ip VARCHAR(45)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use storefront_shared::models::auth_token::{AuthToken, TokenPurpose};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let (record, token) = AuthToken::issue(&pool, user_id, TokenPurpose::PasswordReset).await?;
///
/// let found = AuthToken::find_by_token(&pool, &token, TokenPurpose::PasswordReset).await?;
/// assert_eq!(found.map(|t| t.id), Some(record.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::auth::token::{generate_token, hash_token};

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Confirms ownership of the account's email (valid 24 hours)
    EmailVerification,

    /// Allows setting a new password (valid 1 hour)
    PasswordReset,
}

impl TokenPurpose {
    /// Converts purpose to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }

    /// Parses purpose from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "email_verification" => Some(TokenPurpose::EmailVerification),
            "password_reset" => Some(TokenPurpose::PasswordReset),
            _ => None,
        }
    }

    /// How long a freshly issued token stays valid
    pub fn lifetime(&self) -> Duration {
        match self {
            TokenPurpose::EmailVerification => Duration::hours(24),
            TokenPurpose::PasswordReset => Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthToken {
    pub id: Uuid,

    pub user_id: Uuid,

    /// See [`TokenPurpose`]
    pub purpose: String,

    /// SHA-256 hex digest of the plaintext token
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    /// Set once the token has been consumed
    pub used_at: Option<DateTime<Utc>>,

    /// Client address that consumed the token
    pub used_ip: Option<String>,
}

impl AuthToken {
    /// Gets the parsed purpose enum
    pub fn get_purpose(&self) -> Option<TokenPurpose> {
        TokenPurpose::from_str(&self.purpose)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Unused and unexpired
    pub fn is_valid(&self) -> bool {
        !self.is_used() && !self.is_expired()
    }

    /// Issues a new token for a user
    ///
    /// Returns the stored record together with the plaintext token, which
    /// cannot be recovered later.
    pub async fn issue<'e, E>(
        executor: E,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<(Self, String), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (token, token_hash) = generate_token();
        let expires_at = Utc::now() + purpose.lifetime();

        let record = sqlx::query_as::<_, AuthToken>(
            r#"
            INSERT INTO auth_tokens (user_id, purpose, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, purpose, token_hash, created_at, expires_at, used_at, used_ip
            "#,
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(executor)
        .await?;

        Ok((record, token))
    }

    /// Looks up a token by its plaintext value
    ///
    /// Locks the row so concurrent redemptions inside transactions serialize.
    pub async fn find_by_token<'e, E>(
        executor: E,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let record = sqlx::query_as::<_, AuthToken>(
            r#"
            SELECT id, user_id, purpose, token_hash, created_at, expires_at, used_at, used_ip
            FROM auth_tokens
            WHERE token_hash = $1 AND purpose = $2
            FOR UPDATE
            "#,
        )
        .bind(hash_token(token))
        .bind(purpose.as_str())
        .fetch_optional(executor)
        .await?;

        Ok(record)
    }

    /// Consumes a token
    ///
    /// Returns false if it was already used, so a token can only be
    /// redeemed once even under concurrent requests.
    pub async fn mark_used<'e, E>(
        executor: E,
        id: Uuid,
        used_ip: Option<&str>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE auth_tokens
            SET used_at = NOW(), used_ip = $2
            WHERE id = $1 AND used_at IS NULL
            "#,
        )
        .bind(id)
        .bind(used_ip)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Consumes every outstanding token of a purpose for a user
    pub async fn invalidate_outstanding<'e, E>(
        executor: E,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE auth_tokens
            SET used_at = NOW()
            WHERE user_id = $1 AND purpose = $2 AND used_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Counts tokens issued to a user since a point in time
    pub async fn count_issued_since<'e, E>(
        executor: E,
        user_id: Uuid,
        purpose: TokenPurpose,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM auth_tokens
            WHERE user_id = $1 AND purpose = $2 AND created_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(since)
        .fetch_one(executor)
        .await?;

        Ok(count.0)
    }

    /// Deletes a user's expired, never-used tokens of a purpose
    pub async fn purge_expired<'e, E>(
        executor: E,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            DELETE FROM auth_tokens
            WHERE user_id = $1 AND purpose = $2 AND used_at IS NULL AND expires_at < NOW()
            "#,
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in: Duration, used: bool) -> AuthToken {
        let now = Utc::now();
        AuthToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            purpose: TokenPurpose::PasswordReset.as_str().to_string(),
            token_hash: hash_token("x"),
            created_at: now,
            expires_at: now + expires_in,
            used_at: used.then_some(now),
            used_ip: None,
        }
    }

    #[test]
    fn test_purpose_round_trip() {
        for purpose in [TokenPurpose::EmailVerification, TokenPurpose::PasswordReset] {
            assert_eq!(TokenPurpose::from_str(purpose.as_str()), Some(purpose));
        }
        assert_eq!(TokenPurpose::from_str("login"), None);
    }

    #[test]
    fn test_purpose_lifetimes() {
        assert_eq!(TokenPurpose::EmailVerification.lifetime(), Duration::hours(24));
        assert_eq!(TokenPurpose::PasswordReset.lifetime(), Duration::hours(1));
    }

    #[test]
    fn test_validity() {
        let fresh = token(Duration::hours(1), false);
        assert!(fresh.is_valid());
        assert_eq!(fresh.get_purpose(), Some(TokenPurpose::PasswordReset));

        let expired = token(Duration::seconds(-1), false);
        assert!(expired.is_expired());
        assert!(!expired.is_valid());

        let used = token(Duration::hours(1), true);
        assert!(used.is_used());
        assert!(!used.is_valid());
    }
}
