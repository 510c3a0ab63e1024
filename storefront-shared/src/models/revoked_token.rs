/// Refresh token blacklist
///
/// Logout records the refresh token's `jti` here; the refresh endpoint
/// rejects any token whose `jti` is present. Rows are only useful until
/// the token would have expired anyway, so [`RevokedToken::purge_expired`]
/// can drop them afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RevokedToken {
    pub jti: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: DateTime<Utc>,
}

impl RevokedToken {
    /// Blacklists a token ID
    ///
    /// Revoking the same `jti` twice is a no-op. Returns true if this call
    /// added the entry.
    pub async fn revoke<'e, E>(
        executor: E,
        jti: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Checks whether a token ID has been revoked
    pub async fn is_revoked<'e, E>(executor: E, jti: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(jti)
                .fetch_one(executor)
                .await?;

        Ok(exists.0)
    }

    /// Deletes entries for tokens that have expired on their own
    pub async fn purge_expired<'e, E>(executor: E) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
