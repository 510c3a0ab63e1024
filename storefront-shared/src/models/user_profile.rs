/// User profile model
///
/// One-to-one extension of [`User`](super::user::User) holding the email
/// verification state and optional personal details. Rows are created at
/// registration; [`UserProfile::get_or_create`] covers accounts that lack one.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use super::user::User;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: Uuid,

    pub email_verified: bool,

    pub email_verified_at: Option<DateTime<Utc>>,

    pub phone_number: Option<String>,

    pub bio: Option<String>,

    pub birth_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Partial profile update
///
/// The outer `Option` says whether to touch the field, the inner one
/// whether to set or clear it.
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub phone_number: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub birth_date: Option<Option<NaiveDate>>,
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.phone_number.is_none() && self.bio.is_none() && self.birth_date.is_none()
    }
}

impl UserProfile {
    /// Percentage of the six profile facts that are filled in
    ///
    /// Counts first name, last name, phone number, bio, birth date and a
    /// verified email. Truncated towards zero.
    pub fn completion(&self, user: &User) -> u8 {
        let filled = [
            !user.first_name.trim().is_empty(),
            !user.last_name.trim().is_empty(),
            self.phone_number.as_deref().is_some_and(|p| !p.trim().is_empty()),
            self.bio.as_deref().is_some_and(|b| !b.trim().is_empty()),
            self.birth_date.is_some(),
            self.email_verified,
        ]
        .iter()
        .filter(|f| **f)
        .count();

        (filled * 100 / 6) as u8
    }

    /// Creates an unverified profile for a new user
    pub async fn create<'e, E>(executor: E, user_id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO user_profiles (user_id)
            VALUES ($1)
            RETURNING user_id, email_verified, email_verified_at, phone_number, bio,
                      birth_date, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(executor)
        .await?;

        Ok(profile)
    }

    /// Returns the user's profile, creating an empty one if missing
    pub async fn get_or_create<'e, E>(executor: E, user_id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO user_profiles (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING user_id, email_verified, email_verified_at, phone_number, bio,
                      birth_date, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(executor)
        .await?;

        Ok(profile)
    }

    /// Marks the email as verified
    ///
    /// Returns true if the profile exists.
    pub async fn mark_email_verified<'e, E>(executor: E, user_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, email_verified, email_verified_at)
            VALUES ($1, TRUE, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET email_verified = TRUE, email_verified_at = NOW(), updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies a partial update, returning the new row
    pub async fn update<'e, E>(
        executor: E,
        user_id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE user_profiles SET updated_at = NOW()");

        if let Some(phone_number) = data.phone_number {
            builder.push(", phone_number = ").push_bind(phone_number);
        }
        if let Some(bio) = data.bio {
            builder.push(", bio = ").push_bind(bio);
        }
        if let Some(birth_date) = data.birth_date {
            builder.push(", birth_date = ").push_bind(birth_date);
        }

        builder.push(" WHERE user_id = ").push_bind(user_id);
        builder.push(
            " RETURNING user_id, email_verified, email_verified_at, phone_number, bio, \
             birth_date, created_at, updated_at",
        );

        let profile = builder
            .build_query_as::<UserProfile>()
            .fetch_optional(executor)
            .await?;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: "shopper".to_string(),
            email: "shopper@example.com".to_string(),
            password_hash: String::new(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            is_active: true,
            is_staff: false,
            date_joined: Utc::now(),
            updated_at: Utc::now(),
            last_login: None,
        }
    }

    fn profile() -> UserProfile {
        UserProfile {
            user_id: Uuid::new_v4(),
            email_verified: false,
            email_verified_at: None,
            phone_number: None,
            bio: None,
            birth_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_completion_empty() {
        assert_eq!(profile().completion(&user("", "")), 0);
    }

    #[test]
    fn test_completion_partial() {
        let mut p = profile();
        p.email_verified = true;
        // names + verified email = 3 of 6
        assert_eq!(p.completion(&user("Jane", "Doe")), 50);

        p.phone_number = Some("5551234567".to_string());
        assert_eq!(p.completion(&user("Jane", "Doe")), 66);
    }

    #[test]
    fn test_completion_ignores_blank_strings() {
        let mut p = profile();
        p.bio = Some("   ".to_string());
        p.phone_number = Some(String::new());
        assert_eq!(p.completion(&user(" ", "")), 0);
    }

    #[test]
    fn test_completion_full() {
        let mut p = profile();
        p.email_verified = true;
        p.phone_number = Some("5551234567".to_string());
        p.bio = Some("Collector of things".to_string());
        p.birth_date = NaiveDate::from_ymd_opt(1990, 5, 17);
        assert_eq!(p.completion(&user("Jane", "Doe")), 100);
    }

    #[test]
    fn test_update_profile_is_empty() {
        assert!(UpdateProfile::default().is_empty());
        assert!(!UpdateProfile {
            bio: Some(None),
            ..Default::default()
        }
        .is_empty());
    }
}
