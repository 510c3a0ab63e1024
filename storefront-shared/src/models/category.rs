/// Category model and database operations
///
/// Categories form a shallow tree via `parent_id`. Deleting a category
/// deletes its subcategories; products in it keep existing with
/// `category_id` set to NULL.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE categories (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL UNIQUE,
///     slug VARCHAR(120) NOT NULL UNIQUE,
///     description TEXT NOT NULL DEFAULT '',
///     parent_id UUID REFERENCES categories(id) ON DELETE CASCADE,
///     image_url VARCHAR(512),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     sort_order INTEGER NOT NULL DEFAULT 0 CHECK (sort_order >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::catalog::query::{escape_like, CategoryQuery};
use crate::catalog::slug::{first_free_slug, slugify, CATEGORY_SLUG_MAX};
use crate::catalog::tree::{CategoryNode, CategoryTree};
use crate::catalog::FieldError;
use crate::db::is_unique_violation;

pub const NAME_MAX: usize = 100;

/// Slug collisions retried before giving up
const CREATE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Every editable category field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub description: String,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parent_id: None,
            image_url: None,
            is_active: true,
            sort_order: 0,
        }
    }

    pub fn from_category(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            description: category.description.clone(),
            parent_id: category.parent_id,
            image_url: category.image_url.clone(),
            is_active: category.is_active,
            sort_order: category.sort_order,
        }
    }

    /// Field checks that need no database access
    ///
    /// Parent existence and cycles are checked against a [`CategoryTree`].
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FieldError::new("name", "This field may not be blank."));
        } else if name.chars().count() > NAME_MAX {
            errors.push(FieldError::new(
                "name",
                format!("Ensure this field has no more than {} characters.", NAME_MAX),
            ));
        }
        if self.sort_order < 0 {
            errors.push(FieldError::new("sort_order", "Ensure this value is greater than or equal to 0."));
        }
        if let Some(url) = &self.image_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) || url.len() > 512 {
                errors.push(FieldError::new("image_url", "Enter a valid URL."));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

const CATEGORY_COLUMNS: &str =
    "c.id, c.name, c.slug, c.description, c.parent_id, c.image_url, c.is_active, c.sort_order, c.created_at, c.updated_at";

impl Category {
    async fn taken_slugs(pool: &PgPool, base: &str) -> Result<HashSet<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT slug FROM categories WHERE slug = $1 OR slug LIKE $2")
                .bind(base)
                .bind(format!("{}-%", escape_like(base)))
                .fetch_all(pool)
                .await?;

        Ok(rows.into_iter().map(|(slug,)| slug).collect())
    }

    /// Creates a category with a unique slug derived from its name
    ///
    /// Names that differ but slugify alike ("Café", "Cafe") may race for the
    /// same slug; the loser picks the next free suffix and retries.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `categories_name_key` when the name
    /// is taken.
    pub async fn create(pool: &PgPool, draft: CategoryDraft) -> Result<Self, sqlx::Error> {
        let name = draft.name.trim().to_string();
        let base = slugify(&name, CATEGORY_SLUG_MAX);
        let mut last_error = None;

        for _ in 0..CREATE_ATTEMPTS {
            let slug = first_free_slug(&base, &Self::taken_slugs(pool, &base).await?, CATEGORY_SLUG_MAX);

            match Self::insert(pool, &name, &slug, &draft).await {
                Ok(category) => return Ok(category),
                Err(e) if is_unique_violation(&e, "categories_slug_key") => {
                    tracing::debug!(slug = %slug, "Category slug collision, retrying");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(sqlx::Error::RowNotFound))
    }

    async fn insert(pool: &PgPool, name: &str, slug: &str, draft: &CategoryDraft) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories AS c (name, slug, description, parent_id, image_url, is_active, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(name)
        .bind(slug)
        .bind(&draft.description)
        .bind(draft.parent_id)
        .bind(&draft.image_url)
        .bind(draft.is_active)
        .bind(draft.sort_order)
        .fetch_one(pool)
        .await
    }

    /// Replaces every editable field
    ///
    /// The slug is assigned once at creation and kept across renames, so
    /// existing links stay valid.
    pub async fn update(pool: &PgPool, id: Uuid, draft: CategoryDraft) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories c
            SET name = $2, description = $3, parent_id = $4, image_url = $5,
                is_active = $6, sort_order = $7, updated_at = NOW()
            WHERE c.id = $1
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(draft.name.trim())
        .bind(draft.description)
        .bind(draft.parent_id)
        .bind(draft.image_url)
        .bind(draft.is_active)
        .bind(draft.sort_order)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a category and, by cascade, its subcategories
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories c WHERE c.id = $1",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a category by slug, active or not
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories c WHERE c.slug = $1",
            CATEGORY_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(pool)
        .await
    }

    /// Finds an active category by slug
    pub async fn find_active_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories c WHERE c.slug = $1 AND c.is_active",
            CATEGORY_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(pool)
        .await
    }

    /// Whether an active category with this ID exists
    pub async fn is_active_id(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1 AND is_active)")
                .bind(id)
                .fetch_one(pool)
                .await?;

        Ok(exists.0)
    }

    /// Runs a category list query
    pub async fn list(pool: &PgPool, query: &CategoryQuery) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM categories c", CATEGORY_COLUMNS));
        query.push_where(&mut builder);
        builder.push(" ORDER BY ").push(query.order_by());

        builder.build_query_as::<Category>().fetch_all(pool).await
    }

    /// Active children of any of the given categories, in display order
    pub async fn active_children(pool: &PgPool, parent_ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories c WHERE c.parent_id = ANY($1) AND c.is_active \
             ORDER BY c.sort_order ASC, c.name ASC, c.id ASC",
            CATEGORY_COLUMNS
        ))
        .bind(parent_ids)
        .fetch_all(pool)
        .await
    }

    /// Number of active products per category
    pub async fn active_product_counts(
        pool: &PgPool,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT category_id, COUNT(*)
            FROM products
            WHERE status = 'active' AND category_id = ANY($1)
            GROUP BY category_id
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Loads the whole parent map
    pub async fn tree(pool: &PgPool) -> Result<CategoryTree, sqlx::Error> {
        let nodes = sqlx::query_as::<_, CategoryNode>("SELECT id, parent_id, name FROM categories")
            .fetch_all(pool)
            .await?;

        Ok(CategoryTree::new(nodes))
    }
}
