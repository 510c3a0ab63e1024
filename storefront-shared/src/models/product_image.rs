/// Product gallery images
///
/// Images are referenced by URL. A product has at most one primary image,
/// enforced by the partial unique index `product_images_primary_key`; the
/// functions here clear the old primary in the same transaction before
/// setting a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub const ALT_TEXT_MAX: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image_url: String,
    pub alt_text: String,
    pub sort_order: i32,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for adding an image
#[derive(Debug, Clone)]
pub struct NewProductImage {
    pub image_url: String,
    pub alt_text: String,
    pub sort_order: i32,
    pub is_primary: bool,
}

async fn clear_primary(conn: &mut PgConnection, product_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE product_images SET is_primary = FALSE WHERE product_id = $1 AND is_primary")
        .bind(product_id)
        .execute(conn)
        .await?;

    Ok(())
}

impl ProductImage {
    /// Active images in display order
    pub async fn list_for_product(pool: &PgPool, product_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProductImage>(
            r#"
            SELECT id, product_id, image_url, alt_text, sort_order, is_primary, is_active, created_at
            FROM product_images
            WHERE product_id = $1 AND is_active
            ORDER BY sort_order ASC, created_at ASC, id ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(pool)
        .await
    }

    /// Adds an image, demoting the current primary if this one is primary
    pub async fn create(pool: &PgPool, product_id: Uuid, data: NewProductImage) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if data.is_primary {
            clear_primary(&mut tx, product_id).await?;
        }

        let image = sqlx::query_as::<_, ProductImage>(
            r#"
            INSERT INTO product_images (product_id, image_url, alt_text, sort_order, is_primary)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, product_id, image_url, alt_text, sort_order, is_primary, is_active, created_at
            "#,
        )
        .bind(product_id)
        .bind(data.image_url)
        .bind(data.alt_text)
        .bind(data.sort_order)
        .bind(data.is_primary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(image)
    }

    /// Makes an image the product's primary image
    ///
    /// Returns `None` if the image does not belong to the product.
    pub async fn set_primary(
        pool: &PgPool,
        product_id: Uuid,
        image_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        clear_primary(&mut tx, product_id).await?;

        let image = sqlx::query_as::<_, ProductImage>(
            r#"
            UPDATE product_images
            SET is_primary = TRUE
            WHERE id = $1 AND product_id = $2
            RETURNING id, product_id, image_url, alt_text, sort_order, is_primary, is_active, created_at
            "#,
        )
        .bind(image_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        if image.is_some() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }

        Ok(image)
    }

    /// Removes an image from a product
    pub async fn delete(pool: &PgPool, product_id: Uuid, image_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM product_images WHERE id = $1 AND product_id = $2")
            .bind(image_id)
            .bind(product_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
