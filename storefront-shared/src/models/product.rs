/// Product model and database operations
///
/// Products belong to the user who created them. Slug and SKU are derived
/// once at creation and never change; everything else is edited through a
/// [`ProductDraft`], which is validated as a whole so cross-field rules see
/// the merged values of a partial update.
///
/// # Schema
///
/// See `migrations/20250101000004_create_products.sql`. Money columns are
/// `NUMERIC(10,2)` and map to `rust_decimal::Decimal`.
///
/// # Example
///
/// ```no_run
/// use storefront_shared::models::product::{Product, ProductDraft};
/// use rust_decimal::Decimal;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner_id: Uuid) -> Result<(), sqlx::Error> {
/// let draft = ProductDraft::new("Desk Lamp", Decimal::new(3999, 2));
/// let product = Product::create(&pool, owner_id, draft).await?;
/// assert!(product.sku.starts_with("PRD-"));
/// # Ok(())
/// # }
/// ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::catalog::inventory::StockLevel;
use crate::catalog::pricing;
use crate::catalog::query::{escape_like, ProductQuery};
use crate::catalog::slug::{first_free_slug, generate_sku, slugify, PRODUCT_SLUG_MAX};
use crate::catalog::FieldError;
use crate::db::is_unique_violation;

/// Image shown when a product has none
pub const PLACEHOLDER_IMAGE_URL: &str = "https://picsum.photos/seed/storefront/300/200";

pub const NAME_MAX: usize = 200;
pub const SHORT_DESCRIPTION_MAX: usize = 300;
pub const TAGS_MAX: usize = 500;
pub const META_TITLE_MAX: usize = 70;
pub const META_DESCRIPTION_MAX: usize = 160;
pub const URL_MAX: usize = 512;

/// Largest value a `NUMERIC(10,2)` column holds
const PRICE_LIMIT: i64 = 100_000_000;

/// Largest value a `NUMERIC(8,2)` column holds
const MEASURE_LIMIT: i64 = 1_000_000;

/// How many times create retries after a slug or SKU collision
const CREATE_ATTEMPTS: usize = 5;

/// Publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
    Inactive,
    Discontinued,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::Discontinued => "discontinued",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ProductStatus::Draft),
            "active" => Some(ProductStatus::Active),
            "inactive" => Some(ProductStatus::Inactive),
            "discontinued" => Some(ProductStatus::Discontinued),
            _ => None,
        }
    }
}

impl Default for ProductStatus {
    fn default() -> Self {
        ProductStatus::Active
    }
}

/// Product row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub short_description: String,
    pub category_id: Option<Uuid>,
    /// Comma-separated
    pub tags: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub track_inventory: bool,
    pub allow_backorder: bool,
    pub weight: Option<Decimal>,
    pub dimensions_length: Option<Decimal>,
    pub dimensions_width: Option<Decimal>,
    pub dimensions_height: Option<Decimal>,
    pub image_url: Option<String>,
    pub meta_title: String,
    pub meta_description: String,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub is_digital: bool,
    pub requires_shipping: bool,
    pub view_count: i32,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// First time the product became active
    pub published_at: Option<DateTime<Utc>>,
}

/// A product joined with the names shown next to it in listings
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductListing {
    #[sqlx(flatten)]
    pub product: Product,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub owner_username: String,
    pub primary_image_url: Option<String>,
}

impl ProductListing {
    /// Explicit image URL, else the primary gallery image, else a placeholder
    pub fn display_image(&self) -> String {
        self.product
            .image_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or(self.primary_image_url.as_deref())
            .unwrap_or(PLACEHOLDER_IMAGE_URL)
            .to_string()
    }
}

/// Aggregate figures over one owner's products
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductStats {
    pub total_products: i64,
    pub active_products: i64,
    pub featured_products: i64,
    pub out_of_stock: i64,
    pub low_stock: i64,
    /// Sum of list prices
    pub total_value: Decimal,
    pub avg_price: Decimal,
    pub total_views: i64,
}

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.sku, p.description, p.short_description, \
    p.category_id, p.tags, p.price, p.compare_at_price, p.cost_price, p.stock_quantity, \
    p.low_stock_threshold, p.track_inventory, p.allow_backorder, p.weight, p.dimensions_length, \
    p.dimensions_width, p.dimensions_height, p.image_url, p.meta_title, p.meta_description, \
    p.status, p.is_featured, p.is_digital, p.requires_shipping, p.view_count, p.owner_id, \
    p.created_at, p.updated_at, p.published_at";

fn listing_select() -> String {
    format!(
        "SELECT {}, c.name AS category_name, c.slug AS category_slug, \
         u.username AS owner_username, \
         (SELECT pi.image_url FROM product_images pi \
          WHERE pi.product_id = p.id AND pi.is_primary AND pi.is_active LIMIT 1) AS primary_image_url \
         FROM products p \
         LEFT JOIN categories c ON c.id = p.category_id \
         JOIN users u ON u.id = p.owner_id",
        PRODUCT_COLUMNS
    )
}

/// Every editable product field
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub short_description: String,
    pub category_id: Option<Uuid>,
    pub tags: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub track_inventory: bool,
    pub allow_backorder: bool,
    pub weight: Option<Decimal>,
    pub dimensions_length: Option<Decimal>,
    pub dimensions_width: Option<Decimal>,
    pub dimensions_height: Option<Decimal>,
    pub image_url: Option<String>,
    pub meta_title: String,
    pub meta_description: String,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub is_digital: bool,
    pub requires_shipping: bool,
}

impl ProductDraft {
    /// A draft with column defaults for everything but name and price
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            short_description: String::new(),
            category_id: None,
            tags: String::new(),
            price,
            compare_at_price: None,
            cost_price: None,
            stock_quantity: 0,
            low_stock_threshold: 5,
            track_inventory: true,
            allow_backorder: false,
            weight: None,
            dimensions_length: None,
            dimensions_width: None,
            dimensions_height: None,
            image_url: None,
            meta_title: String::new(),
            meta_description: String::new(),
            status: ProductStatus::Active,
            is_featured: false,
            is_digital: false,
            requires_shipping: true,
        }
    }

    /// The current editable state of a product
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            short_description: product.short_description.clone(),
            category_id: product.category_id,
            tags: product.tags.clone(),
            price: product.price,
            compare_at_price: product.compare_at_price,
            cost_price: product.cost_price,
            stock_quantity: product.stock_quantity,
            low_stock_threshold: product.low_stock_threshold,
            track_inventory: product.track_inventory,
            allow_backorder: product.allow_backorder,
            weight: product.weight,
            dimensions_length: product.dimensions_length,
            dimensions_width: product.dimensions_width,
            dimensions_height: product.dimensions_height,
            image_url: product.image_url.clone(),
            meta_title: product.meta_title.clone(),
            meta_description: product.meta_description.clone(),
            status: product.status,
            is_featured: product.is_featured,
            is_digital: product.is_digital,
            requires_shipping: product.requires_shipping,
        }
    }

    /// The draft for "duplicate": a zero-stock draft named "<name> (Copy)"
    ///
    /// Merchandising fields (image, SEO text, featured flag) are not copied.
    pub fn duplicate_of(product: &Product) -> Self {
        let mut draft = Self::from_product(product);
        draft.name = copy_name(&product.name);
        draft.stock_quantity = 0;
        draft.status = ProductStatus::Draft;
        draft.image_url = None;
        draft.meta_title = String::new();
        draft.meta_description = String::new();
        draft.is_featured = false;
        draft
    }

    /// Trims text and fills derived defaults (meta title from the name)
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.tags = self.tags.trim().to_string();
        self.image_url = self
            .image_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if self.meta_title.trim().is_empty() {
            self.meta_title = self.name.chars().take(META_TITLE_MAX).collect();
        }
        self
    }

    /// Checks every field and cross-field rule, collecting all failures
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "This field may not be blank."));
        }
        check_len(&mut errors, "name", &self.name, NAME_MAX);
        check_len(&mut errors, "short_description", &self.short_description, SHORT_DESCRIPTION_MAX);
        check_len(&mut errors, "tags", &self.tags, TAGS_MAX);
        check_len(&mut errors, "meta_title", &self.meta_title, META_TITLE_MAX);
        check_len(&mut errors, "meta_description", &self.meta_description, META_DESCRIPTION_MAX);

        if let Some(url) = &self.image_url {
            check_len(&mut errors, "image_url", url, URL_MAX);
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(FieldError::new("image_url", "Enter a valid URL."));
            }
        }

        let min_price = Decimal::new(1, 2);
        check_money(&mut errors, "price", self.price, PRICE_LIMIT);
        if self.price < min_price {
            errors.push(FieldError::new("price", "Price must be at least 0.01."));
        }

        if let Some(compare) = self.compare_at_price {
            check_money(&mut errors, "compare_at_price", compare, PRICE_LIMIT);
            if compare <= self.price {
                errors.push(FieldError::new(
                    "compare_at_price",
                    "Compare at price must be higher than regular price.",
                ));
            }
        }

        if let Some(cost) = self.cost_price {
            check_money(&mut errors, "cost_price", cost, PRICE_LIMIT);
            if cost < Decimal::ZERO {
                errors.push(FieldError::new("cost_price", "Cost price cannot be negative."));
            } else if cost > self.price {
                errors.push(FieldError::new(
                    "cost_price",
                    "Cost price should not exceed selling price.",
                ));
            }
        }

        if self.stock_quantity < 0 {
            errors.push(FieldError::new("stock_quantity", "Stock quantity cannot be negative."));
        }
        if self.low_stock_threshold < 0 {
            errors.push(FieldError::new(
                "low_stock_threshold",
                "Low stock threshold cannot be negative.",
            ));
        }
        if !self.track_inventory && self.stock_quantity > 0 {
            errors.push(FieldError::new(
                "stock_quantity",
                "Stock quantity must be 0 when inventory tracking is disabled.",
            ));
        }

        for (field, value) in [
            ("weight", self.weight),
            ("dimensions_length", self.dimensions_length),
            ("dimensions_width", self.dimensions_width),
            ("dimensions_height", self.dimensions_height),
        ] {
            if let Some(value) = value {
                check_money(&mut errors, field, value, MEASURE_LIMIT);
                if value < min_price {
                    errors.push(FieldError::new(field, "Ensure this value is at least 0.01."));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn check_len(errors: &mut Vec<FieldError>, field: &'static str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.push(FieldError::new(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        ));
    }
}

fn check_money(errors: &mut Vec<FieldError>, field: &'static str, value: Decimal, limit: i64) {
    if value.normalize().scale() > 2 {
        errors.push(FieldError::new(
            field,
            "Ensure that there are no more than 2 decimal places.",
        ));
    }
    if value.abs() >= Decimal::from(limit) {
        errors.push(FieldError::new(field, "Ensure this value is not too large."));
    }
}

/// "<name> (Copy)", shortening the name so the result fits the column
pub fn copy_name(name: &str) -> String {
    const SUFFIX: &str = " (Copy)";
    let room = NAME_MAX - SUFFIX.chars().count();
    let base: String = name.trim().chars().take(room).collect();
    format!("{}{}", base.trim_end(), SUFFIX)
}

/// Splits the comma-separated tag string
pub fn tags_list(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    pub fn stock_level(&self) -> StockLevel {
        StockLevel {
            stock_quantity: self.stock_quantity,
            low_stock_threshold: self.low_stock_threshold,
            track_inventory: self.track_inventory,
            allow_backorder: self.allow_backorder,
        }
    }

    pub fn discount_percentage(&self) -> Option<i64> {
        pricing::discount_percentage(self.price, self.compare_at_price)
    }

    pub fn profit_margin(&self) -> Option<Decimal> {
        pricing::profit_margin(self.price, self.cost_price)
    }

    pub fn profit_percentage(&self) -> Option<i64> {
        pricing::profit_percentage(self.price, self.cost_price)
    }

    /// "L × W × H cm" when all three dimensions are set
    pub fn dimensions(&self) -> Option<String> {
        match (self.dimensions_length, self.dimensions_width, self.dimensions_height) {
            (Some(l), Some(w), Some(h)) => Some(format!("{} × {} × {} cm", l, w, h)),
            _ => None,
        }
    }

    pub fn tags_list(&self) -> Vec<String> {
        tags_list(&self.tags)
    }

    async fn taken_slugs(pool: &PgPool, base: &str) -> Result<HashSet<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT slug FROM products WHERE slug = $1 OR slug LIKE $2")
                .bind(base)
                .bind(format!("{}-%", escape_like(base)))
                .fetch_all(pool)
                .await?;

        Ok(rows.into_iter().map(|(slug,)| slug).collect())
    }

    /// Creates a product owned by `owner_id`
    ///
    /// The slug is derived from the name (suffixed `-2`, `-3`, ... when
    /// taken) and the SKU is random; both are regenerated if a concurrent
    /// insert claims them first. The draft should already be validated.
    pub async fn create(pool: &PgPool, owner_id: Uuid, draft: ProductDraft) -> Result<Self, sqlx::Error> {
        let draft = draft.normalized();
        let base = slugify(&draft.name, PRODUCT_SLUG_MAX);
        let mut last_error = None;

        for _ in 0..CREATE_ATTEMPTS {
            let slug = first_free_slug(&base, &Self::taken_slugs(pool, &base).await?, PRODUCT_SLUG_MAX);
            let sku = generate_sku();

            match Self::insert(pool, owner_id, &slug, &sku, &draft).await {
                Ok(product) => return Ok(product),
                Err(e)
                    if is_unique_violation(&e, "products_slug_key")
                        || is_unique_violation(&e, "products_sku_key") =>
                {
                    tracing::debug!(slug = %slug, sku = %sku, "Product identifier collision, retrying");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(sqlx::Error::RowNotFound))
    }

    async fn insert(
        pool: &PgPool,
        owner_id: Uuid,
        slug: &str,
        sku: &str,
        draft: &ProductDraft,
    ) -> Result<Self, sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO products AS p (slug, sku, owner_id, published_at, name, description, \
             short_description, category_id, tags, price, compare_at_price, cost_price, \
             stock_quantity, low_stock_threshold, track_inventory, allow_backorder, weight, \
             dimensions_length, dimensions_width, dimensions_height, image_url, meta_title, \
             meta_description, status, is_featured, is_digital, requires_shipping) VALUES (",
        );

        let published_at = (draft.status == ProductStatus::Active).then(Utc::now);

        {
            let mut values = builder.separated(", ");
            values
                .push_bind(slug.to_string())
                .push_bind(sku.to_string())
                .push_bind(owner_id)
                .push_bind(published_at);
            push_draft_values(&mut values, draft);
        }

        builder.push(") RETURNING ").push(PRODUCT_COLUMNS);

        builder.build_query_as::<Product>().fetch_one(pool).await
    }

    /// Replaces every editable field
    ///
    /// Sets `published_at` the first time the status becomes active.
    pub async fn update(pool: &PgPool, id: Uuid, draft: ProductDraft) -> Result<Option<Self>, sqlx::Error> {
        let draft = draft.normalized();

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products p SET
                name = $2, description = $3, short_description = $4, category_id = $5,
                tags = $6, price = $7, compare_at_price = $8, cost_price = $9,
                stock_quantity = $10, low_stock_threshold = $11, track_inventory = $12,
                allow_backorder = $13, weight = $14, dimensions_length = $15,
                dimensions_width = $16, dimensions_height = $17, image_url = $18,
                meta_title = $19, meta_description = $20, status = $21, is_featured = $22,
                is_digital = $23, requires_shipping = $24,
                published_at = CASE
                    WHEN p.published_at IS NULL AND $21 = 'active'::product_status THEN NOW()
                    ELSE p.published_at
                END,
                updated_at = NOW()
            WHERE p.id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(draft.name)
        .bind(draft.description)
        .bind(draft.short_description)
        .bind(draft.category_id)
        .bind(draft.tags)
        .bind(draft.price)
        .bind(draft.compare_at_price)
        .bind(draft.cost_price)
        .bind(draft.stock_quantity)
        .bind(draft.low_stock_threshold)
        .bind(draft.track_inventory)
        .bind(draft.allow_backorder)
        .bind(draft.weight)
        .bind(draft.dimensions_length)
        .bind(draft.dimensions_width)
        .bind(draft.dimensions_height)
        .bind(draft.image_url)
        .bind(draft.meta_title)
        .bind(draft.meta_description)
        .bind(draft.status)
        .bind(draft.is_featured)
        .bind(draft.is_digital)
        .bind(draft.requires_shipping)
        .fetch_optional(pool)
        .await?;

        Ok(product)
    }

    /// Finds one of the owner's products by slug
    pub async fn find_owned_by_slug(
        pool: &PgPool,
        owner_id: Uuid,
        slug: &str,
    ) -> Result<Option<ProductListing>, sqlx::Error> {
        let sql = format!("{} WHERE p.slug = $1 AND p.owner_id = $2", listing_select());

        sqlx::query_as::<_, ProductListing>(&sql)
            .bind(slug)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Finds an active product by slug
    pub async fn find_published_by_slug(
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<ProductListing>, sqlx::Error> {
        let sql = format!("{} WHERE p.slug = $1 AND p.status = 'active'", listing_select());

        sqlx::query_as::<_, ProductListing>(&sql)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Loads a product with its listing columns by ID
    pub async fn find_listing_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ProductListing>, sqlx::Error> {
        let sql = format!("{} WHERE p.id = $1", listing_select());

        sqlx::query_as::<_, ProductListing>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Runs a list query, returning the page rows and the total match count
    pub async fn search(pool: &PgPool, query: &ProductQuery) -> Result<(Vec<ProductListing>, i64), sqlx::Error> {
        let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM products p LEFT JOIN categories c ON c.id = p.category_id",
        );
        query.push_where(&mut count_builder);
        let (count,): (i64,) = count_builder.build_query_as().fetch_one(pool).await?;

        if count == 0 || query.pagination.offset() >= count {
            return Ok((Vec::new(), count));
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(listing_select());
        query.push_where(&mut builder);
        query.push_order_and_page(&mut builder);
        let rows = builder.build_query_as::<ProductListing>().fetch_all(pool).await?;

        Ok((rows, count))
    }

    /// Active featured products, newest first
    pub async fn featured(pool: &PgPool, limit: i64) -> Result<Vec<ProductListing>, sqlx::Error> {
        let sql = format!(
            "{} WHERE p.status = 'active' AND p.is_featured ORDER BY p.created_at DESC, p.id ASC LIMIT $1",
            listing_select()
        );

        sqlx::query_as::<_, ProductListing>(&sql)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// The owner's active, tracked products at or below their threshold
    pub async fn low_stock_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<ProductListing>, sqlx::Error> {
        let sql = format!(
            "{} WHERE p.owner_id = $1 AND p.status = 'active' AND p.track_inventory \
             AND p.stock_quantity > 0 AND p.stock_quantity <= p.low_stock_threshold \
             ORDER BY p.stock_quantity ASC, p.id ASC",
            listing_select()
        );

        sqlx::query_as::<_, ProductListing>(&sql)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Aggregate statistics over the owner's products
    pub async fn stats_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<ProductStats, sqlx::Error> {
        sqlx::query_as::<_, ProductStats>(
            r#"
            SELECT
                COUNT(*) AS total_products,
                COUNT(*) FILTER (WHERE status = 'active') AS active_products,
                COUNT(*) FILTER (WHERE is_featured) AS featured_products,
                COUNT(*) FILTER (WHERE track_inventory AND stock_quantity = 0) AS out_of_stock,
                COUNT(*) FILTER (
                    WHERE track_inventory AND stock_quantity > 0
                      AND stock_quantity <= low_stock_threshold
                ) AS low_stock,
                COALESCE(SUM(price), 0)::NUMERIC AS total_value,
                COALESCE(ROUND(AVG(price), 2), 0)::NUMERIC AS avg_price,
                COALESCE(SUM(view_count), 0)::BIGINT AS total_views
            FROM products
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_one(pool)
        .await
    }

    /// Deletes one of the owner's products
    pub async fn delete(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically bumps the view counter
    pub async fn increment_view_count(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE products SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets an absolute stock level
    ///
    /// Returns `None` when the product is missing, or does not track
    /// inventory and `quantity` is not 0. The caller validates
    /// `quantity >= 0`; the column check backs it up.
    pub async fn set_stock(pool: &PgPool, id: Uuid, quantity: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products p
            SET stock_quantity = $2, updated_at = NOW()
            WHERE p.id = $1 AND (p.track_inventory OR $2 = 0)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(pool)
        .await
    }

    /// Removes `quantity` units in one guarded statement
    ///
    /// Returns `None` when the product tracks inventory and has fewer than
    /// `quantity` units; stock is never driven below zero. Untracked
    /// products are returned unchanged.
    pub async fn reduce_stock(pool: &PgPool, id: Uuid, quantity: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products p
            SET stock_quantity = CASE WHEN p.track_inventory THEN p.stock_quantity - $2 ELSE p.stock_quantity END,
                updated_at = NOW()
            WHERE p.id = $1 AND (NOT p.track_inventory OR p.stock_quantity >= $2)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(pool)
        .await
    }

    /// Adds `quantity` units to a tracked product
    ///
    /// Returns `None` when the product is missing or the new level would not
    /// fit the `INTEGER` column. Untracked products are returned unchanged.
    pub async fn increase_stock(pool: &PgPool, id: Uuid, quantity: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products p
            SET stock_quantity = CASE WHEN p.track_inventory THEN p.stock_quantity + $2 ELSE p.stock_quantity END,
                updated_at = NOW()
            WHERE p.id = $1 AND (NOT p.track_inventory OR p.stock_quantity <= 2147483647 - $2)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(pool)
        .await
    }
}

fn push_draft_values(values: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>, draft: &ProductDraft) {
    values
        .push_bind(draft.name.clone())
        .push_bind(draft.description.clone())
        .push_bind(draft.short_description.clone())
        .push_bind(draft.category_id)
        .push_bind(draft.tags.clone())
        .push_bind(draft.price)
        .push_bind(draft.compare_at_price)
        .push_bind(draft.cost_price)
        .push_bind(draft.stock_quantity)
        .push_bind(draft.low_stock_threshold)
        .push_bind(draft.track_inventory)
        .push_bind(draft.allow_backorder)
        .push_bind(draft.weight)
        .push_bind(draft.dimensions_length)
        .push_bind(draft.dimensions_width)
        .push_bind(draft.dimensions_height)
        .push_bind(draft.image_url.clone())
        .push_bind(draft.meta_title.clone())
        .push_bind(draft.meta_description.clone())
        .push_bind(draft.status)
        .push_bind(draft.is_featured)
        .push_bind(draft.is_digital)
        .push_bind(draft.requires_shipping);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn product() -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            name: "Desk Lamp".to_string(),
            slug: "desk-lamp".to_string(),
            sku: "PRD-0A1B2C3D".to_string(),
            description: String::new(),
            short_description: String::new(),
            category_id: None,
            tags: "home, lighting,,".to_string(),
            price: d("40.00"),
            compare_at_price: Some(d("50.00")),
            cost_price: Some(d("30.00")),
            stock_quantity: 3,
            low_stock_threshold: 5,
            track_inventory: true,
            allow_backorder: false,
            weight: None,
            dimensions_length: Some(d("10.00")),
            dimensions_width: Some(d("20.00")),
            dimensions_height: Some(d("30.00")),
            image_url: None,
            meta_title: "Desk Lamp".to_string(),
            meta_description: String::new(),
            status: ProductStatus::Active,
            is_featured: true,
            is_digital: false,
            requires_shipping: true,
            view_count: 7,
            owner_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            published_at: Some(now),
        }
    }

    fn listing(image_url: Option<&str>, primary: Option<&str>) -> ProductListing {
        let mut product = product();
        product.image_url = image_url.map(str::to_string);
        ProductListing {
            product,
            category_name: None,
            category_slug: None,
            owner_username: "seller".to_string(),
            primary_image_url: primary.map(str::to_string),
        }
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ProductStatus::Draft,
            ProductStatus::Active,
            ProductStatus::Inactive,
            ProductStatus::Discontinued,
        ] {
            assert_eq!(ProductStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ProductStatus::default(), ProductStatus::Active);
    }

    #[test]
    fn test_derived_fields() {
        let p = product();
        assert_eq!(p.discount_percentage(), Some(20));
        assert_eq!(p.profit_margin(), Some(d("10.00")));
        assert_eq!(p.profit_percentage(), Some(33));
        assert_eq!(p.dimensions().as_deref(), Some("10.00 × 20.00 × 30.00 cm"));
        assert_eq!(p.tags_list(), vec!["home", "lighting"]);
        assert!(p.stock_level().is_low_stock());
    }

    #[test]
    fn test_dimensions_require_all_three() {
        let mut p = product();
        p.dimensions_height = None;
        assert_eq!(p.dimensions(), None);
    }

    #[test]
    fn test_display_image_fallbacks() {
        assert_eq!(
            listing(Some("https://cdn.example.com/a.jpg"), Some("https://cdn.example.com/b.jpg")).display_image(),
            "https://cdn.example.com/a.jpg"
        );
        assert_eq!(
            listing(None, Some("https://cdn.example.com/b.jpg")).display_image(),
            "https://cdn.example.com/b.jpg"
        );
        assert_eq!(listing(None, None).display_image(), PLACEHOLDER_IMAGE_URL);
    }

    #[test]
    fn test_draft_defaults_meta_title() {
        let draft = ProductDraft::new(format!("  {}  ", "x".repeat(100)), d("1.00")).normalized();
        assert_eq!(draft.name.len(), 100);
        assert_eq!(draft.meta_title.len(), META_TITLE_MAX);
    }

    #[test]
    fn test_draft_validate_ok() {
        let draft = ProductDraft::from_product(&product());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_draft_cross_field_rules() {
        let mut draft = ProductDraft::new("Lamp", d("10.00"));
        draft.compare_at_price = Some(d("10.00"));
        draft.cost_price = Some(d("12.00"));
        draft.track_inventory = false;
        draft.stock_quantity = 4;

        let errors = draft.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["compare_at_price", "cost_price", "stock_quantity"]);
    }

    #[test]
    fn test_draft_field_rules() {
        let mut draft = ProductDraft::new(" ", d("0.001"));
        draft.meta_title = "m".repeat(71);
        draft.image_url = Some("ftp://example.com/x.png".to_string());
        draft.weight = Some(d("0"));
        draft.low_stock_threshold = -1;

        let errors = draft.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"meta_title"));
        assert!(fields.contains(&"image_url"));
        assert!(fields.contains(&"price"));
        assert!(fields.contains(&"weight"));
        assert!(fields.contains(&"low_stock_threshold"));
    }

    #[test]
    fn test_duplicate_draft() {
        let original = product();
        let draft = ProductDraft::duplicate_of(&original);

        assert_eq!(draft.name, "Desk Lamp (Copy)");
        assert_eq!(draft.stock_quantity, 0);
        assert_eq!(draft.status, ProductStatus::Draft);
        assert!(!draft.is_featured);
        assert_eq!(draft.price, original.price);
        assert!(draft.meta_title.is_empty());
    }

    #[test]
    fn test_copy_name_fits_column() {
        let name = copy_name(&"n".repeat(NAME_MAX));
        assert_eq!(name.chars().count(), NAME_MAX);
        assert!(name.ends_with(" (Copy)"));
    }
}
