/// Product management endpoints
///
/// All routes require a JWT and only ever see the caller's own products;
/// another user's product answers 404 exactly like a missing one.
///
/// # Endpoints
///
/// - `GET|POST /v1/products` - List (filters, search, ordering) / create
/// - `GET|PUT|PATCH|DELETE /v1/products/:slug` - Detail / update / delete
/// - `POST /v1/products/:slug/duplicate` - Copy as a draft
/// - `PATCH /v1/products/:slug/stock` - Set absolute stock
/// - `POST /v1/products/:slug/stock/reduce|increase` - Relative stock change
/// - `GET|POST /v1/products/:slug/images` - Gallery
/// - `DELETE /v1/products/:slug/images/:image_id`
/// - `POST /v1/products/:slug/images/:image_id/primary`
/// - `GET /v1/stats` - Owner statistics
/// - `GET /v1/low-stock-alerts` - Owner low-stock list

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{nullable, MessageResponse},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use storefront_shared::{
    auth::middleware::AuthContext,
    catalog::{
        inventory::{validate_stock_quantity, InventoryError, StockLevel},
        query::{Page, ProductListParams, ProductQuery},
        FieldError,
    },
    models::{
        category::Category,
        product::{Product, ProductDraft, ProductListing, ProductStats, ProductStatus},
        product_image::{NewProductImage, ProductImage, ALT_TEXT_MAX},
    },
};
use uuid::Uuid;

/// Row in a product list
#[derive(Debug, Serialize)]
pub struct ProductListItem {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub short_description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub discount_percentage: Option<i64>,
    pub stock_quantity: i32,
    pub is_featured: bool,
    pub status: ProductStatus,
    pub display_image: String,
    pub view_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub owner_username: String,
    pub is_in_stock: bool,
    pub is_low_stock: bool,
}

impl From<ProductListing> for ProductListItem {
    fn from(listing: ProductListing) -> Self {
        let display_image = listing.display_image();
        let stock = listing.product.stock_level();
        let discount_percentage = listing.product.discount_percentage();
        let p = listing.product;

        Self {
            id: p.id,
            name: p.name,
            slug: p.slug,
            sku: p.sku,
            short_description: p.short_description,
            price: p.price,
            compare_at_price: p.compare_at_price,
            discount_percentage,
            stock_quantity: p.stock_quantity,
            is_featured: p.is_featured,
            status: p.status,
            display_image,
            view_count: p.view_count,
            created_at: p.created_at,
            updated_at: p.updated_at,
            category_name: listing.category_name,
            category_slug: listing.category_slug,
            owner_username: listing.owner_username,
            is_in_stock: stock.is_in_stock(),
            is_low_stock: stock.is_low_stock(),
        }
    }
}

/// Category a product belongs to
#[derive(Debug, Serialize)]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Cost figures, shown to the owner only
#[derive(Debug, Serialize)]
pub struct CostView {
    pub cost_price: Option<Decimal>,
    pub profit_margin: Option<Decimal>,
    pub profit_percentage: Option<i64>,
}

/// Gallery image
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub image_url: String,
    pub alt_text: String,
    pub sort_order: i32,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ProductImage> for ImageResponse {
    fn from(image: ProductImage) -> Self {
        Self {
            id: image.id,
            image_url: image.image_url,
            alt_text: image.alt_text,
            sort_order: image.sort_order,
            is_primary: image.is_primary,
            is_active: image.is_active,
            created_at: image.created_at,
        }
    }
}

/// Full product payload
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub short_description: String,
    pub category: Option<CategoryRef>,
    pub category_id: Option<Uuid>,
    pub tags: String,
    pub tags_list: Vec<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub discount_percentage: Option<i64>,
    #[serde(flatten)]
    pub costs: Option<CostView>,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub track_inventory: bool,
    pub allow_backorder: bool,
    pub is_in_stock: bool,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
    pub weight: Option<Decimal>,
    pub dimensions_length: Option<Decimal>,
    pub dimensions_width: Option<Decimal>,
    pub dimensions_height: Option<Decimal>,
    pub dimensions: Option<String>,
    pub image_url: Option<String>,
    pub display_image: String,
    pub meta_title: String,
    pub meta_description: String,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub is_digital: bool,
    pub requires_shipping: bool,
    pub view_count: i32,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub images: Vec<ImageResponse>,
}

impl ProductDetail {
    /// Detail for the product's owner, cost figures included
    pub fn for_owner(listing: ProductListing, images: Vec<ProductImage>) -> Self {
        let costs = CostView {
            cost_price: listing.product.cost_price,
            profit_margin: listing.product.profit_margin(),
            profit_percentage: listing.product.profit_percentage(),
        };
        Self::build(listing, images, Some(costs))
    }

    /// Detail for anonymous shoppers
    pub fn for_public(listing: ProductListing, images: Vec<ProductImage>) -> Self {
        Self::build(listing, images, None)
    }

    fn build(listing: ProductListing, images: Vec<ProductImage>, costs: Option<CostView>) -> Self {
        let display_image = listing.display_image();
        let p = &listing.product;
        let stock = p.stock_level();
        let category = match (p.category_id, &listing.category_name, &listing.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(CategoryRef {
                id,
                name: name.clone(),
                slug: slug.clone(),
            }),
            _ => None,
        };
        let tags_list = p.tags_list();
        let dimensions = p.dimensions();
        let discount_percentage = p.discount_percentage();

        let p = listing.product;
        Self {
            id: p.id,
            name: p.name,
            slug: p.slug,
            sku: p.sku,
            description: p.description,
            short_description: p.short_description,
            category,
            category_id: p.category_id,
            tags: p.tags,
            tags_list,
            price: p.price,
            compare_at_price: p.compare_at_price,
            discount_percentage,
            costs,
            stock_quantity: p.stock_quantity,
            low_stock_threshold: p.low_stock_threshold,
            track_inventory: p.track_inventory,
            allow_backorder: p.allow_backorder,
            is_in_stock: stock.is_in_stock(),
            is_low_stock: stock.is_low_stock(),
            is_out_of_stock: stock.is_out_of_stock(),
            weight: p.weight,
            dimensions_length: p.dimensions_length,
            dimensions_width: p.dimensions_width,
            dimensions_height: p.dimensions_height,
            dimensions,
            image_url: p.image_url,
            display_image,
            meta_title: p.meta_title,
            meta_description: p.meta_description,
            status: p.status,
            is_featured: p.is_featured,
            is_digital: p.is_digital,
            requires_shipping: p.requires_shipping,
            view_count: p.view_count,
            owner: listing.owner_username,
            created_at: p.created_at,
            updated_at: p.updated_at,
            published_at: p.published_at,
            images: images.into_iter().map(ImageResponse::from).collect(),
        }
    }
}

/// Create/update body
///
/// Every field is optional so the same body serves PUT and PATCH; create
/// additionally requires `name` and `price`. Nullable fields distinguish
/// "absent" (keep) from `null` (clear).
#[derive(Debug, Default, Deserialize)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<Uuid>>,
    pub tags: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub compare_at_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    pub cost_price: Option<Option<Decimal>>,
    pub stock_quantity: Option<i32>,
    pub low_stock_threshold: Option<i32>,
    pub track_inventory: Option<bool>,
    pub allow_backorder: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub weight: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    pub dimensions_length: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    pub dimensions_width: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    pub dimensions_height: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub status: Option<String>,
    pub is_featured: Option<bool>,
    pub is_digital: Option<bool>,
    pub requires_shipping: Option<bool>,
}

impl ProductRequest {
    /// A new draft; `name` and `price` are required
    pub fn into_new_draft(self) -> Result<ProductDraft, Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.name.is_none() {
            errors.push(FieldError::new("name", "This field is required."));
        }
        if self.price.is_none() {
            errors.push(FieldError::new("price", "This field is required."));
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut draft = ProductDraft::new(String::new(), Decimal::ZERO);
        self.apply_to(&mut draft)?;
        Ok(draft)
    }

    /// Overlays the supplied fields onto `draft`
    pub fn apply_to(self, draft: &mut ProductDraft) -> Result<(), Vec<FieldError>> {
        if let Some(status) = self.status.as_deref() {
            match ProductStatus::from_str(status.trim()) {
                Some(status) => draft.status = status,
                None => {
                    return Err(vec![FieldError::new(
                        "status",
                        format!("\"{}\" is not a valid choice.", status),
                    )])
                }
            }
        }

        if let Some(value) = self.name {
            draft.name = value;
        }
        if let Some(value) = self.description {
            draft.description = value;
        }
        if let Some(value) = self.short_description {
            draft.short_description = value;
        }
        if let Some(value) = self.category_id {
            draft.category_id = value;
        }
        if let Some(value) = self.tags {
            draft.tags = value;
        }
        if let Some(value) = self.price {
            draft.price = value;
        }
        if let Some(value) = self.compare_at_price {
            draft.compare_at_price = value;
        }
        if let Some(value) = self.cost_price {
            draft.cost_price = value;
        }
        if let Some(value) = self.stock_quantity {
            draft.stock_quantity = value;
        }
        if let Some(value) = self.low_stock_threshold {
            draft.low_stock_threshold = value;
        }
        if let Some(value) = self.track_inventory {
            draft.track_inventory = value;
        }
        if let Some(value) = self.allow_backorder {
            draft.allow_backorder = value;
        }
        if let Some(value) = self.weight {
            draft.weight = value;
        }
        if let Some(value) = self.dimensions_length {
            draft.dimensions_length = value;
        }
        if let Some(value) = self.dimensions_width {
            draft.dimensions_width = value;
        }
        if let Some(value) = self.dimensions_height {
            draft.dimensions_height = value;
        }
        if let Some(value) = self.image_url {
            draft.image_url = value;
        }
        if let Some(value) = self.meta_title {
            draft.meta_title = value;
        }
        if let Some(value) = self.meta_description {
            draft.meta_description = value;
        }
        if let Some(value) = self.is_featured {
            draft.is_featured = value;
        }
        if let Some(value) = self.is_digital {
            draft.is_digital = value;
        }
        if let Some(value) = self.requires_shipping {
            draft.requires_shipping = value;
        }

        Ok(())
    }
}

/// `PATCH /stock` body
#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub stock_quantity: i32,
}

/// `reduce` / `increase` body
#[derive(Debug, Deserialize)]
pub struct StockChangeRequest {
    pub quantity: i32,
}

/// Stock after a change
#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub message: String,
    pub slug: String,
    pub stock_quantity: i32,
    pub is_in_stock: bool,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
}

impl StockResponse {
    fn new(message: impl Into<String>, product: &Product) -> Self {
        let stock: StockLevel = product.stock_level();
        Self {
            message: message.into(),
            slug: product.slug.clone(),
            stock_quantity: product.stock_quantity,
            is_in_stock: stock.is_in_stock(),
            is_low_stock: stock.is_low_stock(),
            is_out_of_stock: stock.is_out_of_stock(),
        }
    }
}

/// New gallery image
#[derive(Debug, Deserialize)]
pub struct AddImageRequest {
    pub image_url: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_primary: bool,
}

impl AddImageRequest {
    fn into_new_image(self) -> Result<NewProductImage, Vec<FieldError>> {
        let mut errors = Vec::new();
        let image_url = self.image_url.trim().to_string();

        if !(image_url.starts_with("http://") || image_url.starts_with("https://"))
            || image_url.len() > 512
        {
            errors.push(FieldError::new("image_url", "Enter a valid URL."));
        }
        if self.alt_text.chars().count() > ALT_TEXT_MAX {
            errors.push(FieldError::new(
                "alt_text",
                format!("Ensure this field has no more than {} characters.", ALT_TEXT_MAX),
            ));
        }
        if self.sort_order < 0 {
            errors.push(FieldError::new(
                "sort_order",
                "Ensure this value is greater than or equal to 0.",
            ));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewProductImage {
            image_url,
            alt_text: self.alt_text.trim().to_string(),
            sort_order: self.sort_order,
            is_primary: self.is_primary,
        })
    }
}

/// Low-stock list
#[derive(Debug, Serialize)]
pub struct LowStockResponse {
    pub count: usize,
    pub results: Vec<ProductListItem>,
}

/// Runs a product list query and wraps it in a page
///
/// A page past the end is a 404; page 1 of an empty result is not.
pub(crate) async fn fetch_page(pool: &PgPool, query: &ProductQuery) -> ApiResult<Page<ProductListItem>> {
    let (rows, count) = Product::search(pool, query).await?;
    query.pagination.check_in_range(count)?;

    Ok(Page::new(rows, count, query.pagination).map(ProductListItem::from))
}

/// Fails with 422 unless `category_id` names an active category
async fn check_category(pool: &PgPool, category_id: Option<Uuid>) -> ApiResult<()> {
    let Some(id) = category_id else {
        return Ok(());
    };

    if Category::is_active_id(pool, id).await? {
        Ok(())
    } else {
        Err(ApiError::field("category_id", "Category not found or inactive."))
    }
}

async fn owned_product(state: &AppState, auth: &AuthContext, slug: &str) -> ApiResult<ProductListing> {
    Product::find_owned_by_slug(&state.db, auth.user_id, slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))
}

async fn owner_detail(pool: &PgPool, product_id: Uuid) -> ApiResult<ProductDetail> {
    let listing = Product::find_listing_by_id(pool, product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    let images = ProductImage::list_for_product(pool, product_id).await?;

    Ok(ProductDetail::for_owner(listing, images))
}

/// List the caller's products
///
/// # Endpoint
///
/// ```text
/// GET /v1/products?category=<uuid>&min_price=10&stock_status=low_stock&search=lamp&ordering=-price,name&page=2
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: unparseable filter value
/// - `404 Not Found`: page past the end
pub async fn list_products(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ProductListParams>,
) -> ApiResult<Json<Page<ProductListItem>>> {
    let query = ProductQuery::for_owner_list(auth.user_id, &params)?;
    Ok(Json(fetch_page(&state.db, &query).await?))
}

/// Create a product
///
/// Slug and SKU are generated. Responds 201 with the detail payload.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: field or cross-field validation failed,
///   or the category is missing/inactive
pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ProductRequest>,
) -> ApiResult<(StatusCode, Json<ProductDetail>)> {
    let draft = req.into_new_draft()?.normalized();
    draft.validate()?;
    check_category(&state.db, draft.category_id).await?;

    let product = Product::create(&state.db, auth.user_id, draft).await?;

    tracing::info!(user_id = %auth.user_id, product_id = %product.id, slug = %product.slug, "Product created");

    Ok((StatusCode::CREATED, Json(owner_detail(&state.db, product.id).await?)))
}

/// Product detail; counts as a view
pub async fn get_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ProductDetail>> {
    let mut listing = owned_product(&state, &auth, &slug).await?;

    if Product::increment_view_count(&state.db, listing.product.id).await? {
        listing.product.view_count += 1;
    }
    let images = ProductImage::list_for_product(&state.db, listing.product.id).await?;

    Ok(Json(ProductDetail::for_owner(listing, images)))
}

/// Update a product (PUT and PATCH alike)
///
/// Supplied fields are merged into the current values and the merged
/// product is validated as a whole. Slug and SKU never change.
pub async fn update_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
    Json(req): Json<ProductRequest>,
) -> ApiResult<Json<ProductDetail>> {
    let listing = owned_product(&state, &auth, &slug).await?;
    let category_changed = matches!(req.category_id, Some(new) if new != listing.product.category_id);

    let mut draft = ProductDraft::from_product(&listing.product);
    req.apply_to(&mut draft)?;
    let draft = draft.normalized();
    draft.validate()?;
    if category_changed {
        check_category(&state.db, draft.category_id).await?;
    }

    Product::update(&state.db, listing.product.id, draft)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

    tracing::info!(user_id = %auth.user_id, product_id = %listing.product.id, "Product updated");

    Ok(Json(owner_detail(&state.db, listing.product.id).await?))
}

/// Delete a product; 204 on success
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    let listing = owned_product(&state, &auth, &slug).await?;

    if !Product::delete(&state.db, listing.product.id, auth.user_id).await? {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }

    tracing::info!(user_id = %auth.user_id, product_id = %listing.product.id, "Product deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Copy a product as a zero-stock draft named "<name> (Copy)"
pub async fn duplicate_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
) -> ApiResult<(StatusCode, Json<ProductDetail>)> {
    let listing = owned_product(&state, &auth, &slug).await?;

    let copy = Product::create(
        &state.db,
        auth.user_id,
        ProductDraft::duplicate_of(&listing.product),
    )
    .await?;

    tracing::info!(source = %listing.product.id, product_id = %copy.id, "Product duplicated");

    Ok((StatusCode::CREATED, Json(owner_detail(&state.db, copy.id).await?)))
}

/// Set an absolute stock level
///
/// # Errors
///
/// - `422 Unprocessable Entity`: negative quantity, or a non-zero quantity
///   for a product that does not track inventory
pub async fn set_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
    Json(req): Json<SetStockRequest>,
) -> ApiResult<Json<StockResponse>> {
    let quantity = validate_stock_quantity(req.stock_quantity)?;
    let listing = owned_product(&state, &auth, &slug).await?;
    listing.product.stock_level().set_to(quantity)?;

    match Product::set_stock(&state.db, listing.product.id, quantity).await? {
        Some(product) => Ok(Json(StockResponse::new("Stock updated", &product))),
        None => {
            // Tracking was switched off in the meantime
            let current = Product::find_listing_by_id(&state.db, listing.product.id)
                .await?
                .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
            current.product.stock_level().set_to(quantity)?;
            Err(ApiError::Conflict("Stock changed concurrently".to_string()))
        }
    }
}

/// Remove units from stock
///
/// The database update is guarded, so concurrent reductions can never
/// take a tracked product below zero.
///
/// # Errors
///
/// - `409 Conflict`: not enough stock
/// - `422 Unprocessable Entity`: quantity below 1
pub async fn reduce_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
    Json(req): Json<StockChangeRequest>,
) -> ApiResult<Json<StockResponse>> {
    if req.quantity < 1 {
        return Err(InventoryError::InvalidQuantity.into());
    }
    let listing = owned_product(&state, &auth, &slug).await?;
    listing.product.stock_level().reduced_by(req.quantity)?;

    match Product::reduce_stock(&state.db, listing.product.id, req.quantity).await? {
        Some(product) => Ok(Json(StockResponse::new(
            format!("Reduced stock by {}", req.quantity),
            &product,
        ))),
        None => {
            // Lost a race with another reduction; report what is left now
            let current = Product::find_listing_by_id(&state.db, listing.product.id)
                .await?
                .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
            current.product.stock_level().reduced_by(req.quantity)?;
            Err(ApiError::Conflict("Insufficient stock".to_string()))
        }
    }
}

/// Add units to stock
///
/// # Errors
///
/// - `422 Unprocessable Entity`: quantity below 1, or a total past the
///   largest storable stock level
pub async fn increase_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
    Json(req): Json<StockChangeRequest>,
) -> ApiResult<Json<StockResponse>> {
    if req.quantity < 1 {
        return Err(InventoryError::InvalidQuantity.into());
    }
    let listing = owned_product(&state, &auth, &slug).await?;
    listing.product.stock_level().increased_by(req.quantity)?;

    match Product::increase_stock(&state.db, listing.product.id, req.quantity).await? {
        Some(product) => Ok(Json(StockResponse::new(
            format!("Increased stock by {}", req.quantity),
            &product,
        ))),
        None => {
            let current = Product::find_listing_by_id(&state.db, listing.product.id)
                .await?
                .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
            current.product.stock_level().increased_by(req.quantity)?;
            Err(ApiError::Conflict("Stock changed concurrently".to_string()))
        }
    }
}

/// Gallery images in display order
pub async fn list_images(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<ImageResponse>>> {
    let listing = owned_product(&state, &auth, &slug).await?;
    let images = ProductImage::list_for_product(&state.db, listing.product.id).await?;

    Ok(Json(images.into_iter().map(ImageResponse::from).collect()))
}

/// Add a gallery image
///
/// A primary image replaces the previous primary.
pub async fn add_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
    Json(req): Json<AddImageRequest>,
) -> ApiResult<(StatusCode, Json<ImageResponse>)> {
    let data = req.into_new_image()?;
    let listing = owned_product(&state, &auth, &slug).await?;

    let image = ProductImage::create(&state.db, listing.product.id, data).await?;

    Ok((StatusCode::CREATED, Json(ImageResponse::from(image))))
}

/// Remove a gallery image; 204 on success
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((slug, image_id)): Path<(String, Uuid)>,
) -> ApiResult<StatusCode> {
    let listing = owned_product(&state, &auth, &slug).await?;

    if !ProductImage::delete(&state.db, listing.product.id, image_id).await? {
        return Err(ApiError::NotFound("Image not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Make an image the product's primary image
pub async fn set_primary_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((slug, image_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<MessageResponse>> {
    let listing = owned_product(&state, &auth, &slug).await?;

    ProductImage::set_primary(&state.db, listing.product.id, image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))?;

    Ok(Json(MessageResponse::new("Primary image updated")))
}

/// Totals over the caller's products
pub async fn product_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ProductStats>> {
    Ok(Json(Product::stats_for_owner(&state.db, auth.user_id).await?))
}

/// The caller's active products at or below their low-stock threshold
pub async fn low_stock_alerts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<LowStockResponse>> {
    let results: Vec<ProductListItem> = Product::low_stock_for_owner(&state.db, auth.user_id)
        .await?
        .into_iter()
        .map(ProductListItem::from)
        .collect();

    Ok(Json(LowStockResponse {
        count: results.len(),
        results,
    }))
}
