/// Category endpoints
///
/// Reads are open to anonymous callers; an anonymous list only shows
/// categories that currently hold at least one active product. Writes
/// require a staff account.
///
/// # Endpoints
///
/// - `GET /v1/categories?parent=null&search=audio&ordering=name`
/// - `POST /v1/categories` (staff)
/// - `GET /v1/categories/:slug`
/// - `PUT|PATCH|DELETE /v1/categories/:slug` (staff)
/// - `GET /v1/categories/:slug/products` - active products in the category
///   and its direct subcategories

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        nullable,
        products::{fetch_page, CategoryRef, ProductListItem},
        require_auth,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use storefront_shared::{
    auth::{authorization::require_staff, middleware::AuthContext},
    catalog::{
        query::{CategoryListParams, CategoryQuery, Page, ProductListParams, ProductQuery},
        tree::CategoryTree,
        FieldError,
    },
    models::category::{Category, CategoryDraft},
};
use uuid::Uuid;

/// Active direct child of a category
#[derive(Debug, Serialize)]
pub struct SubcategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    pub sort_order: i32,
    pub product_count: i64,
}

/// Category payload
#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub full_name: String,
    pub level: usize,
    pub product_count: i64,
    pub subcategories: Vec<SubcategoryResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CategoryResponse {
    fn build(
        category: Category,
        tree: &CategoryTree,
        counts: &HashMap<Uuid, i64>,
        children: Vec<&Category>,
    ) -> Self {
        let count_of = |id: &Uuid| counts.get(id).copied().unwrap_or(0);

        Self {
            full_name: tree
                .full_name(category.id)
                .unwrap_or_else(|| category.name.clone()),
            level: tree.level(category.id),
            product_count: count_of(&category.id),
            subcategories: children
                .into_iter()
                .map(|child| SubcategoryResponse {
                    id: child.id,
                    name: child.name.clone(),
                    slug: child.slug.clone(),
                    image_url: child.image_url.clone(),
                    sort_order: child.sort_order,
                    product_count: count_of(&child.id),
                })
                .collect(),
            id: category.id,
            name: category.name,
            slug: category.slug,
            description: category.description,
            parent_id: category.parent_id,
            image_url: category.image_url,
            is_active: category.is_active,
            sort_order: category.sort_order,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

/// Loads the tree, children and product counts for a batch of categories
async fn category_responses(pool: &PgPool, categories: Vec<Category>) -> ApiResult<Vec<CategoryResponse>> {
    let tree = Category::tree(pool).await?;
    let ids: Vec<Uuid> = categories.iter().map(|c| c.id).collect();
    let children = Category::active_children(pool, &ids).await?;

    let mut counted = ids.clone();
    counted.extend(children.iter().map(|c| c.id));
    let counts = Category::active_product_counts(pool, &counted).await?;

    Ok(categories
        .into_iter()
        .map(|category| {
            let own: Vec<&Category> = children
                .iter()
                .filter(|c| c.parent_id == Some(category.id))
                .collect();
            CategoryResponse::build(category, &tree, &counts, own)
        })
        .collect())
}

async fn category_response(pool: &PgPool, category: Category) -> ApiResult<CategoryResponse> {
    category_responses(pool, vec![category])
        .await?
        .pop()
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))
}

/// Create/update body; `name` is required on create
#[derive(Debug, Default, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

impl CategoryRequest {
    pub fn into_new_draft(self) -> Result<CategoryDraft, Vec<FieldError>> {
        if self.name.is_none() {
            return Err(vec![FieldError::new("name", "This field is required.")]);
        }

        let mut draft = CategoryDraft::new(String::new());
        self.apply_to(&mut draft);
        Ok(draft)
    }

    pub fn apply_to(self, draft: &mut CategoryDraft) {
        if let Some(name) = self.name {
            draft.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(parent_id) = self.parent_id {
            draft.parent_id = parent_id;
        }
        if let Some(image_url) = self.image_url {
            draft.image_url = image_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        }
        if let Some(is_active) = self.is_active {
            draft.is_active = is_active;
        }
        if let Some(sort_order) = self.sort_order {
            draft.sort_order = sort_order;
        }
    }
}

/// Checks `parent_id` against the stored hierarchy
///
/// `id` is `None` for a category that does not exist yet.
pub fn check_parent(tree: &CategoryTree, id: Option<Uuid>, parent_id: Option<Uuid>) -> Result<(), ApiError> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };

    if !tree.contains(parent_id) {
        return Err(ApiError::field("parent_id", "Parent category does not exist."));
    }
    if let Some(id) = id {
        if tree.would_create_cycle(id, parent_id) {
            return Err(ApiError::field(
                "parent_id",
                "A category cannot be its own parent or a descendant of itself.",
            ));
        }
    }

    Ok(())
}

/// List active categories
///
/// # Errors
///
/// - `400 Bad Request`: `parent` is neither `null`, `0` nor a UUID
pub async fn list_categories(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    Query(params): Query<CategoryListParams>,
) -> ApiResult<Json<Vec<CategoryResponse>>> {
    let query = CategoryQuery::from_params(&params, auth.is_none())?;
    let categories = Category::list(&state.db, &query).await?;

    Ok(Json(category_responses(&state.db, categories).await?))
}

/// Create a category (staff)
///
/// # Errors
///
/// - `401 Unauthorized` / `403 Forbidden`: anonymous or non-staff caller
/// - `409 Conflict`: name already taken
/// - `422 Unprocessable Entity`: invalid fields or unknown parent
pub async fn create_category(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<(StatusCode, Json<CategoryResponse>)> {
    let auth = require_auth(auth)?;
    let staff = require_staff(&state.db, &auth).await?;

    let draft = req.into_new_draft()?;
    draft.validate()?;
    check_parent(&Category::tree(&state.db).await?, None, draft.parent_id)?;

    let category = Category::create(&state.db, draft).await?;

    tracing::info!(user_id = %staff.id, category_id = %category.id, slug = %category.slug, "Category created");

    Ok((StatusCode::CREATED, Json(category_response(&state.db, category).await?)))
}

/// Category detail (active categories only)
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<CategoryResponse>> {
    let category = Category::find_active_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))?;

    Ok(Json(category_response(&state.db, category).await?))
}

/// Update a category (staff, PUT and PATCH alike)
///
/// The slug is kept when the category is renamed. Re-parenting under the
/// category itself or one of its descendants is rejected.
pub async fn update_category(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    Path(slug): Path<String>,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<Json<CategoryResponse>> {
    let auth = require_auth(auth)?;
    let staff = require_staff(&state.db, &auth).await?;

    let category = Category::find_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))?;

    let parent_changed = matches!(req.parent_id, Some(new) if new != category.parent_id);
    let mut draft = CategoryDraft::from_category(&category);
    req.apply_to(&mut draft);
    draft.validate()?;
    if parent_changed {
        check_parent(&Category::tree(&state.db).await?, Some(category.id), draft.parent_id)?;
    }

    let updated = Category::update(&state.db, category.id, draft)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))?;

    tracing::info!(user_id = %staff.id, category_id = %updated.id, "Category updated");

    Ok(Json(category_response(&state.db, updated).await?))
}

/// Delete a category and its subcategories (staff); 204 on success
///
/// Products in deleted categories are kept, uncategorized.
pub async fn delete_category(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    let auth = require_auth(auth)?;
    let staff = require_staff(&state.db, &auth).await?;

    let category = Category::find_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))?;

    if !Category::delete(&state.db, category.id).await? {
        return Err(ApiError::NotFound("Category not found".to_string()));
    }

    tracing::info!(user_id = %staff.id, category_id = %category.id, "Category deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Products of a category
#[derive(Debug, Serialize)]
pub struct CategoryProductsResponse {
    pub category: CategoryRef,
    #[serde(flatten)]
    pub page: Page<ProductListItem>,
}

/// Active products in a category and its direct subcategories
///
/// Accepts the same filters and `ordering` as the product list.
pub async fn category_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<ProductListParams>,
) -> ApiResult<Json<CategoryProductsResponse>> {
    let category = Category::find_active_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))?;

    let query = ProductQuery::for_category(category.id, &params)?;
    let page = fetch_page(&state.db, &query).await?;

    Ok(Json(CategoryProductsResponse {
        category: CategoryRef {
            id: category.id,
            name: category.name,
            slug: category.slug,
        },
        page,
    }))
}
