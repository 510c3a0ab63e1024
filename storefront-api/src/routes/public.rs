/// Anonymous storefront endpoints
///
/// Only active products are visible and cost figures are never shown.
///
/// # Endpoints
///
/// - `GET /v1/public/products?sort=price_low&min_price=10`
/// - `GET /v1/public/products/:slug` - counts as a view
/// - `GET /v1/public/featured`
/// - `GET /v1/public/search?q=lamp`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::products::{fetch_page, ProductDetail, ProductListItem},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use storefront_shared::{
    catalog::query::{Page, ProductListParams, ProductQuery, FEATURED_LIMIT},
    models::{product::Product, product_image::ProductImage},
};

/// Search results together with the query that produced them
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(flatten)]
    pub page: Page<ProductListItem>,
}

/// Browse active products
///
/// `sort` is one of `featured` (default), `price_low`, `price_high`,
/// `newest` or `popular`.
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> ApiResult<Json<Page<ProductListItem>>> {
    let query = ProductQuery::for_public_list(&params)?;
    Ok(Json(fetch_page(&state.db, &query).await?))
}

/// Active product detail
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ProductDetail>> {
    let mut listing = Product::find_published_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

    if Product::increment_view_count(&state.db, listing.product.id).await? {
        listing.product.view_count += 1;
    }
    let images = ProductImage::list_for_product(&state.db, listing.product.id).await?;

    Ok(Json(ProductDetail::for_public(listing, images)))
}

/// Up to twelve featured products, newest first
pub async fn featured_products(State(state): State<AppState>) -> ApiResult<Json<Vec<ProductListItem>>> {
    let products = Product::featured(&state.db, FEATURED_LIMIT).await?;

    Ok(Json(products.into_iter().map(ProductListItem::from).collect()))
}

/// Full-text-ish search over active products
///
/// Matches name, descriptions, tags and category name.
///
/// # Errors
///
/// - `400 Bad Request`: `q` missing or blank
pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> ApiResult<Json<SearchResponse>> {
    let q = search_text(&params)?;
    let query = ProductQuery::for_public_search(&q, &params)?;
    let page = fetch_page(&state.db, &query).await?;

    tracing::debug!(query = %q, count = page.count, "Product search");

    Ok(Json(SearchResponse { query: q, page }))
}

fn search_text(params: &ProductListParams) -> ApiResult<String> {
    params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("Search query parameter \"q\" is required.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_text_required() {
        assert!(search_text(&ProductListParams::default()).is_err());

        let blank = ProductListParams {
            q: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(search_text(&blank).is_err());

        let params = ProductListParams {
            q: Some(" desk lamp ".to_string()),
            ..Default::default()
        };
        assert_eq!(search_text(&params).unwrap(), "desk lamp");
    }

    #[test]
    fn test_search_response_flattens_page() {
        let page = Page::new(Vec::<ProductListItem>::new(), 0, Default::default());
        let body = serde_json::to_value(SearchResponse {
            query: "lamp".to_string(),
            page,
        })
        .unwrap();

        assert_eq!(body["query"], "lamp");
        assert_eq!(body["count"], 0);
        assert_eq!(body["total_pages"], 1);
        assert!(body["next"].is_null());
    }
}
