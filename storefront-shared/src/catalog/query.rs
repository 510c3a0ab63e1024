/// Product and category list queries
///
/// Translates query-string parameters into validated filter, ordering and
/// pagination values, and renders them into a `sqlx::QueryBuilder`. The
/// SQL fragments assume products are aliased `p` and their category `c`:
///
/// ```sql
/// FROM products p LEFT JOIN categories c ON c.id = p.category_id
/// ```
///
/// Every ordering ends with `p.id` so that pages never overlap or skip rows
/// when sort keys tie.
///
/// # Example
///
/// ```
/// use storefront_shared::catalog::query::{ProductListParams, ProductQuery};
///
/// let params = ProductListParams {
///     min_price: Some("10".into()),
///     ordering: Some("-price".into()),
///     page_size: Some("500".into()),
///     ..Default::default()
/// };
///
/// let query = ProductQuery::for_owner_list(uuid::Uuid::new_v4(), &params).unwrap();
/// assert_eq!(query.pagination.page_size, 100);
/// assert!(query.ordering.to_sql().ends_with("p.id ASC"));
/// ```

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::inventory::StockStatus;
use crate::models::product::ProductStatus;

/// Default number of results per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound for `page_size`
pub const MAX_PAGE_SIZE: u32 = 100;

/// Number of products on the featured shelf
pub const FEATURED_LIMIT: i64 = 12;

/// Error type for query translation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// A parameter could not be parsed
    #[error("Invalid value for '{name}': {value}")]
    InvalidParameter { name: &'static str, value: String },

    /// `page` is not a positive integer or lies past the last page
    #[error("Invalid page.")]
    InvalidPage,
}

fn invalid(name: &'static str, value: &str) -> QueryError {
    QueryError::InvalidParameter {
        name,
        value: value.to_string(),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Raw product list query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductListParams {
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub stock_status: Option<String>,
    pub featured: Option<String>,
    pub status: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
    /// Owner lists: `-field,field`
    pub ordering: Option<String>,
    /// Public lists: `featured|price_low|price_high|newest|popular`
    pub sort: Option<String>,
    /// Public search text
    pub q: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Validated product filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilters {
    /// Category and its direct subcategories (ignored if the category is inactive)
    pub category: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub stock_status: Option<StockStatus>,
    pub featured: Option<bool>,
    pub status: Option<ProductStatus>,
    /// Any tag matches
    pub tags: Vec<String>,
}

impl ProductFilters {
    /// Parses filters from the raw query string
    ///
    /// Unknown `stock_status` and `featured` values are ignored; malformed
    /// IDs, prices and statuses are rejected.
    pub fn from_params(params: &ProductListParams) -> Result<Self, QueryError> {
        let category = non_empty(&params.category)
            .map(|v| Uuid::parse_str(v).map_err(|_| invalid("category", v)))
            .transpose()?;

        let min_price = non_empty(&params.min_price)
            .map(|v| Decimal::from_str(v).map_err(|_| invalid("min_price", v)))
            .transpose()?;

        let max_price = non_empty(&params.max_price)
            .map(|v| Decimal::from_str(v).map_err(|_| invalid("max_price", v)))
            .transpose()?;

        let status = non_empty(&params.status)
            .map(|v| ProductStatus::from_str(v).ok_or_else(|| invalid("status", v)))
            .transpose()?;

        let featured = match non_empty(&params.featured) {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        };

        let tags = non_empty(&params.tags)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            category,
            min_price,
            max_price,
            stock_status: non_empty(&params.stock_status).and_then(StockStatus::from_str),
            featured,
            status,
            tags,
        })
    }
}

/// Which products a query may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductScope {
    /// Everything owned by a user, any status
    Owner(Uuid),

    /// Active products
    Published,

    /// Active products in a category or its direct subcategories
    PublishedInCategory(Uuid),
}

impl ProductScope {
    fn search_columns(&self) -> &'static [&'static str] {
        match self {
            ProductScope::Owner(_) => &["p.name", "p.description", "p.short_description", "p.tags", "p.sku"],
            ProductScope::Published | ProductScope::PublishedInCategory(_) => {
                &["p.name", "p.description", "p.short_description", "p.tags", "c.name"]
            }
        }
    }
}

/// Sortable product columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Price,
    CreatedAt,
    UpdatedAt,
    ViewCount,
    StockQuantity,
    Featured,
}

impl SortKey {
    fn column(&self) -> &'static str {
        match self {
            SortKey::Name => "p.name",
            SortKey::Price => "p.price",
            SortKey::CreatedAt => "p.created_at",
            SortKey::UpdatedAt => "p.updated_at",
            SortKey::ViewCount => "p.view_count",
            SortKey::StockQuantity => "p.stock_quantity",
            SortKey::Featured => "p.is_featured",
        }
    }

    /// Fields accepted by the `ordering` parameter
    fn from_field(field: &str) -> Option<Self> {
        match field {
            "name" => Some(SortKey::Name),
            "price" => Some(SortKey::Price),
            "created_at" => Some(SortKey::CreatedAt),
            "updated_at" => Some(SortKey::UpdatedAt),
            "view_count" => Some(SortKey::ViewCount),
            "stock_quantity" => Some(SortKey::StockQuantity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub key: SortKey,
    pub descending: bool,
}

impl OrderTerm {
    const fn desc(key: SortKey) -> Self {
        Self { key, descending: true }
    }

    const fn asc(key: SortKey) -> Self {
        Self { key, descending: false }
    }
}

/// An ORDER BY clause over whitelisted columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductOrdering(pub Vec<OrderTerm>);

impl Default for ProductOrdering {
    fn default() -> Self {
        Self(vec![OrderTerm::desc(SortKey::CreatedAt)])
    }
}

impl ProductOrdering {
    /// Parses an `ordering` parameter, e.g. `-price,name`
    ///
    /// Unknown fields are skipped; nothing usable means the default
    /// (`-created_at`).
    pub fn parse(param: Option<&str>) -> Self {
        let terms: Vec<OrderTerm> = param
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter_map(|field| {
                let (descending, name) = match field.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, field),
                };
                SortKey::from_field(name).map(|key| OrderTerm { key, descending })
            })
            .collect();

        if terms.is_empty() {
            Self::default()
        } else {
            Self(terms)
        }
    }

    /// Maps the public `sort` keyword
    pub fn from_public_sort(sort: Option<&str>) -> Self {
        match sort.unwrap_or("featured") {
            "featured" => Self::relevance(),
            "price_low" => Self(vec![OrderTerm::asc(SortKey::Price)]),
            "price_high" => Self(vec![OrderTerm::desc(SortKey::Price)]),
            "newest" => Self(vec![OrderTerm::desc(SortKey::CreatedAt)]),
            "popular" => Self(vec![OrderTerm::desc(SortKey::ViewCount)]),
            _ => Self::default(),
        }
    }

    /// Featured first, then most viewed
    pub fn relevance() -> Self {
        Self(vec![
            OrderTerm::desc(SortKey::Featured),
            OrderTerm::desc(SortKey::ViewCount),
        ])
    }

    /// Renders the terms plus the `p.id` tiebreaker
    pub fn to_sql(&self) -> String {
        let mut parts: Vec<String> = self
            .0
            .iter()
            .map(|t| format!("{} {}", t.key.column(), if t.descending { "DESC" } else { "ASC" }))
            .collect();
        parts.push("p.id ASC".to_string());
        parts.join(", ")
    }
}

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Parses `page` and `page_size`
    ///
    /// A non-numeric or zero `page` is an error. `page_size` falls back to
    /// the default when unusable and is capped at [`MAX_PAGE_SIZE`].
    pub fn from_params(page: Option<&str>, page_size: Option<&str>) -> Result<Self, QueryError> {
        let page = match page.map(str::trim).filter(|p| !p.is_empty()) {
            None => 1,
            Some(p) => p
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or(QueryError::InvalidPage)?,
        };

        let page_size = page_size
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|s| *s >= 1)
            .map(|s| s.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Ok(Self { page, page_size })
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    /// Number of pages for `count` rows (at least one)
    pub fn total_pages(&self, count: i64) -> u32 {
        let size = i64::from(self.page_size);
        let pages = (count + size - 1) / size;
        pages.clamp(1, i64::from(u32::MAX)) as u32
    }

    /// Rejects pages past the end; page 1 is always valid
    pub fn check_in_range(&self, count: i64) -> Result<(), QueryError> {
        if self.page > self.total_pages(count) {
            Err(QueryError::InvalidPage)
        } else {
            Ok(())
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: i64, pagination: Pagination) -> Self {
        let total_pages = pagination.total_pages(count);
        Self {
            count,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages,
            next: (pagination.page < total_pages).then_some(pagination.page + 1),
            previous: (pagination.page > 1).then_some(pagination.page - 1),
            results,
        }
    }

    /// Converts every result, keeping the page metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Escapes `%`, `_` and `\` for use inside a LIKE pattern
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn contains_pattern(input: &str) -> String {
    format!("%{}%", escape_like(input))
}

/// A complete product list request
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub scope: ProductScope,
    pub filters: ProductFilters,
    pub search: Option<String>,
    pub ordering: ProductOrdering,
    pub pagination: Pagination,
}

impl ProductQuery {
    fn pagination(params: &ProductListParams) -> Result<Pagination, QueryError> {
        Pagination::from_params(params.page.as_deref(), params.page_size.as_deref())
    }

    /// `GET /products`: the caller's own products
    pub fn for_owner_list(owner_id: Uuid, params: &ProductListParams) -> Result<Self, QueryError> {
        Ok(Self {
            scope: ProductScope::Owner(owner_id),
            filters: ProductFilters::from_params(params)?,
            search: non_empty(&params.search).map(str::to_string),
            ordering: ProductOrdering::parse(params.ordering.as_deref()),
            pagination: Self::pagination(params)?,
        })
    }

    /// `GET /public/products`
    pub fn for_public_list(params: &ProductListParams) -> Result<Self, QueryError> {
        Ok(Self {
            scope: ProductScope::Published,
            filters: ProductFilters::from_params(params)?,
            search: None,
            ordering: ProductOrdering::from_public_sort(non_empty(&params.sort)),
            pagination: Self::pagination(params)?,
        })
    }

    /// `GET /public/search?q=`
    pub fn for_public_search(query: &str, params: &ProductListParams) -> Result<Self, QueryError> {
        Ok(Self {
            scope: ProductScope::Published,
            filters: ProductFilters::from_params(params)?,
            search: Some(query.to_string()),
            ordering: ProductOrdering::relevance(),
            pagination: Self::pagination(params)?,
        })
    }

    /// `GET /categories/:slug/products`
    pub fn for_category(category_id: Uuid, params: &ProductListParams) -> Result<Self, QueryError> {
        Ok(Self {
            scope: ProductScope::PublishedInCategory(category_id),
            filters: ProductFilters::from_params(params)?,
            search: None,
            ordering: ProductOrdering::parse(params.ordering.as_deref()),
            pagination: Self::pagination(params)?,
        })
    }

    /// Appends ` WHERE ...` for this query
    pub fn push_where<'a>(&self, builder: &mut QueryBuilder<'a, Postgres>) {
        builder.push(" WHERE ");
        match self.scope {
            ProductScope::Owner(owner_id) => {
                builder.push("p.owner_id = ").push_bind(owner_id);
            }
            ProductScope::Published => {
                builder.push("p.status = 'active'");
            }
            ProductScope::PublishedInCategory(category_id) => {
                builder
                    .push("p.status = 'active' AND p.category_id IN (SELECT id FROM categories WHERE id = ")
                    .push_bind(category_id)
                    .push(" OR parent_id = ")
                    .push_bind(category_id)
                    .push(")");
            }
        }

        let f = &self.filters;

        if let Some(category_id) = f.category {
            builder
                .push(" AND (NOT EXISTS (SELECT 1 FROM categories WHERE id = ")
                .push_bind(category_id)
                .push(" AND is_active) OR p.category_id IN (SELECT id FROM categories WHERE id = ")
                .push_bind(category_id)
                .push(" OR parent_id = ")
                .push_bind(category_id)
                .push("))");
        }
        if let Some(min_price) = f.min_price {
            builder.push(" AND p.price >= ").push_bind(min_price);
        }
        if let Some(max_price) = f.max_price {
            builder.push(" AND p.price <= ").push_bind(max_price);
        }
        match f.stock_status {
            Some(StockStatus::InStock) => {
                builder.push(" AND (NOT p.track_inventory OR p.stock_quantity > 0)");
            }
            Some(StockStatus::LowStock) => {
                builder.push(
                    " AND p.track_inventory AND p.stock_quantity > 0 \
                     AND p.stock_quantity <= p.low_stock_threshold",
                );
            }
            Some(StockStatus::OutOfStock) => {
                builder.push(" AND p.track_inventory AND p.stock_quantity = 0");
            }
            None => {}
        }
        if let Some(featured) = f.featured {
            builder.push(" AND p.is_featured = ").push_bind(featured);
        }
        if let Some(status) = f.status {
            builder.push(" AND p.status = ").push_bind(status);
        }
        if !f.tags.is_empty() {
            builder.push(" AND (");
            for (i, tag) in f.tags.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder.push("p.tags ILIKE ").push_bind(contains_pattern(tag));
            }
            builder.push(")");
        }
        if let Some(search) = &self.search {
            builder.push(" AND (");
            for (i, column) in self.scope.search_columns().iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder
                    .push(*column)
                    .push(" ILIKE ")
                    .push_bind(contains_pattern(search));
            }
            builder.push(")");
        }
    }

    /// Appends ORDER BY, LIMIT and OFFSET
    pub fn push_order_and_page<'a>(&self, builder: &mut QueryBuilder<'a, Postgres>) {
        builder.push(" ORDER BY ");
        builder.push(self.ordering.to_sql());
        builder.push(" LIMIT ").push_bind(self.pagination.limit());
        builder.push(" OFFSET ").push_bind(self.pagination.offset());
    }
}

/// `parent` filter for category lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentFilter {
    #[default]
    Any,
    /// `parent=null` or `parent=0`
    Root,
    Id(Uuid),
}

impl ParentFilter {
    pub fn parse(value: Option<&str>) -> Result<Self, QueryError> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(ParentFilter::Any),
            Some("null") | Some("0") => Ok(ParentFilter::Root),
            Some(v) => Uuid::parse_str(v)
                .map(ParentFilter::Id)
                .map_err(|_| invalid("parent", v)),
        }
    }
}

/// Raw category list query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryListParams {
    pub parent: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// A validated category list request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryQuery {
    pub parent: ParentFilter,
    pub search: Option<String>,
    /// Only categories with at least one active product
    pub require_active_products: bool,
    order_by: String,
}

impl CategoryQuery {
    pub fn from_params(params: &CategoryListParams, anonymous: bool) -> Result<Self, QueryError> {
        Ok(Self {
            parent: ParentFilter::parse(params.parent.as_deref())?,
            search: non_empty(&params.search).map(str::to_string),
            require_active_products: anonymous,
            order_by: Self::parse_ordering(params.ordering.as_deref()),
        })
    }

    /// Orders by `name`, `sort_order` or `created_at`; default `sort_order, name`
    fn parse_ordering(param: Option<&str>) -> String {
        let mut parts: Vec<String> = param
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter_map(|field| {
                let (descending, name) = match field.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, field),
                };
                let column = match name {
                    "name" => "c.name",
                    "sort_order" => "c.sort_order",
                    "created_at" => "c.created_at",
                    _ => return None,
                };
                Some(format!("{} {}", column, if descending { "DESC" } else { "ASC" }))
            })
            .collect();

        if parts.is_empty() {
            parts.push("c.sort_order ASC".to_string());
            parts.push("c.name ASC".to_string());
        }
        parts.push("c.id ASC".to_string());
        parts.join(", ")
    }

    pub fn order_by(&self) -> &str {
        &self.order_by
    }

    /// Appends ` WHERE ...` for categories aliased `c`
    pub fn push_where<'a>(&self, builder: &mut QueryBuilder<'a, Postgres>) {
        builder.push(" WHERE c.is_active");

        match self.parent {
            ParentFilter::Any => {}
            ParentFilter::Root => {
                builder.push(" AND c.parent_id IS NULL");
            }
            ParentFilter::Id(parent_id) => {
                builder.push(" AND c.parent_id = ").push_bind(parent_id);
            }
        }

        if let Some(search) = &self.search {
            let pattern = contains_pattern(search);
            builder
                .push(" AND (c.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if self.require_active_products {
            builder.push(
                " AND EXISTS (SELECT 1 FROM products p WHERE p.category_id = c.id AND p.status = 'active')",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ProductListParams {
        ProductListParams::default()
    }

    fn where_sql(query: &ProductQuery) -> String {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM products p");
        query.push_where(&mut builder);
        builder.sql().to_string()
    }

    #[test]
    fn test_filters_parse() {
        let category = Uuid::new_v4();
        let p = ProductListParams {
            category: Some(category.to_string()),
            min_price: Some("10.50".into()),
            max_price: Some(" 99 ".into()),
            stock_status: Some("low_stock".into()),
            featured: Some("true".into()),
            status: Some("draft".into()),
            tags: Some("red, ,blue ".into()),
            ..params()
        };

        let filters = ProductFilters::from_params(&p).unwrap();
        assert_eq!(filters.category, Some(category));
        assert_eq!(filters.min_price, Some(Decimal::new(1050, 2)));
        assert_eq!(filters.max_price, Some(Decimal::from(99)));
        assert_eq!(filters.stock_status, Some(StockStatus::LowStock));
        assert_eq!(filters.featured, Some(true));
        assert_eq!(filters.status, Some(ProductStatus::Draft));
        assert_eq!(filters.tags, vec!["red", "blue"]);
    }

    #[test]
    fn test_filters_ignore_unknown_soft_values() {
        let p = ProductListParams {
            stock_status: Some("plenty".into()),
            featured: Some("maybe".into()),
            ..params()
        };
        assert_eq!(ProductFilters::from_params(&p).unwrap(), ProductFilters::default());
    }

    #[test]
    fn test_filters_reject_malformed_values() {
        let bad_price = ProductListParams {
            min_price: Some("cheap".into()),
            ..params()
        };
        assert!(matches!(
            ProductFilters::from_params(&bad_price),
            Err(QueryError::InvalidParameter { name: "min_price", .. })
        ));

        let bad_status = ProductListParams {
            status: Some("archived".into()),
            ..params()
        };
        assert!(ProductFilters::from_params(&bad_status).is_err());

        let bad_category = ProductListParams {
            category: Some("42".into()),
            ..params()
        };
        assert!(ProductFilters::from_params(&bad_category).is_err());
    }

    #[test]
    fn test_ordering_parse() {
        assert_eq!(ProductOrdering::parse(None), ProductOrdering::default());
        assert_eq!(
            ProductOrdering::parse(Some("-price,name")).to_sql(),
            "p.price DESC, p.name ASC, p.id ASC"
        );
        assert_eq!(
            ProductOrdering::parse(Some("password_hash; DROP TABLE")).to_sql(),
            "p.created_at DESC, p.id ASC"
        );
    }

    #[test]
    fn test_public_sort() {
        assert_eq!(
            ProductOrdering::from_public_sort(None).to_sql(),
            "p.is_featured DESC, p.view_count DESC, p.id ASC"
        );
        assert_eq!(
            ProductOrdering::from_public_sort(Some("price_low")).to_sql(),
            "p.price ASC, p.id ASC"
        );
        assert_eq!(
            ProductOrdering::from_public_sort(Some("price_high")).to_sql(),
            "p.price DESC, p.id ASC"
        );
        assert_eq!(
            ProductOrdering::from_public_sort(Some("popular")).to_sql(),
            "p.view_count DESC, p.id ASC"
        );
        assert_eq!(
            ProductOrdering::from_public_sort(Some("whatever")).to_sql(),
            "p.created_at DESC, p.id ASC"
        );
    }

    #[test]
    fn test_pagination_parse() {
        assert_eq!(Pagination::from_params(None, None).unwrap(), Pagination::default());

        let p = Pagination::from_params(Some("3"), Some("500")).unwrap();
        assert_eq!(p.page, 3);
        assert_eq!(p.page_size, MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 200);
        assert_eq!(p.limit(), 100);

        let p = Pagination::from_params(Some("1"), Some("zero")).unwrap();
        assert_eq!(p.page_size, DEFAULT_PAGE_SIZE);

        assert_eq!(Pagination::from_params(Some("0"), None), Err(QueryError::InvalidPage));
        assert_eq!(Pagination::from_params(Some("abc"), None), Err(QueryError::InvalidPage));
    }

    #[test]
    fn test_pagination_range() {
        let p = Pagination { page: 1, page_size: 20 };
        assert_eq!(p.total_pages(0), 1);
        assert!(p.check_in_range(0).is_ok());

        let p = Pagination { page: 3, page_size: 20 };
        assert_eq!(p.total_pages(41), 3);
        assert!(p.check_in_range(41).is_ok());
        assert_eq!(p.check_in_range(40), Err(QueryError::InvalidPage));
    }

    #[test]
    fn test_page_links() {
        let page = Page::new(vec![1, 2], 45, Pagination { page: 2, page_size: 20 });
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));

        let last = Page::new(vec![1], 41, Pagination { page: 3, page_size: 20 }).map(|n| n * 10);
        assert_eq!(last.next, None);
        assert_eq!(last.results, vec![10]);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_owner_where_clause() {
        let p = ProductListParams {
            search: Some("lamp".into()),
            stock_status: Some("out_of_stock".into()),
            tags: Some("home,light".into()),
            ..params()
        };
        let query = ProductQuery::for_owner_list(Uuid::new_v4(), &p).unwrap();
        let sql = where_sql(&query);

        assert!(sql.contains("p.owner_id = $1"));
        assert!(sql.contains("p.track_inventory AND p.stock_quantity = 0"));
        assert!(sql.contains("(p.tags ILIKE $2 OR p.tags ILIKE $3)"));
        assert!(sql.contains("p.sku ILIKE"));
        assert!(!sql.contains("c.name ILIKE"));
    }

    #[test]
    fn test_public_where_clause() {
        let query = ProductQuery::for_public_search("lamp", &params()).unwrap();
        let sql = where_sql(&query);

        assert!(sql.contains("p.status = 'active'"));
        assert!(sql.contains("c.name ILIKE"));
        assert!(!sql.contains("p.sku ILIKE"));
        assert_eq!(query.ordering, ProductOrdering::relevance());
    }

    #[test]
    fn test_category_where_clause_includes_subcategories() {
        let query = ProductQuery::for_category(Uuid::new_v4(), &params()).unwrap();
        let sql = where_sql(&query);
        assert!(sql.contains("SELECT id FROM categories WHERE id = $1 OR parent_id = $2"));
    }

    #[test]
    fn test_order_and_page_clause() {
        let p = ProductListParams {
            page: Some("2".into()),
            ..params()
        };
        let query = ProductQuery::for_public_list(&p).unwrap();
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM products p");
        query.push_order_and_page(&mut builder);

        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM products p ORDER BY p.is_featured DESC, p.view_count DESC, p.id ASC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn test_parent_filter() {
        let id = Uuid::new_v4();
        assert_eq!(ParentFilter::parse(None), Ok(ParentFilter::Any));
        assert_eq!(ParentFilter::parse(Some("null")), Ok(ParentFilter::Root));
        assert_eq!(ParentFilter::parse(Some("0")), Ok(ParentFilter::Root));
        assert_eq!(ParentFilter::parse(Some(&id.to_string())), Ok(ParentFilter::Id(id)));
        assert!(ParentFilter::parse(Some("root")).is_err());
    }

    #[test]
    fn test_category_query() {
        let p = CategoryListParams {
            parent: Some("null".into()),
            search: Some("audio".into()),
            ordering: Some("-name".into()),
        };
        let query = CategoryQuery::from_params(&p, true).unwrap();
        assert_eq!(query.order_by(), "c.name DESC, c.id ASC");

        let mut builder = QueryBuilder::<Postgres>::new("SELECT c.id FROM categories c");
        query.push_where(&mut builder);
        let sql = builder.sql();
        assert!(sql.contains("c.parent_id IS NULL"));
        assert!(sql.contains("c.description ILIKE $2"));
        assert!(sql.contains("p.status = 'active'"));

        let signed_in = CategoryQuery::from_params(&CategoryListParams::default(), false).unwrap();
        assert_eq!(signed_in.order_by(), "c.sort_order ASC, c.name ASC, c.id ASC");
        assert!(!signed_in.require_active_products);
    }
}
