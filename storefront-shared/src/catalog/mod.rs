/// Catalog business rules
///
/// Pure logic shared by the product and category models and the API:
///
/// - [`slug`]: slug and SKU generation
/// - [`pricing`]: discount and profit figures
/// - [`inventory`]: stock status and stock change rules
/// - [`tree`]: category ancestry, breadcrumbs and cycle detection
/// - [`query`]: list filters, ordering and pagination

pub mod inventory;
pub mod pricing;
pub mod query;
pub mod slug;
pub mod tree;

use serde::Serialize;

/// A validation failure tied to one input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}
