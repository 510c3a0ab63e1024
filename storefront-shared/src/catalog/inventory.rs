/// Stock status rules
///
/// Products that do not track inventory are always in stock and never low
/// or out of stock. Stock changes on untracked products are no-ops.
///
/// The database applies the same rules as single guarded `UPDATE`s (see
/// `models::product`); these functions are the in-memory statement of them
/// and back the read-side flags.

use serde::{Deserialize, Serialize};

/// Error type for stock changes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    /// Quantity must be at least one
    #[error("Quantity must be a positive integer")]
    InvalidQuantity,

    /// Absolute stock level must not be negative
    #[error("Stock quantity cannot be negative")]
    NegativeStock,

    /// Requested more than is on hand
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    /// The new level would not fit the stock column
    #[error("Stock quantity cannot exceed {max}; at most {headroom} more units can be added")]
    StockLimitExceeded { max: i32, headroom: i32 },

    /// Untracked products always hold zero stock
    #[error("Stock quantity must be 0 when inventory tracking is disabled.")]
    UntrackedStock,
}

/// Coarse stock status used for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Parses the `stock_status` query parameter
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_stock" => Some(StockStatus::InStock),
            "low_stock" => Some(StockStatus::LowStock),
            "out_of_stock" => Some(StockStatus::OutOfStock),
            _ => None,
        }
    }
}

/// The inventory-relevant fields of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub track_inventory: bool,
    pub allow_backorder: bool,
}

impl StockLevel {
    /// Purchasable right now
    pub fn is_in_stock(&self) -> bool {
        !self.track_inventory || self.stock_quantity > 0 || self.allow_backorder
    }

    /// Tracked, positive and at or below the threshold
    pub fn is_low_stock(&self) -> bool {
        self.track_inventory
            && self.stock_quantity > 0
            && self.stock_quantity <= self.low_stock_threshold
    }

    /// Tracked and at zero
    pub fn is_out_of_stock(&self) -> bool {
        self.track_inventory && self.stock_quantity == 0
    }

    /// Stock after removing `quantity` units
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if `quantity < 1`
    /// - `InsufficientStock` if more is requested than is on hand
    pub fn reduced_by(&self, quantity: i32) -> Result<i32, InventoryError> {
        if quantity < 1 {
            return Err(InventoryError::InvalidQuantity);
        }
        if !self.track_inventory {
            return Ok(self.stock_quantity);
        }
        if quantity > self.stock_quantity {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available: self.stock_quantity,
            });
        }

        Ok(self.stock_quantity - quantity)
    }

    /// Stock after adding `quantity` units
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if `quantity < 1`
    /// - `StockLimitExceeded` if the total would pass `i32::MAX`
    pub fn increased_by(&self, quantity: i32) -> Result<i32, InventoryError> {
        if quantity < 1 {
            return Err(InventoryError::InvalidQuantity);
        }
        if !self.track_inventory {
            return Ok(self.stock_quantity);
        }

        self.stock_quantity
            .checked_add(quantity)
            .ok_or(InventoryError::StockLimitExceeded {
                max: i32::MAX,
                headroom: i32::MAX - self.stock_quantity,
            })
    }

    /// Validates an absolute stock level for this product
    pub fn set_to(&self, quantity: i32) -> Result<i32, InventoryError> {
        let quantity = validate_stock_quantity(quantity)?;
        if !self.track_inventory && quantity != 0 {
            return Err(InventoryError::UntrackedStock);
        }
        Ok(quantity)
    }
}

/// Validates an absolute stock level
pub fn validate_stock_quantity(quantity: i32) -> Result<i32, InventoryError> {
    if quantity < 0 {
        Err(InventoryError::NegativeStock)
    } else {
        Ok(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(stock: i32) -> StockLevel {
        StockLevel {
            stock_quantity: stock,
            low_stock_threshold: 5,
            track_inventory: true,
            allow_backorder: false,
        }
    }

    fn untracked() -> StockLevel {
        StockLevel {
            stock_quantity: 0,
            low_stock_threshold: 5,
            track_inventory: false,
            allow_backorder: false,
        }
    }

    #[test]
    fn test_status_flags_tracked() {
        let empty = tracked(0);
        assert!(!empty.is_in_stock());
        assert!(empty.is_out_of_stock());
        assert!(!empty.is_low_stock());

        let low = tracked(5);
        assert!(low.is_in_stock());
        assert!(low.is_low_stock());
        assert!(!low.is_out_of_stock());

        let plenty = tracked(6);
        assert!(!plenty.is_low_stock());
    }

    #[test]
    fn test_backorder_counts_as_in_stock() {
        let mut level = tracked(0);
        level.allow_backorder = true;
        assert!(level.is_in_stock());
        assert!(level.is_out_of_stock());
    }

    #[test]
    fn test_untracked_flags() {
        let level = untracked();
        assert!(level.is_in_stock());
        assert!(!level.is_low_stock());
        assert!(!level.is_out_of_stock());
    }

    #[test]
    fn test_reduce() {
        assert_eq!(tracked(10).reduced_by(3), Ok(7));
        assert_eq!(tracked(3).reduced_by(3), Ok(0));
        assert_eq!(
            tracked(2).reduced_by(3),
            Err(InventoryError::InsufficientStock {
                requested: 3,
                available: 2
            })
        );
        assert_eq!(tracked(2).reduced_by(0), Err(InventoryError::InvalidQuantity));
    }

    #[test]
    fn test_untracked_changes_are_noops() {
        assert_eq!(untracked().reduced_by(100), Ok(0));
        assert_eq!(untracked().increased_by(100), Ok(0));
    }

    #[test]
    fn test_increase() {
        assert_eq!(tracked(0).increased_by(4), Ok(4));
        assert_eq!(tracked(i32::MAX - 1).increased_by(1), Ok(i32::MAX));
        assert_eq!(
            tracked(i32::MAX - 5).increased_by(6),
            Err(InventoryError::StockLimitExceeded {
                max: i32::MAX,
                headroom: 5
            })
        );
        assert_eq!(tracked(1).increased_by(-1), Err(InventoryError::InvalidQuantity));
    }

    #[test]
    fn test_validate_stock_quantity() {
        assert_eq!(validate_stock_quantity(0), Ok(0));
        assert_eq!(validate_stock_quantity(-1), Err(InventoryError::NegativeStock));
    }

    #[test]
    fn test_set_to() {
        assert_eq!(tracked(3).set_to(40), Ok(40));
        assert_eq!(tracked(3).set_to(-1), Err(InventoryError::NegativeStock));
        assert_eq!(untracked().set_to(0), Ok(0));
        assert_eq!(untracked().set_to(7), Err(InventoryError::UntrackedStock));
    }

    #[test]
    fn test_stock_status_parse() {
        assert_eq!(StockStatus::from_str("low_stock"), Some(StockStatus::LowStock));
        assert_eq!(StockStatus::from_str("bogus"), None);
    }
}
