/// Price-derived product figures
///
/// All arithmetic is done in `Decimal` so percentages are exact before
/// truncation.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Whole-percent discount of `price` against `compare_at_price`
///
/// Only defined when the compare-at price is higher than the price.
/// Truncated towards zero, so 33.9% reports as 33.
///
/// ```
/// use rust_decimal::Decimal;
/// use storefront_shared::catalog::pricing::discount_percentage;
///
/// let price = Decimal::new(7500, 2);
/// let compare = Decimal::new(10000, 2);
/// assert_eq!(discount_percentage(price, Some(compare)), Some(25));
/// assert_eq!(discount_percentage(compare, Some(price)), None);
/// ```
pub fn discount_percentage(price: Decimal, compare_at_price: Option<Decimal>) -> Option<i64> {
    let compare = compare_at_price?;
    if compare <= price || compare.is_zero() {
        return None;
    }

    ((compare - price) / compare * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
}

/// Price minus cost, when a non-zero cost is known
pub fn profit_margin(price: Decimal, cost_price: Option<Decimal>) -> Option<Decimal> {
    match cost_price {
        Some(cost) if !cost.is_zero() => Some(price - cost),
        _ => None,
    }
}

/// Whole-percent markup over cost, when cost is positive
pub fn profit_percentage(price: Decimal, cost_price: Option<Decimal>) -> Option<i64> {
    let cost = cost_price.filter(|c| *c > Decimal::ZERO)?;

    ((price - cost) / cost * Decimal::ONE_HUNDRED).trunc().to_i64()
}
